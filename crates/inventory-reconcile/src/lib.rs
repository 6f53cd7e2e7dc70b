//! inventory-reconcile — merges reporter contributions into resources.
//!
//! The [`ReconciliationEngine`] turns a resolved identity plus a
//! [`ResourceInput`] into creates and updates of `Resource` aggregates.
//! Each reporter keeps exactly one entry per resource; a second reporter
//! reporting against a known resource appends its own entry instead of
//! overwriting anyone else's.
//!
//! Workspaces are plain named groupings managed through the same engine;
//! their hierarchy rules live in the store.
//!
//! Uniqueness of reporter keys is enforced by the store inside the write
//! transaction. The engine's own lookup before a create only turns the
//! common duplicate case into an early `Conflict`.

pub mod engine;
pub mod error;
pub mod input;
pub mod pagination;
pub mod reference;
pub mod workspace;

pub use engine::ReconciliationEngine;
pub use error::{InventoryError, InventoryResult};
pub use input::ResourceInput;
pub use pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, Pagination};
pub use reference::ResourceRef;
pub use workspace::WorkspaceInput;
