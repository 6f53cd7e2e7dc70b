//! inventory-state — embedded resource store for the common inventory.
//!
//! Backed by [redb](https://docs.rs/redb). A `Resource` aggregate owns all
//! of its reporter entries and is stored as one JSON value, so every write
//! of the aggregate is atomic.
//!
//! # Architecture
//!
//! | Table | Key | Value |
//! |---|---|---|
//! | `resources` | resource id (`u64`) | JSON `Resource` |
//! | `reporter_index` | `(reporter, reporter_type, local_resource_id)` | resource id |
//! | `workspaces` | workspace id (`u64`) | JSON `Workspace` |
//! | `sequences` | sequence name | last issued id |
//!
//! The reporter index enforces global uniqueness of reporter keys. It is
//! checked and written in the same write transaction as the aggregate, and
//! redb serializes write transactions, so a check-then-insert can never
//! race another writer.
//!
//! Workspaces form a forest through `parent_workspace_id`. The parent is
//! checked inside the same write transaction as the workspace, and a
//! workspace with children cannot be deleted.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
