pub mod config;
pub mod types;

pub use config::InventoryConfig;
pub use types::*;
