//! Error types for the inventory resource store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    /// A reporter key is already claimed by another resource.
    #[error("reporter key already in use: {0}")]
    Conflict(String),

    /// A workspace parent is unknown or would form a cycle.
    #[error("invalid parent workspace: {0}")]
    InvalidParent(String),

    /// A workspace still has child workspaces.
    #[error("workspace in use: {0}")]
    InUse(String),

    /// A write would break an aggregate invariant.
    #[error("invariant violated: {0}")]
    Invariant(String),
}
