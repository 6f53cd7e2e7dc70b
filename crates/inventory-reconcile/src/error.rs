//! Error taxonomy shared by the engine and the REST layer.

use inventory_state::StateError;
use thiserror::Error;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Every problem found in the request, not only the first.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid resource reference: {0}")]
    InvalidRef(String),

    #[error("authentication denied")]
    AuthenticationDenied,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl InventoryError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "validation",
            InventoryError::InvalidRef(_) => "invalid_ref",
            InventoryError::AuthenticationDenied => "authentication_denied",
            InventoryError::NotFound(_) => "not_found",
            InventoryError::Conflict(_) => "conflict",
            InventoryError::Internal(_) => "internal",
        }
    }
}

impl From<StateError> for InventoryError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Conflict(key) => InventoryError::Conflict(format!(
                "reporter has already reported this local resource id ({key})"
            )),
            StateError::InvalidParent(msg) => {
                InventoryError::Validation(vec![format!("parentWorkspaceId: {msg}")])
            }
            StateError::InUse(msg) => InventoryError::Conflict(msg),
            other => InventoryError::Internal(other.to_string()),
        }
    }
}
