//! Mapping of the error taxonomy onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory_reconcile::InventoryError;
use serde::Serialize;
use tracing::error;

/// Error body shared by every route.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

#[derive(Debug)]
pub struct ApiError(pub InventoryError);

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::Validation(_) | InventoryError::InvalidRef(_) => StatusCode::BAD_REQUEST,
        InventoryError::AuthenticationDenied => StatusCode::UNAUTHORIZED,
        InventoryError::NotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::Conflict(_) => StatusCode::CONFLICT,
        InventoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let details = match &self.0 {
            InventoryError::Validation(problems) => problems.clone(),
            _ => Vec::new(),
        };
        let message = match &self.0 {
            InventoryError::Internal(detail) => {
                error!(%detail, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.0.kind(),
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

pub fn error_response(err: InventoryError) -> Response {
    ApiError(err).into_response()
}
