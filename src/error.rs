use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Rejected before any task exists; the store is left untouched.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match self {
            OrchestratorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
