use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::LinkError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            LinkError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            LinkError::Conflict(message) => (StatusCode::CONFLICT, message),
            LinkError::NotFound => (StatusCode::NOT_FOUND, LinkError::NotFound.to_string()),
            LinkError::Exhausted { attempts } => {
                tracing::warn!(attempts, "short code generation exhausted");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Could not generate a unique short code, please try again".to_string(),
                )
            }
            // Details stay in the log
            LinkError::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
