use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Routing backend error: {0}")]
    Routing(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Road attribute backend error: {0}")]
    RoadAttributes(String),

    #[error("No loop candidates: {0}")]
    NoCandidates(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(String),
}

// Convert AppError into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Routing(ref e) => {
                tracing::error!("Routing backend error: {}", e);
                (StatusCode::BAD_GATEWAY, "Routing service error")
            }
            AppError::MalformedResponse(ref e) => {
                tracing::error!("Malformed backend response: {}", e);
                (StatusCode::BAD_GATEWAY, "Routing service error")
            }
            AppError::RoadAttributes(ref e) => {
                tracing::warn!("Road attribute backend error: {}", e);
                (StatusCode::BAD_GATEWAY, "Road data service error")
            }
            AppError::NoCandidates(ref e) => {
                tracing::warn!("No loop candidates: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "No routes could be generated from this start point",
                )
            }
            AppError::InvalidRequest(ref e) => (StatusCode::BAD_REQUEST, e.as_str()),
            AppError::Cancelled => {
                tracing::info!("Loop generation cancelled");
                (StatusCode::REQUEST_TIMEOUT, "Route generation was cancelled")
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": status.canonical_reason().unwrap_or("Unknown error"),
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
