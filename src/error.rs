use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Model with name {0} does not exist.")]
    ModelNotFound(String),
    #[error("Unrecognized request format: {0}")]
    MalformedBody(String),
    #[error("Expected \"instances\" to be a list")]
    InstancesNotAList,
    #[error("Wrong input provided: {0}")]
    BadInput(String),
    /// Inference failed for a reason the caller did not induce. The detail is
    /// logged server-side and never echoed back.
    #[error("Something went wrong, probably due to bad input.")]
    Inference { detail: String },
    #[error("failed to load model from {source_dir}: no usable artifact among {attempted}")]
    LoadFailure {
        source_dir: String,
        attempted: String,
    },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("other: {0}")]
    Other(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::MalformedBody(_)
            | ServiceError::InstancesNotAList
            | ServiceError::BadInput(_)
            | ServiceError::Inference { .. } => StatusCode::BAD_REQUEST,
            ServiceError::LoadFailure { .. }
            | ServiceError::Storage(_)
            | ServiceError::Io(_)
            | ServiceError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ServiceError::Inference { ref detail } = self {
            tracing::error!(%detail, "inference failed");
        }

        // Uniform contract: every error body is {"error": reason}, JSON.
        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
