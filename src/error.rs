// =============================================================================
// Hub error taxonomy — closed kinds, mapped to HTTP status at the API edge
// =============================================================================

use axum::{http::StatusCode, response::IntoResponse, Json};

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("upstream credit budget exhausted")]
    UpstreamBudgetExhausted,

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store failure: {0}")]
    StoreFailure(#[from] sqlx::Error),

    #[error("fatal configuration error: {0}")]
    FatalConfig(String),
}

impl IntoResponse for HubError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::UpstreamFailure(_) | Self::UpstreamBudgetExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::FatalConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
