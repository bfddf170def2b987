use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream returned status >= 400 (other than 429). Never retried.
    #[error("Upstream error ({status}): {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Upstream returned a body that is not valid JSON.
    #[error("Upstream returned a non-JSON body: {body}")]
    UpstreamDecode { body: String },

    /// Upstream kept returning 429 past the retry budget.
    #[error("Upstream rate limit not lifted after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Self::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            Self::HttpRequest(ref e) => {
                tracing::error!("HTTP request error: {}", e);
                (StatusCode::BAD_GATEWAY, "Upstream request failed")
            }
            Self::Serialization(ref e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Data processing error")
            }
            Self::Upstream { status, ref body } => {
                tracing::error!("Upstream error ({}): {}", status, body);
                (StatusCode::BAD_GATEWAY, "Upstream API error")
            }
            Self::UpstreamDecode { ref body } => {
                tracing::error!("Upstream returned non-JSON body: {}", body);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream returned an unreadable response",
                )
            }
            Self::RateLimited { attempts } => {
                tracing::warn!("Upstream rate limit persisted for {} attempts", attempts);
                (StatusCode::SERVICE_UNAVAILABLE, "Upstream is rate limiting us")
            }
            Self::TokenRefresh(ref msg) => {
                tracing::error!("Token refresh failed: {}", msg);
                (StatusCode::UNAUTHORIZED, "Spotify session expired")
            }
            Self::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            Self::Authentication(ref msg) => (StatusCode::UNAUTHORIZED, msg.as_str()),
            Self::Configuration(ref msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str()),
            Self::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
            Self::Other(ref e) => {
                tracing::error!("Unexpected error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
