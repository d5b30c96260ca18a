//! Unified error type for the service.
//!
//! Every failure a request can hit maps onto one variant here, and each variant
//! maps onto exactly one HTTP status in [`IntoResponse`]. Handlers never build
//! status codes by hand.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// All errors produced by Spinventory.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request input (400).
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// No verified identity on a request that needs one (401).
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Why the session was rejected
        message: String,
    },

    /// Identity mismatch or insufficient role (403).
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Which check failed
        message: String,
    },

    /// Target record or user is absent (404).
    #[error("{resource} not found")]
    NotFound {
        /// Human-readable name of the missing thing
        resource: String,
    },

    /// A destructive operation needs an explicit confirmation (409).
    #[error("Confirmation required: {message}")]
    ConfirmationRequired {
        /// What the caller is about to lose
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Mail delivery error: {0}")]
    Mail(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ConfirmationRequired { .. } => StatusCode::CONFLICT,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Mail(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        // Backend details stay in the log, the client gets a generic line.
        let message = match &self {
            Self::Mail(e) => {
                tracing::error!("Error sending email: {e}");
                "Failed to send email.".to_string()
            }
            _ if status.is_server_error() => {
                tracing::error!("Request failed: {self}");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::not_found("Tally").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::ConfirmationRequired {
                message: "x".to_string()
            }
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(Error::not_found("Tally").to_string(), "Tally not found");
    }

    async fn rendered(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_response_body_is_status_plus_message() {
        let (status, body) = rendered(Error::not_found("Tally")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Tally not found" }));

        let (status, body) =
            rendered(Error::Database(sea_orm::DbErr::Custom("disk on fire".to_string()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }
}
