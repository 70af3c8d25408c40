//! Service error types with HTTP status code mapping.
//!
//! [`WalletError`] is the central error type. Each variant maps to an HTTP
//! status and a short client-facing message. Server-side failures carry
//! their detail for the log only; the client sees a fixed message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{InsufficientBalance, InvalidTag};
use crate::persistence::PersistenceError;

/// JSON error body.
///
/// ```json
/// { "error": "tag already taken" }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Short human-readable message.
    pub error: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// | Variant                         | HTTP status |
/// |---------------------------------|-------------|
/// | `InvalidRequest`, `Insufficient`| 400         |
/// | `Unauthorized`                  | 401         |
/// | `NotFound`                      | 404         |
/// | `TagTaken`                      | 409         |
/// | `PersistenceDisabled`, `PersistenceUnavailable`, `RatesUnavailable` | 503 |
/// | `Persistence`, `Hashing`, `Internal` | 500    |
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Malformed body or a field failing validation.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing or expired session, or bad credentials.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// Referenced entity does not exist.
    #[error("{0}")]
    NotFound(&'static str),

    /// The tag is held by another user.
    #[error("tag already taken")]
    TagTaken,

    /// The sender holds less than the requested amount.
    #[error(transparent)]
    Insufficient(#[from] InsufficientBalance),

    /// The relational store is switched off.
    #[error("db disabled")]
    PersistenceDisabled,

    /// The relational store is configured but cannot be reached.
    #[error("db unavailable: {0}")]
    PersistenceUnavailable(PersistenceError),

    /// Neither rate tier has a snapshot.
    #[error("no rates")]
    RatesUnavailable,

    /// Storage failure in the middle of an operation.
    #[error("persistence error: {0}")]
    Persistence(PersistenceError),

    /// Password hashing failed.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    /// Shorthand for [`WalletError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Insufficient(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TagTaken => StatusCode::CONFLICT,
            Self::PersistenceDisabled
            | Self::PersistenceUnavailable(_)
            | Self::RatesUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Persistence(_) | Self::Hashing(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message returned to the client. Never includes internal detail.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Insufficient(_) => "insufficient balance".to_string(),
            Self::Persistence(_) => "db error".to_string(),
            Self::PersistenceUnavailable(_) => "db unavailable".to_string(),
            Self::Hashing(_) | Self::Internal(_) => "server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<PersistenceError> for WalletError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::TagTaken => Self::TagTaken,
            other if other.is_unreachable() => Self::PersistenceUnavailable(other),
            other => Self::Persistence(other),
        }
    }
}

impl From<InvalidTag> for WalletError {
    fn from(_: InvalidTag) -> Self {
        Self::invalid("invalid tag")
    }
}

impl From<JsonRejection> for WalletError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        Self::invalid("bad json")
    }
}

impl IntoResponse for WalletError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        let body = ErrorResponse {
            error: self.client_message(),
        };
        (status, axum::Json(body)).into_response()
    }
}
