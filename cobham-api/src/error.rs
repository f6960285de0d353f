//! Error types for cobham-api
//!
//! Every failure leaving a handler is an [`AppError`], rendered as the
//! `{ success: false, status, message }` envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cobham_common::api::ErrorBody;
use thiserror::Error;
use tracing::{error, warn};

use crate::identity::IdentityError;
use crate::payments::PaymentError;
use crate::storage::StorageError;

/// API error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Unique constraint or state conflict (409)
    #[error("{0}")]
    Conflict(String),

    /// External service (identity, storage, payment provider) failed (502)
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] cobham_common::Error),
}

impl AppError {
    pub fn not_found() -> Self {
        AppError::NotFound("Resource not found".to_string())
    }

    pub fn bad_request() -> Self {
        AppError::BadRequest("Bad request".to_string())
    }

    pub fn unauthorized() -> Self {
        AppError::Unauthorized("Unauthorized".to_string())
    }

    pub fn forbidden() -> Self {
        AppError::Forbidden("Forbidden".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(err) => database_status(err),
            AppError::Common(err) => match err {
                cobham_common::Error::NotFound(_) => StatusCode::NOT_FOUND,
                cobham_common::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                cobham_common::Error::Database(db) => database_status(db),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message shown to the client; server-side details stay in the logs
    pub(crate) fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Upstream(_) => "Upstream service unavailable".to_string(),
            AppError::Common(cobham_common::Error::NotFound(msg))
            | AppError::Common(cobham_common::Error::InvalidInput(msg)) => msg.clone(),
            _ if self.status() == StatusCode::NOT_FOUND => "Resource not found".to_string(),
            _ if self.status() == StatusCode::CONFLICT => "Resource already exists".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

fn database_status(err: &sqlx::Error) -> StatusCode {
    match err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) if db.is_unique_violation() => StatusCode::CONFLICT,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = status.as_u16(), "{}", self);
        } else {
            warn!(status = status.as_u16(), "{}", self);
        }

        (status, Json(ErrorBody::new(status, self.public_message()))).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken => {
                AppError::Unauthorized("Invalid or expired token.".to_string())
            }
            IdentityError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::UnsupportedProvider(name) => {
                AppError::BadRequest(format!("Payment provider '{}' not supported", name))
            }
            PaymentError::InvalidWebhook(msg) => AppError::BadRequest(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_messages() {
        assert_eq!(AppError::not_found().to_string(), "Resource not found");
        assert_eq!(AppError::forbidden().to_string(), "Forbidden");
        assert_eq!(AppError::bad_request().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::unauthorized().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_common_errors_map_to_client_statuses() {
        let err = AppError::from(cobham_common::Error::InvalidInput("Invalid UUID format for id".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid UUID format for id");

        let err = AppError::from(cobham_common::Error::Internal("boom".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_row_not_found_is_404() {
        assert_eq!(AppError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_details_hidden() {
        let err = AppError::Upstream("paypal returned 503".into());
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "Upstream service unavailable");
    }

    #[test]
    fn test_payment_provider_error() {
        let err = AppError::from(PaymentError::UnsupportedProvider("stripe".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Payment provider 'stripe' not supported");
    }
}
