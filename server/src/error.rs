//! API error taxonomy and its JSON wire mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use pastegate_common::api::ErrorResponse;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed create/update input; never retried automatically.
    #[error("Validation error")]
    Validation { details: Vec<String> },
    /// Unknown or expired id. Expiry and absence are deliberately
    /// indistinguishable to callers.
    #[error("Paste not found")]
    NotFound,
    /// Missing or mismatched credential; distinct from `NotFound` so the
    /// client can present a password form instead of a dead end.
    #[error("Password required")]
    PasswordRequired,
    #[error("Content too large")]
    PayloadTooLarge,
    /// Transient storage failure; clients may retry with backoff.
    #[error("Database temporarily unavailable. Please try again in a moment.")]
    Unavailable,
    #[error("Internal server error")]
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Backend(_) => {
                error!("storage backend failure: {}", err);
                Self::Unavailable
            }
            StoreError::Conflict
            | StoreError::MissingColumnFamily(_)
            | StoreError::Codec(_)
            | StoreError::Join(_) => {
                error!("unexpected storage failure: {}", err);
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PasswordRequired => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = ErrorResponse::new(self.to_string());
        body.requires_password = matches!(self, Self::PasswordRequired);
        if let Self::Validation { details } = self {
            body.details = Some(details);
        }

        (status, Json(body)).into_response()
    }
}
