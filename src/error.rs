use crate::email_sender::EmailSendError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Verification workflow errors.
///
/// Expected business outcomes (unknown or expired token, identity already
/// pending or confirmed) are not errors; see [`RequestCreated`] and the
/// return types of [`Verifier`].
///
/// [`RequestCreated`]: crate::RequestCreated
/// [`Verifier`]: crate::Verifier
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("identity field `{path}` is missing or not a non-empty string")]
    IdentityMissing { path: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Delivery(#[from] EmailSendError),
}

impl VerifyError {
    /// Wrap a store error without altering it.
    pub fn from_store<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(error))
    }
}

/// JSON error body returned by the HTTP handlers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyErrorResponse {
    /// Error message.
    pub error: String,
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            VerifyError::IdentityMissing { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            VerifyError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            VerifyError::Delivery(EmailSendError::InvalidAddress(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            VerifyError::Delivery(ref e) => {
                tracing::error!(error = %e, "Notice delivery failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Could not deliver verification email".to_string(),
                )
            }
            VerifyError::Store(ref e) => {
                tracing::error!(error = %e, "Store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStoreError;
    use std::error::Error as _;

    #[test]
    fn store_error_keeps_source() {
        let err = VerifyError::from_store(MemoryStoreError::Unavailable);
        assert_eq!(err.to_string(), "store error: memory store unavailable");
        assert!(err.source().is_some());
    }

    #[test]
    fn status_codes() {
        let missing = VerifyError::IdentityMissing {
            path: "email".to_string(),
        };
        assert_eq!(missing.into_response().status(), StatusCode::BAD_REQUEST);

        let store = VerifyError::from_store(MemoryStoreError::Poisoned);
        assert_eq!(
            store.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let delivery = VerifyError::from(EmailSendError::DeliveryError("down".to_string()));
        assert_eq!(delivery.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
