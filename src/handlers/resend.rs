//! Handler for resending verification links.

use super::{RESEND_PATH, VerifyStatus, VerifyStatusResponse};
use crate::{
    NoticeHooks, Verifier,
    backend::{PendingStore, PersistentStore},
    email_sender::EmailSender,
    error::VerifyError,
};
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

#[derive(OpenApi)]
#[openapi(
    paths(request_resend),
    components(schemas(
        ResendRequest,
        VerifyStatusResponse,
        VerifyStatus,
        crate::error::VerifyErrorResponse
    ))
)]
pub(crate) struct ResendApi;

/// Returns routes for resending verification links.
pub fn resend_routes<P, S, E, H>() -> Router<Verifier<P, S, E, H>>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    Router::new().route(RESEND_PATH, post(request_resend::<P, S, E, H>))
}

/// Request body for resending a link.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendRequest {
    /// Identity value the pending record was created under.
    pub identity: String,
}

/// Rotate the token of a pending request and email the new link.
#[utoipa::path(
    post,
    path = "",
    request_body = ResendRequest,
    responses(
        (status = OK, body = VerifyStatusResponse),
        (status = NOT_FOUND, body = VerifyStatusResponse),
        (status = BAD_GATEWAY, body = crate::error::VerifyErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = crate::error::VerifyErrorResponse)
    )
)]
pub async fn request_resend<P, S, E, H>(
    State(verifier): State<Verifier<P, S, E, H>>,
    Json(req): Json<ResendRequest>,
) -> Result<(StatusCode, Json<VerifyStatusResponse>), VerifyError>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    if req.identity.trim().is_empty() {
        return Err(VerifyError::InvalidRequest(
            "identity cannot be empty".to_string(),
        ));
    }

    let (code, status) = if verifier.request_resend(&req.identity).await? {
        (StatusCode::OK, VerifyStatus::Resent)
    } else {
        (StatusCode::NOT_FOUND, VerifyStatus::NotFound)
    };

    Ok((code, Json(VerifyStatusResponse::status(status))))
}
