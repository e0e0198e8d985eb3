//! Handler for creating verification requests.

use super::{REQUEST_PATH, VerifyStatus, VerifyStatusResponse};
use crate::{
    NoticeHooks, RequestCreated, Verifier,
    backend::{PendingStore, PersistentStore},
    email_sender::EmailSender,
    email::email_validate,
    error::VerifyError,
    record::Document,
};
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

#[derive(OpenApi)]
#[openapi(
    paths(request_create),
    components(schemas(
        CandidateRequest,
        VerifyStatusResponse,
        VerifyStatus,
        crate::error::VerifyErrorResponse
    ))
)]
pub(crate) struct RequestApi;

/// Returns routes for creating verification requests.
pub fn request_routes<P, S, E, H>() -> Router<Verifier<P, S, E, H>>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    Router::new().route(REQUEST_PATH, post(request_create::<P, S, E, H>))
}

/// Candidate document to verify. Must carry the configured identity field.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(value_type = Object)]
pub struct CandidateRequest(pub Document);

/// Quarantine the candidate and email a verification link to its identity.
#[utoipa::path(
    post,
    path = "",
    request_body = CandidateRequest,
    responses(
        (status = CREATED, body = VerifyStatusResponse),
        (status = CONFLICT, body = VerifyStatusResponse),
        (status = BAD_REQUEST, body = crate::error::VerifyErrorResponse),
        (status = BAD_GATEWAY, body = crate::error::VerifyErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = crate::error::VerifyErrorResponse)
    )
)]
pub async fn request_create<P, S, E, H>(
    State(verifier): State<Verifier<P, S, E, H>>,
    Json(CandidateRequest(candidate)): Json<CandidateRequest>,
) -> Result<(StatusCode, Json<VerifyStatusResponse>), VerifyError>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    // An undeliverable identity must not leave a pending record behind.
    let identity = verifier.identity_resolve(&candidate)?;
    email_validate(identity)?;

    let (code, status) = match verifier.request_create(&candidate).await? {
        RequestCreated::Created { token, .. } => {
            verifier.verification_notice_send(identity, &token).await?;
            (StatusCode::CREATED, VerifyStatus::Pending)
        }
        RequestCreated::AlreadyPending => (StatusCode::CONFLICT, VerifyStatus::AlreadyPending),
        RequestCreated::AlreadyConfirmed => {
            (StatusCode::CONFLICT, VerifyStatus::AlreadyConfirmed)
        }
    };

    Ok((code, Json(VerifyStatusResponse::status(status))))
}
