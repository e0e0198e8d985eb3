//! Handler for verification links.

use super::{CONFIRM_PATH, VerifyStatus, VerifyStatusResponse};
use crate::{
    NoticeHooks, Verifier,
    backend::{PendingStore, PersistentStore},
    email_sender::EmailSender,
    error::VerifyError,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi, ToSchema};

#[derive(OpenApi)]
#[openapi(
    paths(request_confirm),
    components(schemas(
        ConfirmQuery,
        VerifyStatusResponse,
        VerifyStatus,
        crate::error::VerifyErrorResponse
    ))
)]
pub(crate) struct ConfirmApi;

/// Returns routes for confirming verification links.
pub fn confirm_routes<P, S, E, H>() -> Router<Verifier<P, S, E, H>>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    Router::new().route(CONFIRM_PATH, get(request_confirm::<P, S, E, H>))
}

/// Query for browser-based verification links.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ConfirmQuery {
    /// Verification token from the email link.
    pub token: String,
}

/// Confirm from a browser verification link (`GET /verify/confirm?token=...`).
///
/// Unknown, expired and already-used tokens all answer 404.
#[utoipa::path(
    get,
    path = "",
    params(ConfirmQuery),
    responses(
        (status = OK, body = VerifyStatusResponse),
        (status = NOT_FOUND, body = VerifyStatusResponse),
        (status = INTERNAL_SERVER_ERROR, body = crate::error::VerifyErrorResponse)
    )
)]
pub async fn request_confirm<P, S, E, H>(
    State(verifier): State<Verifier<P, S, E, H>>,
    Query(query): Query<ConfirmQuery>,
) -> Result<(StatusCode, Json<VerifyStatusResponse>), VerifyError>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    match verifier.request_confirm(&query.token).await? {
        Some(record) => Ok((
            StatusCode::OK,
            Json(VerifyStatusResponse {
                status: VerifyStatus::Confirmed,
                record: Some(record.document),
            }),
        )),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(VerifyStatusResponse::status(VerifyStatus::NotFound)),
        )),
    }
}
