//! Verification HTTP handlers.

pub mod confirm;
pub mod request;
pub mod resend;

use crate::record::Document;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use confirm::{ConfirmQuery, confirm_routes};
pub use request::{CandidateRequest, request_routes};
pub use resend::{ResendRequest, resend_routes};

pub const REQUEST_PATH: &str = "/verify/request";
pub const CONFIRM_PATH: &str = "/verify/confirm";
pub const RESEND_PATH: &str = "/verify/resend";

/// Where a verification request stands after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    /// A pending record was created and the link sent.
    Pending,
    /// A pending record already exists for this identity.
    AlreadyPending,
    /// The identity is already confirmed.
    AlreadyConfirmed,
    /// The pending record was promoted.
    Confirmed,
    /// A new link was sent.
    Resent,
    /// No live pending record matched.
    NotFound,
}

/// Response body shared by all verification endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyStatusResponse {
    /// Outcome of the call.
    pub status: VerifyStatus,
    /// The confirmed record, on successful confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub record: Option<Document>,
}

impl VerifyStatusResponse {
    pub(crate) fn status(status: VerifyStatus) -> Self {
        Self {
            status,
            record: None,
        }
    }
}
