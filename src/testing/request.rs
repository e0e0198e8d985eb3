//! Verification request test functions.

use reqwest::StatusCode;
use serde_json::json;

use crate::handlers::{REQUEST_PATH, VerifyStatus, VerifyStatusResponse};

use super::{TestCandidate, TestContext, confirm_get, pending_token};

/// A new candidate lands in the pending store and gets a link by email.
pub async fn request_creates_pending_record_and_sends_link<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::new(ctx.verify_config());

    let response = candidate.submit(&base_url, &client).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: VerifyStatusResponse = response.json().await.expect("json body");
    assert_eq!(body.status, VerifyStatus::Pending);

    let token = pending_token(&ctx, &candidate.identity).await;
    assert_eq!(token.len(), ctx.verify_config().token_length);

    let messages = ctx.messages_to(&candidate.identity);
    assert_eq!(messages.len(), 1, "exactly one verification email");
    assert!(
        messages[0].text.contains(&token),
        "verification email should carry the token"
    );

    assert!(
        ctx.persistent_find(&candidate.identity).await.is_none(),
        "nothing is persisted before confirmation"
    );
}

/// A second request for a pending identity is a conflict and sends nothing.
pub async fn request_rejects_duplicate_pending<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::new(ctx.verify_config());

    let first = candidate.submit(&base_url, &client).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let token = pending_token(&ctx, &candidate.identity).await;

    let second = candidate.submit(&base_url, &client).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: VerifyStatusResponse = second.json().await.expect("json body");
    assert_eq!(body.status, VerifyStatus::AlreadyPending);

    assert_eq!(
        pending_token(&ctx, &candidate.identity).await,
        token,
        "original pending record must be untouched"
    );
    assert_eq!(ctx.messages_to(&candidate.identity).len(), 1);
}

/// Requests for a confirmed identity never create a pending record.
pub async fn request_reports_already_confirmed<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::new(ctx.verify_config());

    candidate.submit(&base_url, &client).await;
    let token = pending_token(&ctx, &candidate.identity).await;
    let confirmed = confirm_get(&base_url, &client, &token).await;
    assert_eq!(confirmed.status(), StatusCode::OK);

    let again = candidate.submit(&base_url, &client).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    let body: VerifyStatusResponse = again.json().await.expect("json body");
    assert_eq!(body.status, VerifyStatus::AlreadyConfirmed);

    assert!(ctx.pending_find(&candidate.identity).await.is_none());
}

/// Candidates without the identity field are rejected as bad requests.
pub async fn request_rejects_missing_identity<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let response = client
        .post(format!("{}{}", base_url, REQUEST_PATH))
        .json(&json!({ "name": "No Identity" }))
        .send()
        .await
        .expect("verification request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// An identity that is not a deliverable address is refused up front, so a
/// retry is refused the same way instead of hitting a stale pending record.
pub async fn request_rejects_invalid_address_without_storing<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::with_identity(ctx.verify_config(), "not-an-address");

    let first = candidate.submit(&base_url, &client).await;
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);
    assert!(
        ctx.pending_find(&candidate.identity).await.is_none(),
        "rejected candidate must not be stored"
    );

    let second = candidate.submit(&base_url, &client).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert!(ctx.pending_find(&candidate.identity).await.is_none());
    assert!(ctx.messages_to(&candidate.identity).is_empty());
}
