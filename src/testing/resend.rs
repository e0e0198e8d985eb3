//! Resend test functions.

use reqwest::StatusCode;
use serde_json::json;

use crate::handlers::{RESEND_PATH, VerifyStatus, VerifyStatusResponse};

use super::{TestCandidate, TestContext, confirm_get, pending_token};

/// Resending replaces the token: the old link dies, the new one confirms.
pub async fn resend_rotates_token_and_invalidates_old_link<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::new(ctx.verify_config());

    candidate.submit(&base_url, &client).await;
    let old_token = pending_token(&ctx, &candidate.identity).await;

    let response = client
        .post(format!("{}{}", base_url, RESEND_PATH))
        .json(&json!({ "identity": candidate.identity }))
        .send()
        .await
        .expect("resend request");
    assert_eq!(response.status(), StatusCode::OK);
    let body: VerifyStatusResponse = response.json().await.expect("json body");
    assert_eq!(body.status, VerifyStatus::Resent);

    let new_token = pending_token(&ctx, &candidate.identity).await;
    assert_ne!(old_token, new_token);

    let messages = ctx.messages_to(&candidate.identity);
    assert_eq!(messages.len(), 2, "original and resent emails");
    assert!(messages[1].text.contains(&new_token));

    let stale = confirm_get(&base_url, &client, &old_token).await;
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);

    let fresh = confirm_get(&base_url, &client, &new_token).await;
    assert_eq!(fresh.status(), StatusCode::OK);
    assert!(ctx.persistent_find(&candidate.identity).await.is_some());
}

/// Resending for an identity with nothing pending is a not-found, not an error.
pub async fn resend_unknown_identity_returns_not_found<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::new(ctx.verify_config());

    let response = client
        .post(format!("{}{}", base_url, RESEND_PATH))
        .json(&json!({ "identity": candidate.identity }))
        .send()
        .await
        .expect("resend request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(ctx.messages_to(&candidate.identity).is_empty());
}
