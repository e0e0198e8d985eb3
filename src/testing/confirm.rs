//! Confirmation link test functions.

use reqwest::StatusCode;
use serde_json::Value;

use crate::handlers::{VerifyStatus, VerifyStatusResponse};

use super::{TestCandidate, TestContext, confirm_get, pending_token};

/// Following the link moves the record to the persistent store without its token.
pub async fn confirm_promotes_record_and_strips_token<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let config = ctx.verify_config();
    let candidate = TestCandidate::new(config);

    candidate.submit(&base_url, &client).await;
    let token = pending_token(&ctx, &candidate.identity).await;

    let response = confirm_get(&base_url, &client, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: VerifyStatusResponse = response.json().await.expect("json body");
    assert_eq!(body.status, VerifyStatus::Confirmed);

    let stored = ctx
        .persistent_find(&candidate.identity)
        .await
        .expect("persistent record exists");
    assert!(
        !stored.document.contains_key(&config.token_field),
        "token must not be persisted"
    );
    assert_eq!(
        Value::Object(stored.document),
        candidate.document,
        "every candidate field survives confirmation"
    );

    assert!(
        ctx.pending_find(&candidate.identity).await.is_none(),
        "pending record is removed after confirmation"
    );

    if config.send_confirmation {
        let messages = ctx.messages_to(&candidate.identity);
        assert_eq!(messages.len(), 2, "verification and confirmation emails");
        assert_eq!(messages[1].subject, config.confirm_mail.subject);
    }
}

/// A token that was never issued is a plain not-found.
pub async fn confirm_unknown_token_returns_not_found<C: TestContext>() {
    let (base_url, client, _ctx) = C::spawn().await;

    let response = confirm_get(&base_url, &client, "never-issued-token").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: VerifyStatusResponse = response.json().await.expect("json body");
    assert_eq!(body.status, VerifyStatus::NotFound);
    assert!(body.record.is_none());
}

/// Links are single-use.
pub async fn confirm_cannot_be_replayed<C: TestContext>() {
    let (base_url, client, ctx) = C::spawn().await;
    let candidate = TestCandidate::new(ctx.verify_config());

    candidate.submit(&base_url, &client).await;
    let token = pending_token(&ctx, &candidate.identity).await;

    let first = confirm_get(&base_url, &client, &token).await;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = confirm_get(&base_url, &client, &token).await;
    assert_eq!(replay.status(), StatusCode::NOT_FOUND);
}
