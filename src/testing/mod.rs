//! Test suite for verifying fast-verify integration.
//!
//! This module provides a reusable test suite that users can invoke to verify
//! their [`PendingStore`] and [`PersistentStore`] implementations work
//! correctly with the verification endpoints.
//!
//! # Usage
//!
//! Implement the [`TestContext`] trait for your test infrastructure, then use
//! the [`Suite`] to run all tests:
//!
//! ```ignore
//! use fast_verify::testing::{Suite, TestContext};
//! use fast_verify::VerifyConfig;
//! use reqwest::Client;
//!
//! struct MyContext { /* your app state */ }
//!
//! impl TestContext for MyContext {
//!     async fn spawn() -> (String, Client, Self) {
//!         // Start your app, return (base_url, client, context)
//!     }
//!
//!     fn verify_config(&self) -> &VerifyConfig { /* ... */ }
//!     // ... other required methods
//! }
//!
//! #[tokio::test]
//! async fn run_verify_suite() {
//!     Suite::<MyContext>::test_all().await;
//! }
//! ```
//!
//! [`PendingStore`]: crate::PendingStore
//! [`PersistentStore`]: crate::PersistentStore

pub mod confirm;
pub mod request;
pub mod resend;

use reqwest::{Client, Response};
use serde_json::{Map, Value};
use std::future::Future;
use uuid::Uuid;

use crate::handlers::{CONFIRM_PATH, REQUEST_PATH};
use crate::{EmailMessage, PendingRecord, PersistentRecord, VerifyConfig};

/// Candidate with a unique identity, shaped after the configured identity path.
#[derive(Debug, Clone)]
pub struct TestCandidate {
    /// Identity value (a unique email address).
    pub identity: String,
    /// Full candidate document.
    pub document: Value,
}

impl TestCandidate {
    /// Build a candidate with a fresh identity and a few extra fields.
    pub fn new(config: &VerifyConfig) -> Self {
        Self::with_identity(config, format!("user+{}@example.com", Uuid::new_v4()))
    }

    /// Build a candidate whose identity field holds `identity` verbatim.
    pub fn with_identity(config: &VerifyConfig, identity: impl Into<String>) -> Self {
        let identity = identity.into();

        let mut document = Map::new();
        document.insert("name".to_string(), Value::from("Test User"));
        document.insert("tags".to_string(), serde_json::json!(["a", "b"]));

        match config.identity_field.split_once('.') {
            Some((outer, inner)) => {
                let mut nested = Map::new();
                nested.insert(inner.to_string(), Value::from(identity.clone()));
                document.insert(outer.to_string(), Value::Object(nested));
            }
            None => {
                document.insert(config.identity_field.clone(), Value::from(identity.clone()));
            }
        }

        Self {
            identity,
            document: Value::Object(document),
        }
    }

    /// `POST` this candidate to the request endpoint.
    pub async fn submit(&self, base_url: &str, client: &Client) -> Response {
        client
            .post(format!("{}{}", base_url, REQUEST_PATH))
            .json(&self.document)
            .send()
            .await
            .expect("verification request")
    }
}

/// `GET` the confirmation link for `token`.
pub async fn confirm_get(base_url: &str, client: &Client, token: &str) -> Response {
    client
        .get(format!("{}{}", base_url, CONFIRM_PATH))
        .query(&[("token", token)])
        .send()
        .await
        .expect("confirm request")
}

/// Token currently stored on the pending record for `identity`.
pub async fn pending_token<C: TestContext>(ctx: &C, identity: &str) -> String {
    let record = ctx
        .pending_find(identity)
        .await
        .expect("pending record exists");
    record
        .document
        .get(&ctx.verify_config().token_field)
        .and_then(Value::as_str)
        .expect("pending record carries a token")
        .to_string()
}

/// Context trait that test implementations must provide.
///
/// This abstracts away the concrete app infrastructure, allowing the test suite
/// to run against any pair of stores and any recording mail sender.
pub trait TestContext: Sized + Send + Sync {
    /// Spawn the test app and return (base_url, http_client, context).
    fn spawn() -> impl Future<Output = (String, Client, Self)> + Send;

    /// Get the verify configuration the app runs with.
    fn verify_config(&self) -> &VerifyConfig;

    /// Find the live pending record for `identity` (for test assertions).
    fn pending_find(&self, identity: &str) -> impl Future<Output = Option<PendingRecord>> + Send;

    /// Find the persistent record for `identity` (for test assertions).
    fn persistent_find(
        &self,
        identity: &str,
    ) -> impl Future<Output = Option<PersistentRecord>> + Send;

    /// Messages the app has sent to `to`, oldest first.
    fn messages_to(&self, to: &str) -> Vec<EmailMessage>;
}

/// Test suite for fast-verify.
///
/// Run all tests with `Suite::<YourContext>::test_all()`.
pub struct Suite<C: TestContext> {
    _marker: std::marker::PhantomData<C>,
}

impl<C: TestContext> Suite<C> {
    /// Run all verification tests.
    pub async fn test_all() {
        // Request tests
        request::request_creates_pending_record_and_sends_link::<C>().await;
        request::request_rejects_duplicate_pending::<C>().await;
        request::request_reports_already_confirmed::<C>().await;
        request::request_rejects_missing_identity::<C>().await;
        request::request_rejects_invalid_address_without_storing::<C>().await;

        // Confirm tests
        confirm::confirm_promotes_record_and_strips_token::<C>().await;
        confirm::confirm_unknown_token_returns_not_found::<C>().await;
        confirm::confirm_cannot_be_replayed::<C>().await;

        // Resend tests
        resend::resend_rotates_token_and_invalidates_old_link::<C>().await;
        resend::resend_unknown_identity_returns_not_found::<C>().await;
    }
}

/// Generates individual test functions for the verify suite.
///
/// This macro creates a `#[tokio::test]` function for each test case in the suite,
/// ensuring they run individually and report separate results.
///
/// # Example
///
/// ```rust,ignore
/// fast_verify::test_suite!(MyContext);
/// ```
#[macro_export]
macro_rules! test_suite {
    ($context:ty) => {
        #[tokio::test]
        async fn request_creates_pending_record_and_sends_link() {
            $crate::testing::request::request_creates_pending_record_and_sends_link::<$context>().await;
        }

        #[tokio::test]
        async fn request_rejects_duplicate_pending() {
            $crate::testing::request::request_rejects_duplicate_pending::<$context>().await;
        }

        #[tokio::test]
        async fn request_reports_already_confirmed() {
            $crate::testing::request::request_reports_already_confirmed::<$context>().await;
        }

        #[tokio::test]
        async fn request_rejects_missing_identity() {
            $crate::testing::request::request_rejects_missing_identity::<$context>().await;
        }

        #[tokio::test]
        async fn request_rejects_invalid_address_without_storing() {
            $crate::testing::request::request_rejects_invalid_address_without_storing::<$context>()
                .await;
        }

        #[tokio::test]
        async fn confirm_promotes_record_and_strips_token() {
            $crate::testing::confirm::confirm_promotes_record_and_strips_token::<$context>().await;
        }

        #[tokio::test]
        async fn confirm_unknown_token_returns_not_found() {
            $crate::testing::confirm::confirm_unknown_token_returns_not_found::<$context>().await;
        }

        #[tokio::test]
        async fn confirm_cannot_be_replayed() {
            $crate::testing::confirm::confirm_cannot_be_replayed::<$context>().await;
        }

        #[tokio::test]
        async fn resend_rotates_token_and_invalidates_old_link() {
            $crate::testing::resend::resend_rotates_token_and_invalidates_old_link::<$context>().await;
        }

        #[tokio::test]
        async fn resend_unknown_identity_returns_not_found() {
            $crate::testing::resend::resend_unknown_identity_returns_not_found::<$context>().await;
        }
    };
}
