//! # fast-verify
//!
//! Email-address verification for Axum: a candidate record waits in a
//! time-limited pending store until its owner clicks a single-use link,
//! then it is promoted into a permanent store.
//!
//! ## Features
//!
//! - **Random URL-safe tokens** of configurable length
//! - **Pending records with a TTL**, expired by the store itself
//! - **Exactly one pending record per identity**, enforced by the store's
//!   unique insert
//! - **Extensible store and mail traits** for any database or transport
//! - **Notice hooks** for delivery outcomes
//! - **Axum routes** for request, confirm and resend
//!
//! ## Quick Start
//!
//! Implement [`PendingStore`] and [`PersistentStore`] for your database (or
//! use the in-memory ones from [`memory`]), then build a [`Verifier`]:
//!
//! ```rust,ignore
//! use fast_verify::{Verifier, VerifyConfig, RequestCreated};
//! use fast_verify::memory::{MemoryPendingStore, MemoryPersistentStore};
//!
//! let verifier = Verifier::new(
//!     VerifyConfig::from_env()?,
//!     MemoryPendingStore::new(),
//!     MemoryPersistentStore::new(),
//! )?
//! .with_email_sender(my_sender);
//!
//! if let RequestCreated::Created { token, .. } = verifier.request_create(&candidate).await? {
//!     verifier.verification_notice_send("a@example.com", &token).await?;
//! }
//!
//! // later, from the link
//! let confirmed = verifier.request_confirm(&token).await?;
//! ```
//!
//! ## Endpoints
//!
//! - `POST /verify/request` - Create a pending record and send the link
//! - `GET /verify/confirm?token=...` - Promote the pending record
//! - `POST /verify/resend` - Rotate the token and send a new link
//!
//! ## Concurrency
//!
//! The workflow keeps no state of its own; every shared fact lives in the
//! stores. [`Verifier::reconfigure`] returns a new verifier instead of
//! mutating the current one, so in-flight operations always see one
//! consistent configuration.

mod backend;
mod config;
mod email;
mod email_sender;
mod error;
pub mod handlers;
pub mod memory;
mod notice;
pub mod openapi;
mod record;
pub mod testing;
pub mod tokens;
mod verification;
mod workflow;

use axum::Router;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub use backend::{PendingInsert, PendingStore, PersistentStore};
pub use config::{OPTION_KEYS, VerifyConfig, VerifyConfigError};
pub use email::email_validate;
pub use email_sender::{
    EmailMessage, EmailSendError, EmailSender, EmailTransport, SendReceipt, TransportOptions,
};
pub use error::{VerifyError, VerifyErrorResponse};
pub use record::{
    Document, FIELD_PATH_MAX_DEPTH, FieldPath, FieldPathError, Filter, PendingRecord,
    PersistentRecord,
};
pub use verification::{MailTemplate, URL_MARKER, verification_url_build};
pub use workflow::RequestCreated;

/// Hooks for notice delivery outcomes.
///
/// Called after every verification or confirmation send with the recipient
/// and the transport result. The default implementation logs successes at
/// `info` and failures at `error`.
///
/// # Example
///
/// ```rust,ignore
/// use fast_verify::{EmailSendError, NoticeHooks, SendReceipt};
///
/// #[derive(Clone)]
/// struct Metrics;
///
/// impl NoticeHooks for Metrics {
///     fn on_verification_sent(
///         &self,
///         to: &str,
///         result: &Result<SendReceipt, EmailSendError>,
///     ) -> impl std::future::Future<Output = ()> + Send {
///         let ok = result.is_ok();
///         async move { record_send(ok) }
///     }
/// }
/// ```
pub trait NoticeHooks: Send + Sync + Clone + 'static {
    /// Called after a verification notice was handed to the transport.
    fn on_verification_sent(
        &self,
        to: &str,
        result: &Result<SendReceipt, EmailSendError>,
    ) -> impl Future<Output = ()> + Send {
        notice_log("verification", to, result);
        async {}
    }

    /// Called after a confirmation notice was handed to the transport.
    fn on_confirmation_sent(
        &self,
        to: &str,
        result: &Result<SendReceipt, EmailSendError>,
    ) -> impl Future<Output = ()> + Send {
        notice_log("confirmation", to, result);
        async {}
    }
}

impl NoticeHooks for () {}

fn notice_log(kind: &'static str, to: &str, result: &Result<SendReceipt, EmailSendError>) {
    match result {
        Ok(receipt) => tracing::info!(kind, to, response = %receipt.response, "Notice sent"),
        Err(e) => tracing::error!(kind, to, error = %e, "Notice delivery failed"),
    }
}

/// Validated configuration plus the paths derived from it.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) config: VerifyConfig,
    pub(crate) identity: FieldPath,
    pub(crate) token: FieldPath,
}

impl Settings {
    fn new(config: VerifyConfig) -> Result<Self, VerifyConfigError> {
        config.validate()?;
        Ok(Self {
            identity: config.identity_path()?,
            token: config.token_path(),
            config,
        })
    }
}

/// Verification workflow controller. Cheap to clone.
///
/// # Type Parameters
///
/// - `P`: The pending store implementing [`PendingStore`]
/// - `S`: The persistent store implementing [`PersistentStore`]
/// - `E`: Optional mail sender implementing [`EmailSender`] (defaults to `()`)
/// - `H`: Optional hooks implementing [`NoticeHooks`] (defaults to `()`)
#[derive(Clone)]
pub struct Verifier<P: PendingStore, S: PersistentStore, E: EmailSender = (), H: NoticeHooks = ()>
{
    settings: Arc<Settings>,
    pending: P,
    persistent: S,
    email_sender: E,
    hooks: H,
}

impl<P: PendingStore, S: PersistentStore> Verifier<P, S, (), ()> {
    /// Create a verifier with a no-op sender and default hooks.
    pub fn new(config: VerifyConfig, pending: P, persistent: S) -> Result<Self, VerifyConfigError> {
        Ok(Self {
            settings: Arc::new(Settings::new(config)?),
            pending,
            persistent,
            email_sender: (),
            hooks: (),
        })
    }
}

impl<P, S, E, H> Verifier<P, S, E, H>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    /// Attach a mail sender.
    pub fn with_email_sender<NewE: EmailSender>(self, email_sender: NewE) -> Verifier<P, S, NewE, H> {
        Verifier {
            settings: self.settings,
            pending: self.pending,
            persistent: self.persistent,
            email_sender,
            hooks: self.hooks,
        }
    }

    /// Build a mail transport from the configured [`TransportOptions`] and
    /// attach it.
    pub fn with_transport<T: EmailTransport>(self) -> Result<Verifier<P, S, T, H>, VerifyConfigError> {
        let transport = T::transport_build(&self.settings.config.transport)
            .map_err(|e| VerifyConfigError::Transport(e.to_string()))?;
        Ok(self.with_email_sender(transport))
    }

    /// Attach custom notice hooks.
    pub fn with_hooks<NewH: NoticeHooks>(self, hooks: NewH) -> Verifier<P, S, E, NewH> {
        Verifier {
            settings: self.settings,
            pending: self.pending,
            persistent: self.persistent,
            email_sender: self.email_sender,
            hooks,
        }
    }

    /// Returns a router with all verification endpoints.
    ///
    /// Endpoints:
    /// - `POST /verify/request`
    /// - `GET /verify/confirm`
    /// - `POST /verify/resend`
    pub fn routes<St>(&self) -> Router<St>
    where
        St: Clone + Send + Sync + 'static,
    {
        Router::new()
            .merge(handlers::request::request_routes::<P, S, E, H>())
            .merge(handlers::confirm::confirm_routes::<P, S, E, H>())
            .merge(handlers::resend::resend_routes::<P, S, E, H>())
            .with_state(self.clone())
    }

    /// Returns a reference to the verify configuration.
    pub fn config(&self) -> &VerifyConfig {
        &self.settings.config
    }

    /// Returns a reference to the pending store.
    pub fn pending_store(&self) -> &P {
        &self.pending
    }

    /// Returns a reference to the persistent store.
    pub fn persistent_store(&self) -> &S {
        &self.persistent
    }

    /// Returns a reference to the mail sender.
    pub fn email_sender(&self) -> &E {
        &self.email_sender
    }

    pub(crate) fn hooks(&self) -> &H {
        &self.hooks
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<P, S, E, H> Verifier<P, S, E, H>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailTransport,
    H: NoticeHooks,
{
    /// Merge `patch` over the current options and return a new verifier.
    ///
    /// Keys in `patch` replace current values wholesale. The merged options
    /// are validated and a fresh transport is built from them; on any
    /// failure the error is returned and `self` is left as it was. Stores
    /// and hooks are shared with the new verifier.
    pub fn reconfigure(&self, patch: &Value) -> Result<Self, VerifyConfigError> {
        let config = self.settings.config.options_merge(patch)?;
        let email_sender = E::transport_build(&config.transport)
            .map_err(|e| VerifyConfigError::Transport(e.to_string()))?;

        tracing::info!(
            collection = %config.pending_collection,
            ttl_secs = config.ttl.as_secs(),
            "Verify configuration replaced"
        );

        Ok(Self {
            settings: Arc::new(Settings::new(config)?),
            pending: self.pending.clone(),
            persistent: self.persistent.clone(),
            email_sender,
            hooks: self.hooks.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryPendingStore, MemoryPersistentStore, RecordingSender};
    use serde_json::json;
    use std::time::Duration;

    fn verifier() -> Verifier<MemoryPendingStore, MemoryPersistentStore> {
        Verifier::new(
            VerifyConfig::default(),
            MemoryPendingStore::new(),
            MemoryPersistentStore::new(),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = VerifyConfig {
            verification_url: "https://example.com".to_string(),
            ..Default::default()
        };
        let result = Verifier::new(config, MemoryPendingStore::new(), MemoryPersistentStore::new());
        assert!(matches!(result, Err(VerifyConfigError::Invalid(_))));
    }

    #[test]
    fn reconfigure_returns_new_verifier() {
        let v1 = verifier().with_transport::<RecordingSender>().unwrap();
        let v2 = v1.reconfigure(&json!({ "ttl_secs": 1 })).unwrap();

        assert_eq!(v2.config().ttl, Duration::from_secs(1));
        assert_eq!(v1.config().ttl, VerifyConfig::default().ttl);
    }

    #[test]
    fn reconfigure_failure_leaves_config_untouched() {
        let v1 = verifier().with_transport::<RecordingSender>().unwrap();
        let err = v1
            .reconfigure(&json!({ "ttl_secs": 1, "verification_url": "no-marker" }))
            .err()
            .unwrap();

        assert!(matches!(err, VerifyConfigError::Invalid(_)));
        assert_eq!(v1.config(), &VerifyConfig::default());
    }

    #[derive(Clone)]
    struct HostOnly;

    impl EmailSender for HostOnly {
        async fn send(&self, _message: EmailMessage) -> Result<SendReceipt, EmailSendError> {
            Ok(SendReceipt::default())
        }
    }

    impl EmailTransport for HostOnly {
        fn transport_build(options: &TransportOptions) -> Result<Self, EmailSendError> {
            match options.host.as_deref() {
                Some(host) if !host.is_empty() => Ok(Self),
                _ => Err(EmailSendError::TransportSetup("smtp host is required".to_string())),
            }
        }
    }

    #[test]
    fn transport_setup_failure_is_a_config_error() {
        let err = verifier().with_transport::<HostOnly>().err().unwrap();
        assert_eq!(
            err,
            VerifyConfigError::Transport("transport setup failed: smtp host is required".to_string())
        );
    }

    #[test]
    fn reconfigure_rebuilds_transport_from_merged_options() {
        let config = VerifyConfig {
            transport: TransportOptions {
                host: Some("smtp.example.com".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let v1 = Verifier::new(config, MemoryPendingStore::new(), MemoryPersistentStore::new())
            .unwrap()
            .with_transport::<HostOnly>()
            .unwrap();

        let err = v1
            .reconfigure(&json!({ "transport": { "port": 2525 } }))
            .err()
            .unwrap();
        assert!(matches!(err, VerifyConfigError::Transport(_)));
        assert_eq!(v1.config().transport.host.as_deref(), Some("smtp.example.com"));

        let v2 = v1
            .reconfigure(&json!({ "transport": { "host": "mail.example.com", "port": 2525 } }))
            .unwrap();
        assert_eq!(v2.config().transport.port, Some(2525));
    }

    #[tokio::test]
    async fn reconfigure_shares_stores() {
        let v1 = verifier().with_transport::<()>().unwrap();
        let v2 = v1
            .reconfigure(&json!({ "token_length": 12, "token_field": "tok" }))
            .unwrap();
        assert_eq!(v2.settings().token, FieldPath::key("tok"));

        let candidate = json!({ "email": "x@example.com" }).as_object().cloned().unwrap();
        let created = v1.request_create(&candidate).await.unwrap();
        assert!(matches!(created, RequestCreated::Created { .. }));

        let again = v2.request_create(&candidate).await.unwrap();
        assert_eq!(again, RequestCreated::AlreadyPending);
    }
}
