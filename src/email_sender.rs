//! Email sending abstraction for fast-verify.
//!
//! Implement [`EmailSender`] to deliver verification and confirmation
//! notices. Implement [`EmailTransport`] as well when the sender can be
//! rebuilt from [`TransportOptions`] on reconfiguration.

use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Error type for email sending operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailSendError {
    /// Failed to deliver email.
    #[error("email delivery failed: {0}")]
    DeliveryError(String),

    /// Recipient is not a valid address.
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    /// Transport could not be built from its options.
    #[error("transport setup failed: {0}")]
    TransportSetup(String),
}

/// A fully rendered message, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Sender, e.g. `Do Not Reply <noreply@example.com>`.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

/// What the transport reported after accepting a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Transport response line (e.g. `250 OK queued`).
    pub response: String,
}

/// Options used to construct the mail transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Well-known service name (e.g. `Gmail`), if any.
    pub service: Option<String>,
    /// SMTP host.
    pub host: Option<String>,
    /// SMTP port.
    pub port: Option<u16>,
    /// Use implicit TLS.
    pub secure: bool,
    /// SMTP username.
    pub user: Option<String>,
    /// SMTP password.
    pub pass: Option<String>,
}

/// Trait for async email delivery.
///
/// The default implementation (`()`) is a no-op that silently succeeds.
///
/// # Example
///
/// ```rust,ignore
/// use fast_verify::{EmailMessage, EmailSendError, EmailSender, SendReceipt};
///
/// #[derive(Clone)]
/// struct MyEmailService { /* ... */ }
///
/// impl EmailSender for MyEmailService {
///     async fn send(&self, message: EmailMessage) -> Result<SendReceipt, EmailSendError> {
///         // Queue or send email
///         Ok(SendReceipt::default())
///     }
/// }
/// ```
pub trait EmailSender: Send + Sync + Clone + 'static {
    /// Send an email asynchronously.
    ///
    /// Failures are reported once; the caller decides whether to retry.
    fn send(
        &self,
        message: EmailMessage,
    ) -> impl Future<Output = Result<SendReceipt, EmailSendError>> + Send;
}

/// An [`EmailSender`] that can be constructed from [`TransportOptions`].
///
/// Used when a configuration is committed, so that replacing the
/// configuration also replaces the transport.
///
/// # Example
///
/// ```rust,ignore
/// impl EmailTransport for SmtpMailer {
///     fn transport_build(options: &TransportOptions) -> Result<Self, EmailSendError> {
///         let host = options.host.as_deref().ok_or_else(|| {
///             EmailSendError::TransportSetup("smtp host is required".to_string())
///         })?;
///         SmtpMailer::connect(host, options.port.unwrap_or(587))
///             .map_err(|e| EmailSendError::TransportSetup(e.to_string()))
///     }
/// }
/// ```
pub trait EmailTransport: EmailSender + Sized {
    /// Build a transport client from its options.
    fn transport_build(options: &TransportOptions) -> Result<Self, EmailSendError>;
}

/// No-op email sender (default).
impl EmailSender for () {
    async fn send(&self, _message: EmailMessage) -> Result<SendReceipt, EmailSendError> {
        Ok(SendReceipt::default())
    }
}

impl EmailTransport for () {
    fn transport_build(_options: &TransportOptions) -> Result<Self, EmailSendError> {
        Ok(())
    }
}
