//! Verification link building and notice templating.

use crate::email_sender::EmailMessage;
use serde::{Deserialize, Serialize};

/// Substitution marker recognised in URL and message templates.
pub const URL_MARKER: &str = "${URL}";

/// Build the verification link by substituting every marker in `template`
/// with `token`.
pub fn verification_url_build(template: &str, token: &str) -> String {
    template.replace(URL_MARKER, token)
}

/// Subject and body pair for one kind of notice.
///
/// `html` and `text` may contain [`URL_MARKER`], replaced with the full
/// verification link when rendering a verification notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailTemplate {
    /// Sender address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

impl MailTemplate {
    /// Default template for the "please confirm" notice.
    pub fn verification_default() -> Self {
        Self {
            from: "Do Not Reply <noreply@example.com>".to_string(),
            subject: "Confirm your email address".to_string(),
            html: "<p>Please confirm your email address by clicking <a href=\"${URL}\">this link</a>. \
                   If you are unable to do so, copy and paste the following link into your browser:</p>\
                   <p>${URL}</p>"
                .to_string(),
            text: "Please confirm your email address by clicking the following link, or by copying \
                   and pasting it into your browser: ${URL}"
                .to_string(),
        }
    }

    /// Default template for the "successfully verified" notice.
    pub fn confirmation_default() -> Self {
        Self {
            from: "Do Not Reply <noreply@example.com>".to_string(),
            subject: "Successfully verified!".to_string(),
            html: "<p>Your email address has been successfully verified.</p>".to_string(),
            text: "Your email address has been successfully verified.".to_string(),
        }
    }

    /// Render a message addressed to `to`.
    ///
    /// When `url` is given, every marker in the subject and bodies is
    /// replaced with it. The template itself is left untouched.
    pub fn render(&self, to: &str, url: Option<&str>) -> EmailMessage {
        let fill = |s: &str| match url {
            Some(url) => s.replace(URL_MARKER, url),
            None => s.to_owned(),
        };

        EmailMessage {
            from: self.from.clone(),
            to: to.to_owned(),
            subject: fill(&self.subject),
            html: fill(&self.html),
            text: fill(&self.text),
        }
    }
}
