//! Verification and confirmation notices built from the configured templates.

use crate::{
    NoticeHooks, Verifier,
    backend::{PendingStore, PersistentStore},
    email::email_validate,
    email_sender::{EmailSender, SendReceipt},
    error::VerifyError,
    verification::verification_url_build,
};

impl<P, S, E, H> Verifier<P, S, E, H>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    /// Send the "please confirm" notice carrying the link for `token`.
    ///
    /// The outcome goes to the configured hooks and is also returned.
    pub async fn verification_notice_send(
        &self,
        to: &str,
        token: &str,
    ) -> Result<SendReceipt, VerifyError> {
        self.verification_notice_send_with(to, token, self.hooks())
            .await
    }

    /// Like [`verification_notice_send`](Self::verification_notice_send),
    /// reporting to `hooks` instead of the configured hooks.
    pub async fn verification_notice_send_with<K: NoticeHooks>(
        &self,
        to: &str,
        token: &str,
        hooks: &K,
    ) -> Result<SendReceipt, VerifyError> {
        let config = self.config();
        let url = verification_url_build(&config.verification_url, token);

        let result = match email_validate(to) {
            Ok(address) => {
                let message = config.verify_mail.render(&address, Some(&url));
                self.email_sender.send(message).await
            }
            Err(e) => Err(e),
        };

        hooks.on_verification_sent(to, &result).await;
        Ok(result?)
    }

    /// Send the "successfully verified" notice.
    pub async fn confirmation_notice_send(&self, to: &str) -> Result<SendReceipt, VerifyError> {
        self.confirmation_notice_send_with(to, self.hooks()).await
    }

    /// Like [`confirmation_notice_send`](Self::confirmation_notice_send),
    /// reporting to `hooks` instead of the configured hooks.
    pub async fn confirmation_notice_send_with<K: NoticeHooks>(
        &self,
        to: &str,
        hooks: &K,
    ) -> Result<SendReceipt, VerifyError> {
        let result = match email_validate(to) {
            Ok(address) => {
                let message = self.config().confirm_mail.render(&address, None);
                self.email_sender.send(message).await
            }
            Err(e) => Err(e),
        };

        hooks.on_confirmation_sent(to, &result).await;
        Ok(result?)
    }
}
