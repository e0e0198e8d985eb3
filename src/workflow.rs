//! Request, confirm and resend: the pending-record state machine.
//!
//! Steps inside one call run strictly in sequence. Nothing is cached in
//! process memory, so concurrent calls only interact through the stores.

use crate::{
    NoticeHooks, Verifier,
    backend::{PendingInsert, PendingStore, PersistentStore},
    email_sender::EmailSender,
    error::VerifyError,
    record::{Document, Filter, PendingRecord, PersistentRecord},
    tokens::token_generate,
};
use serde_json::Value;

/// Outcome of [`Verifier::request_create`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestCreated {
    /// A pending record was stored. Send `token` to the owner next.
    Created {
        /// The stored record, token included.
        record: PendingRecord,
        /// The token attached to the record.
        token: String,
    },
    /// A live pending record already exists for this identity.
    AlreadyPending,
    /// The identity has already been confirmed.
    AlreadyConfirmed,
}

impl<P, S, E, H> Verifier<P, S, E, H>
where
    P: PendingStore,
    S: PersistentStore,
    E: EmailSender,
    H: NoticeHooks,
{
    /// Resolve the identity value of `document` through the configured path.
    pub fn identity_resolve<'a>(&self, document: &'a Document) -> Result<&'a str, VerifyError> {
        let path = &self.settings().identity;
        path.string_get(document)
            .ok_or_else(|| VerifyError::IdentityMissing {
                path: path.to_string(),
            })
    }

    fn identity_filter(&self, identity: &str) -> Filter {
        Filter::eq(self.settings().identity.clone(), identity)
    }

    fn token_filter(&self, token: &str) -> Filter {
        Filter::eq(self.settings().token.clone(), token)
    }

    /// Quarantine a copy of `candidate` under a fresh token.
    ///
    /// Nothing is stored when the identity is already confirmed or already
    /// pending. Sending the link is left to the caller (see
    /// [`verification_notice_send`](Self::verification_notice_send)), so
    /// delivery can be reordered or suppressed.
    ///
    /// The pending check is repeated atomically by the store's unique
    /// insert; a request that loses that race also reports
    /// [`RequestCreated::AlreadyPending`].
    pub async fn request_create(&self, candidate: &Document) -> Result<RequestCreated, VerifyError> {
        let identity = self.identity_resolve(candidate)?;
        let filter = self.identity_filter(identity);

        let confirmed = self
            .persistent
            .persistent_find(&filter)
            .await
            .map_err(VerifyError::from_store)?;
        if confirmed.is_some() {
            tracing::debug!(identity, "Identity already confirmed");
            return Ok(RequestCreated::AlreadyConfirmed);
        }

        let pending = self
            .pending
            .pending_find(&filter)
            .await
            .map_err(VerifyError::from_store)?;
        if pending.is_some() {
            tracing::debug!(identity, "Identity already pending");
            return Ok(RequestCreated::AlreadyPending);
        }

        let config = self.config();
        let token = token_generate(config.token_length);
        let mut document = candidate.clone();
        document.insert(config.token_field.clone(), Value::String(token.clone()));

        match self
            .pending
            .pending_insert(document, &filter, config.ttl)
            .await
            .map_err(VerifyError::from_store)?
        {
            PendingInsert::Inserted(record) => {
                tracing::info!(
                    identity,
                    collection = %config.pending_collection,
                    expires_at = %record.expires_at,
                    "Pending record created"
                );
                Ok(RequestCreated::Created { record, token })
            }
            PendingInsert::Duplicate => {
                tracing::warn!(identity, "Concurrent request already created a pending record");
                Ok(RequestCreated::AlreadyPending)
            }
        }
    }

    /// Promote the pending record holding `token` into the persistent store.
    ///
    /// Returns `None` when no live record holds the token (never issued,
    /// expired, rotated by a resend, or already confirmed).
    ///
    /// The persistent insert happens before the pending delete: if the
    /// delete fails the pending record stays and the link can be retried.
    /// A failed confirmation notice does not undo the promotion.
    pub async fn request_confirm(&self, token: &str) -> Result<Option<PersistentRecord>, VerifyError> {
        let filter = self.token_filter(token);

        let Some(pending) = self
            .pending
            .pending_find(&filter)
            .await
            .map_err(VerifyError::from_store)?
        else {
            tracing::debug!("Confirmation token not found");
            return Ok(None);
        };

        let mut document = pending.document;
        self.settings().token.value_remove(&mut document);

        let record = self
            .persistent
            .persistent_insert(document)
            .await
            .map_err(VerifyError::from_store)?;

        self.pending
            .pending_delete(&filter)
            .await
            .map_err(VerifyError::from_store)?;

        let identity = self.settings().identity.string_get(&record.document);
        tracing::info!(identity, record_id = %record.id, "Pending record confirmed");

        if self.config().send_confirmation {
            match identity {
                Some(identity) => {
                    // Outcome is reported through the hooks only.
                    let _ = self.confirmation_notice_send(identity).await;
                }
                None => tracing::warn!("Confirmed record has no identity; skipping notice"),
            }
        }

        Ok(Some(record))
    }

    /// Issue a new token for the pending record of `identity` and send a
    /// fresh verification notice.
    ///
    /// Returns `false` when nothing is pending for `identity`. The previous
    /// token stops working as soon as the store update lands.
    pub async fn request_resend(&self, identity: &str) -> Result<bool, VerifyError> {
        let filter = self.identity_filter(identity);

        let Some(mut pending) = self
            .pending
            .pending_find(&filter)
            .await
            .map_err(VerifyError::from_store)?
        else {
            tracing::debug!(identity, "Nothing pending to resend");
            return Ok(false);
        };

        let config = self.config();
        let token = token_generate(config.token_length);
        pending
            .document
            .insert(config.token_field.clone(), Value::String(token.clone()));

        let updated = self
            .pending
            .pending_update(&pending)
            .await
            .map_err(VerifyError::from_store)?;
        if !updated {
            tracing::debug!(identity, "Pending record vanished before resend");
            return Ok(false);
        }

        self.verification_notice_send(identity, &token).await?;
        tracing::info!(identity, "Verification token rotated");

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        EmailSendError, FieldPath, SendReceipt, VerifyConfig,
        memory::{MemoryPendingStore, MemoryPersistentStore, MemoryStoreError, RecordingSender},
    };
    use serde_json::json;
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type TestVerifier = Verifier<MemoryPendingStore, MemoryPersistentStore, RecordingSender>;

    fn verifier_with(config: VerifyConfig) -> TestVerifier {
        Verifier::new(config, MemoryPendingStore::new(), MemoryPersistentStore::new())
            .unwrap()
            .with_email_sender(RecordingSender::new())
    }

    fn verifier() -> TestVerifier {
        verifier_with(VerifyConfig::default())
    }

    fn candidate(email: &str) -> Document {
        json!({ "email": email, "name": "Ada", "plan": { "tier": "pro", "seats": 3 } })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn by_email(email: &str) -> Filter {
        Filter::eq(FieldPath::key("email"), email)
    }

    async fn created_token(v: &TestVerifier, email: &str) -> String {
        match v.request_create(&candidate(email)).await.unwrap() {
            RequestCreated::Created { token, .. } => token,
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_then_confirm_promotes_without_token() {
        let v = verifier();
        let original = candidate("a@example.com");
        let token = created_token(&v, "a@example.com").await;
        assert_eq!(token.len(), 48);

        let record = v.request_confirm(&token).await.unwrap().expect("confirmed");

        assert_eq!(record.document["email"], json!("a@example.com"));
        assert!(!record.document.contains_key("verification_token"));
        // every candidate field survives unchanged
        assert_eq!(record.document, original);
        assert!(v.pending_store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn create_does_not_touch_caller_document() {
        let v = verifier();
        let original = candidate("a@example.com");
        let copy = original.clone();
        v.request_create(&original).await.unwrap();
        assert_eq!(original, copy);
    }

    #[tokio::test]
    async fn create_stores_token_under_configured_field() {
        let v = verifier_with(VerifyConfig {
            token_field: "tok".to_string(),
            token_length: 16,
            ..Default::default()
        });
        let RequestCreated::Created { record, token } =
            v.request_create(&candidate("a@example.com")).await.unwrap()
        else {
            panic!("expected Created");
        };
        assert_eq!(record.document["tok"], json!(token));
        assert_eq!(record.token(&FieldPath::key("tok")), Some(token.as_str()));
        assert_eq!(token.len(), 16);
    }

    #[tokio::test]
    async fn create_does_not_send_notice() {
        let v = verifier();
        created_token(&v, "a@example.com").await;
        assert!(v.email_sender().messages().is_empty());
    }

    #[tokio::test]
    async fn create_reports_already_pending() {
        let v = verifier();
        created_token(&v, "a@example.com").await;

        let second = v.request_create(&candidate("a@example.com")).await.unwrap();
        assert_eq!(second, RequestCreated::AlreadyPending);
        assert_eq!(v.pending_store().count(&by_email("a@example.com")).unwrap(), 1);
    }

    #[tokio::test]
    async fn create_reports_already_confirmed() {
        let v = verifier();
        let token = created_token(&v, "a@example.com").await;
        v.request_confirm(&token).await.unwrap().unwrap();

        let again = v.request_create(&candidate("a@example.com")).await.unwrap();
        assert_eq!(again, RequestCreated::AlreadyConfirmed);
        assert!(v.pending_store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn create_requires_identity() {
        let v = verifier();
        let doc = json!({ "name": "Ada" }).as_object().cloned().unwrap();
        let err = v.request_create(&doc).await.unwrap_err();
        assert!(matches!(err, VerifyError::IdentityMissing { ref path } if path == "email"));
        assert!(v.pending_store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn create_and_resend_with_nested_identity() {
        let v = verifier_with(VerifyConfig {
            identity_field: "contact.email".to_string(),
            ..Default::default()
        });
        let doc = json!({ "contact": { "email": "n@example.com" }, "name": "N" })
            .as_object()
            .cloned()
            .unwrap();

        let RequestCreated::Created { .. } = v.request_create(&doc).await.unwrap() else {
            panic!("expected Created");
        };
        assert_eq!(
            v.request_create(&doc).await.unwrap(),
            RequestCreated::AlreadyPending
        );
        assert!(v.request_resend("n@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn confirm_unknown_token_is_not_found() {
        let v = verifier();
        created_token(&v, "a@example.com").await;

        assert!(v.request_confirm("never-issued").await.unwrap().is_none());
        assert!(v.persistent_store().records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_is_single_use() {
        let v = verifier();
        let token = created_token(&v, "a@example.com").await;

        assert!(v.request_confirm(&token).await.unwrap().is_some());
        assert!(v.request_confirm(&token).await.unwrap().is_none());
        assert_eq!(v.persistent_store().records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirm_after_ttl_is_not_found() {
        let v = verifier_with(VerifyConfig {
            ttl: Duration::from_secs(1),
            ..Default::default()
        });
        let token = created_token(&v, "a@example.com").await;

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(v.request_confirm(&token).await.unwrap().is_none());
        assert!(v.persistent_store().records().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_keeps_pending_when_persistent_insert_fails() {
        let v = verifier();
        let token = created_token(&v, "a@example.com").await;

        v.persistent_store().inserts_fail(true);
        let err = v.request_confirm(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::Store(_)));
        assert_eq!(v.pending_store().count(&by_email("a@example.com")).unwrap(), 1);

        v.persistent_store().inserts_fail(false);
        assert!(v.request_confirm(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn confirm_sends_success_notice() {
        let v = verifier();
        let token = created_token(&v, "a@example.com").await;
        v.request_confirm(&token).await.unwrap();

        let message = v.email_sender().last_to("a@example.com").expect("notice");
        assert_eq!(message.subject, "Successfully verified!");
    }

    #[tokio::test]
    async fn confirm_skips_notice_when_disabled() {
        let v = verifier_with(VerifyConfig {
            send_confirmation: false,
            ..Default::default()
        });
        let token = created_token(&v, "a@example.com").await;
        v.request_confirm(&token).await.unwrap();
        assert!(v.email_sender().messages().is_empty());
    }

    #[tokio::test]
    async fn confirm_survives_notice_failure() {
        let v = verifier();
        let token = created_token(&v, "a@example.com").await;
        v.email_sender().sends_fail(true);

        let record = v.request_confirm(&token).await.unwrap();
        assert!(record.is_some());
        assert_eq!(v.persistent_store().records().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resend_rotates_token() {
        let v = verifier();
        let t1 = created_token(&v, "b@example.com").await;

        assert!(v.request_resend("b@example.com").await.unwrap());

        let pending = v
            .pending_store()
            .pending_find(&by_email("b@example.com"))
            .await
            .unwrap()
            .unwrap();
        let t2 = pending
            .token(&FieldPath::key("verification_token"))
            .unwrap()
            .to_string();
        assert_ne!(t1, t2);

        let message = v.email_sender().last_to("b@example.com").expect("notice");
        assert!(message.text.contains(&t2));

        assert!(v.request_confirm(&t1).await.unwrap().is_none());
        let record = v.request_confirm(&t2).await.unwrap().expect("confirmed");
        assert_eq!(record.document["email"], json!("b@example.com"));
    }

    #[tokio::test]
    async fn resend_unknown_identity_is_false() {
        let v = verifier();
        assert!(!v.request_resend("nobody@example.com").await.unwrap());
        assert!(v.email_sender().messages().is_empty());
    }

    #[tokio::test]
    async fn resend_reports_delivery_failure() {
        let v = verifier();
        created_token(&v, "a@example.com").await;
        v.email_sender().sends_fail(true);

        let err = v.request_resend("a@example.com").await.unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Delivery(EmailSendError::DeliveryError(_))
        ));
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        #[derive(Clone)]
        struct Broken;

        impl PersistentStore for Broken {
            type Error = MemoryStoreError;

            async fn persistent_find(
                &self,
                _filter: &Filter,
            ) -> Result<Option<PersistentRecord>, Self::Error> {
                Err(MemoryStoreError::Unavailable)
            }

            async fn persistent_insert(
                &self,
                _document: Document,
            ) -> Result<PersistentRecord, Self::Error> {
                Err(MemoryStoreError::Unavailable)
            }
        }

        let pending = MemoryPendingStore::new();
        let v = Verifier::new(VerifyConfig::default(), pending.clone(), Broken).unwrap();
        let err = v.request_create(&candidate("a@example.com")).await.unwrap_err();

        let VerifyError::Store(source) = err else {
            panic!("expected store error");
        };
        assert_eq!(source.to_string(), "memory store unavailable");
        assert!(pending.is_empty().unwrap());
    }

    #[tokio::test]
    async fn custom_hooks_see_outcomes() {
        #[derive(Clone, Default)]
        struct Seen(Arc<Mutex<Vec<(String, bool)>>>);

        impl NoticeHooks for Seen {
            fn on_confirmation_sent(
                &self,
                to: &str,
                result: &Result<SendReceipt, EmailSendError>,
            ) -> impl Future<Output = ()> + Send {
                self.0
                    .lock()
                    .unwrap()
                    .push((to.to_string(), result.is_ok()));
                async {}
            }
        }

        let seen = Seen::default();
        let v = verifier().with_hooks(seen.clone());
        let token = match v.request_create(&candidate("a@example.com")).await.unwrap() {
            RequestCreated::Created { token, .. } => token,
            other => panic!("expected Created, got {other:?}"),
        };
        v.request_confirm(&token).await.unwrap();

        assert_eq!(
            seen.0.lock().unwrap().as_slice(),
            &[("a@example.com".to_string(), true)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_leave_one_pending_record() {
        let v = verifier();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let v = v.clone();
            handles.push(tokio::spawn(async move {
                v.request_create(&candidate("race@example.com")).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                RequestCreated::Created { .. } => created += 1,
                RequestCreated::AlreadyPending => {}
                RequestCreated::AlreadyConfirmed => panic!("nothing was confirmed"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(
            v.pending_store().count(&by_email("race@example.com")).unwrap(),
            1
        );
    }
}
