//! In-memory stores and a recording mail sender.
//!
//! Everything here is `Clone` and shares state through `Arc<Mutex<..>>`, so
//! a test can keep a handle to the same store the [`Verifier`] uses.
//!
//! [`Verifier`]: crate::Verifier

use crate::{
    backend::{PendingInsert, PendingStore, PersistentStore},
    email_sender::{
        EmailMessage, EmailSendError, EmailSender, EmailTransport, SendReceipt, TransportOptions,
    },
    record::{Document, Filter, PendingRecord, PersistentRecord},
};
use chrono::{TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by the in-memory stores.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// A thread panicked while holding the store lock.
    #[error("memory store lock poisoned")]
    Poisoned,

    /// The TTL does not fit in a timestamp offset.
    #[error("ttl of {0:?} is out of range")]
    TtlOverflow(Duration),

    /// The store was told to reject writes.
    #[error("memory store unavailable")]
    Unavailable,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, MemoryStoreError> {
    mutex.lock().map_err(|_| MemoryStoreError::Poisoned)
}

/// Pending store with lazy TTL expiry.
///
/// Expired records are dropped on every access, so they are never visible
/// through [`PendingStore`] methods. Uniqueness on insert is checked under
/// the same lock as the insert itself.
#[derive(Debug, Clone, Default)]
pub struct MemoryPendingStore {
    records: Arc<Mutex<HashMap<Uuid, PendingRecord>>>,
}

impl MemoryPendingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired records now, returning how many were removed.
    pub fn expired_purge(&self) -> Result<usize, MemoryStoreError> {
        let mut records = lock(&self.records)?;
        Ok(purge(&mut records))
    }

    /// Number of live records.
    pub fn len(&self) -> Result<usize, MemoryStoreError> {
        let mut records = lock(&self.records)?;
        purge(&mut records);
        Ok(records.len())
    }

    /// Whether the store holds no live records.
    pub fn is_empty(&self) -> Result<bool, MemoryStoreError> {
        Ok(self.len()? == 0)
    }

    /// Count live records matching `filter`.
    pub fn count(&self, filter: &Filter) -> Result<usize, MemoryStoreError> {
        let mut records = lock(&self.records)?;
        purge(&mut records);
        Ok(records
            .values()
            .filter(|r| filter.matches(&r.document))
            .count())
    }
}

fn purge(records: &mut HashMap<Uuid, PendingRecord>) -> usize {
    let now = Utc::now();
    let before = records.len();
    records.retain(|_, r| !r.is_expired_at(now));
    before - records.len()
}

impl PendingStore for MemoryPendingStore {
    type Error = MemoryStoreError;

    async fn pending_insert(
        &self,
        document: Document,
        unique: &Filter,
        ttl: Duration,
    ) -> Result<PendingInsert, Self::Error> {
        let lifetime = TimeDelta::from_std(ttl).map_err(|_| MemoryStoreError::TtlOverflow(ttl))?;
        let mut records = lock(&self.records)?;
        purge(&mut records);

        if records.values().any(|r| unique.matches(&r.document)) {
            return Ok(PendingInsert::Duplicate);
        }

        let created_at = Utc::now();
        let record = PendingRecord {
            id: Uuid::new_v4(),
            document,
            created_at,
            expires_at: created_at + lifetime,
        };
        records.insert(record.id, record.clone());
        Ok(PendingInsert::Inserted(record))
    }

    async fn pending_find(&self, filter: &Filter) -> Result<Option<PendingRecord>, Self::Error> {
        let mut records = lock(&self.records)?;
        purge(&mut records);
        Ok(records
            .values()
            .find(|r| filter.matches(&r.document))
            .cloned())
    }

    async fn pending_update(&self, record: &PendingRecord) -> Result<bool, Self::Error> {
        let mut records = lock(&self.records)?;
        purge(&mut records);
        match records.get_mut(&record.id) {
            Some(stored) => {
                stored.document = record.document.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pending_delete(&self, filter: &Filter) -> Result<u64, Self::Error> {
        let mut records = lock(&self.records)?;
        purge(&mut records);
        let before = records.len();
        records.retain(|_, r| !filter.matches(&r.document));
        Ok((before - records.len()) as u64)
    }
}

/// Persistent store backed by a vector.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistentStore {
    records: Arc<Mutex<Vec<PersistentRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryPersistentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail with [`MemoryStoreError::Unavailable`].
    pub fn inserts_fail(&self, fail: bool) {
        self.unavailable.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all stored records, in insertion order.
    pub fn records(&self) -> Result<Vec<PersistentRecord>, MemoryStoreError> {
        Ok(lock(&self.records)?.clone())
    }

    /// Count records matching `filter`.
    pub fn count(&self, filter: &Filter) -> Result<usize, MemoryStoreError> {
        Ok(lock(&self.records)?
            .iter()
            .filter(|r| filter.matches(&r.document))
            .count())
    }
}

impl PersistentStore for MemoryPersistentStore {
    type Error = MemoryStoreError;

    async fn persistent_find(
        &self,
        filter: &Filter,
    ) -> Result<Option<PersistentRecord>, Self::Error> {
        Ok(lock(&self.records)?
            .iter()
            .find(|r| filter.matches(&r.document))
            .cloned())
    }

    async fn persistent_insert(&self, document: Document) -> Result<PersistentRecord, Self::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::Unavailable);
        }

        let record = PersistentRecord {
            id: Uuid::new_v4(),
            document,
            created_at: Utc::now(),
        };
        lock(&self.records)?.push(record.clone());
        Ok(record)
    }
}

/// Sender that keeps every message in an in-memory outbox.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSender {
    /// Create a sender with an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with [`EmailSendError::DeliveryError`].
    pub fn sends_fail(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// All messages sent so far.
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    /// Most recent message sent to `to`.
    pub fn last_to(&self, to: &str) -> Option<EmailMessage> {
        self.messages().into_iter().rev().find(|m| m.to == to)
    }
}

impl EmailSender for RecordingSender {
    async fn send(&self, message: EmailMessage) -> Result<SendReceipt, EmailSendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailSendError::DeliveryError(format!(
                "refused message to {}",
                message.to
            )));
        }

        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| EmailSendError::DeliveryError("outbox lock poisoned".to_string()))?;
        outbox.push(message);
        Ok(SendReceipt {
            response: format!("250 OK queued as #{}", outbox.len()),
        })
    }
}

impl EmailTransport for RecordingSender {
    fn transport_build(_options: &TransportOptions) -> Result<Self, EmailSendError> {
        Ok(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldPath;
    use serde_json::json;

    fn doc(email: &str) -> Document {
        json!({ "email": email, "name": "Ada" })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn by_email(email: &str) -> Filter {
        Filter::eq(FieldPath::key("email"), email)
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_identity() {
        let store = MemoryPendingStore::new();
        let ttl = Duration::from_secs(60);

        let first = store
            .pending_insert(doc("a@example.com"), &by_email("a@example.com"), ttl)
            .await
            .unwrap();
        assert!(matches!(first, PendingInsert::Inserted(_)));

        let second = store
            .pending_insert(doc("a@example.com"), &by_email("a@example.com"), ttl)
            .await
            .unwrap();
        assert_eq!(second, PendingInsert::Duplicate);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_records_are_invisible() {
        let store = MemoryPendingStore::new();
        store
            .pending_insert(doc("a@example.com"), &by_email("a@example.com"), Duration::ZERO)
            .await
            .unwrap();

        let found = store.pending_find(&by_email("a@example.com")).await.unwrap();
        assert!(found.is_none());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn update_keeps_timestamps_and_reports_missing() {
        let store = MemoryPendingStore::new();
        let PendingInsert::Inserted(mut record) = store
            .pending_insert(doc("a@example.com"), &by_email("a@example.com"), Duration::from_secs(60))
            .await
            .unwrap()
        else {
            panic!("expected insert");
        };

        record.document.insert("name".to_string(), json!("Grace"));
        assert!(store.pending_update(&record).await.unwrap());

        let found = store
            .pending_find(&by_email("a@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.document["name"], json!("Grace"));
        assert_eq!(found.created_at, record.created_at);

        store.pending_delete(&by_email("a@example.com")).await.unwrap();
        assert!(!store.pending_update(&record).await.unwrap());
    }

    #[tokio::test]
    async fn delete_counts_removed_records() {
        let store = MemoryPendingStore::new();
        let ttl = Duration::from_secs(60);
        for email in ["a@example.com", "b@example.com"] {
            store
                .pending_insert(doc(email), &by_email(email), ttl)
                .await
                .unwrap();
        }

        assert_eq!(store.pending_delete(&by_email("a@example.com")).await.unwrap(), 1);
        assert_eq!(store.pending_delete(&by_email("a@example.com")).await.unwrap(), 0);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn persistent_insert_can_be_made_to_fail() {
        let store = MemoryPersistentStore::new();
        store.inserts_fail(true);
        assert_eq!(
            store.persistent_insert(doc("a@example.com")).await,
            Err(MemoryStoreError::Unavailable)
        );

        store.inserts_fail(false);
        store.persistent_insert(doc("a@example.com")).await.unwrap();
        let found = store.persistent_find(&by_email("a@example.com")).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn recording_sender_keeps_outbox() {
        let sender = RecordingSender::new();
        let message = EmailMessage {
            from: "noreply@example.com".to_string(),
            to: "a@example.com".to_string(),
            subject: "hi".to_string(),
            html: String::new(),
            text: String::new(),
        };

        let receipt = sender.send(message.clone()).await.unwrap();
        assert_eq!(receipt.response, "250 OK queued as #1");
        assert_eq!(sender.last_to("a@example.com"), Some(message.clone()));

        sender.sends_fail(true);
        assert!(sender.send(message).await.is_err());
        assert_eq!(sender.messages().len(), 1);
    }
}
