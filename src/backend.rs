//! Store traits for storage-agnostic verification.
//!
//! This module defines the two stores the workflow talks to: a pending
//! store whose records expire after a TTL, and a persistent store that
//! keeps confirmed records forever.

use crate::record::{Document, Filter, PendingRecord, PersistentRecord};
use std::future::Future;
use std::time::Duration;

/// Result of an insert into the pending store.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingInsert {
    /// The record was stored.
    Inserted(PendingRecord),
    /// A live record already matches the uniqueness filter; nothing was stored.
    Duplicate,
}

/// Pending store: records quarantined until confirmation.
///
/// Records must disappear `ttl` after their creation timestamp. Expired
/// records must never be returned by [`pending_find`](Self::pending_find),
/// whether the store drops them eagerly or lazily.
///
/// # Example
///
/// ```rust,ignore
/// use fast_verify::{PendingInsert, PendingStore};
///
/// #[derive(Clone)]
/// struct MongoPending { /* collection handle */ }
///
/// impl PendingStore for MongoPending {
///     type Error = mongodb::error::Error;
///
///     async fn pending_insert(&self, document: Document, unique: &Filter, ttl: Duration)
///         -> Result<PendingInsert, Self::Error> {
///         // insert_one against a collection with a unique index on the identity
///         // field and a TTL index on `created_at`; map E11000 to Duplicate
///     }
///     // ... implement other methods
/// }
/// ```
pub trait PendingStore: Clone + Send + Sync + 'static {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Atomically insert `document` unless a live record matches `unique`.
    ///
    /// The uniqueness check and the insert must happen as one step (e.g. a
    /// unique index on the identity field). A separate find followed by an
    /// insert lets two concurrent requests for the same identity both pass
    /// the check and store two pending records.
    fn pending_insert(
        &self,
        document: Document,
        unique: &Filter,
        ttl: Duration,
    ) -> impl Future<Output = Result<PendingInsert, Self::Error>> + Send;

    /// Find one live record matching `filter`.
    ///
    /// Returns `None` if nothing matches or the match has expired.
    fn pending_find(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<PendingRecord>, Self::Error>> + Send;

    /// Replace the document of an existing record, keeping its timestamps.
    ///
    /// Returns `false` if the record no longer exists (expired or deleted).
    fn pending_update(
        &self,
        record: &PendingRecord,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Delete every record matching `filter`, returning how many were removed.
    fn pending_delete(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;
}

/// Persistent store: confirmed records, never expired.
pub trait PersistentStore: Clone + Send + Sync + 'static {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Find one record matching `filter`.
    fn persistent_find(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<PersistentRecord>, Self::Error>> + Send;

    /// Insert a confirmed document.
    fn persistent_insert(
        &self,
        document: Document,
    ) -> impl Future<Output = Result<PersistentRecord, Self::Error>> + Send;
}
