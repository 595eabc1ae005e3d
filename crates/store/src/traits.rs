use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use relay_common::error::StoreError;
use relay_common::types::{NotificationRecord, RecordId, RecordPatch};

/// Capacity of the channel returned by [`RecordStore::watch_created`].
pub const WATCH_BUFFER: usize = 1024;

/// The durable, queryable, event-emitting store holding notification records.
///
/// Implementations must be `Send + Sync + 'static` so a single handle can be
/// shared across concurrently running trigger handlers.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Subscribe to creation events in `collection`.
    ///
    /// Yields one snapshot per newly inserted record. Records that are still
    /// pending (`sent = false`, no `error`) when the subscription opens are
    /// replayed first, so requests written while no watcher was running are
    /// not lost. A record may be yielded more than once; consumers rely on the
    /// record's own state to stay idempotent. The stream ends when the store
    /// shuts down or the receiver is dropped.
    async fn watch_created(
        &self,
        collection: &str,
    ) -> Result<mpsc::Receiver<NotificationRecord>, StoreError>;

    /// Atomically merge `patch` into the record. `Timestamp::Server` fields
    /// are resolved by the store at write time.
    async fn update(&self, id: RecordId, patch: &RecordPatch) -> Result<(), StoreError>;

    /// Ids of every record whose `created_at` is strictly before `cutoff`.
    async fn created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecordId>, StoreError>;

    /// Delete the given records as one batch. Returns the number removed;
    /// ids that no longer exist are ignored.
    async fn delete_batch(&self, ids: &[RecordId]) -> Result<u64, StoreError>;
}
