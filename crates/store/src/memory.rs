use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use relay_common::error::StoreError;
use relay_common::types::{
    DeliveryStatus, NOTIFICATIONS_COLLECTION, NewNotification, NotificationRecord, RecordId,
    RecordPatch,
};

use crate::traits::{RecordStore, WATCH_BUFFER};

/// In-process Record Store.
///
/// Behaves like the PostgreSQL adapter (store-assigned ids and timestamps,
/// create events, atomic patches) and additionally supports failure injection
/// so callers can exercise store outages.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<RecordId, NotificationRecord>,
    watchers: Vec<mpsc::Sender<NotificationRecord>>,
    updates: usize,
    delete_calls: usize,
    fail_updates: bool,
    fail_reads: bool,
    poisoned_ids: HashSet<RecordId>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new request stamped with the current time.
    pub async fn insert(&self, new: NewNotification) -> NotificationRecord {
        self.insert_at(new, Utc::now()).await
    }

    /// Insert a new request with an explicit `created_at`.
    pub async fn insert_at(
        &self,
        new: NewNotification,
        created_at: DateTime<Utc>,
    ) -> NotificationRecord {
        let record = NotificationRecord {
            id: Uuid::new_v4(),
            recipient: new.recipient,
            title: new.title,
            body: new.body,
            conversation_ref: new.conversation_ref,
            created_at,
            sent: false,
            sent_at: None,
            error: None,
        };
        self.put(record.clone()).await;
        record
    }

    /// Store a record verbatim (any state) and announce it to watchers.
    pub async fn put(&self, record: NotificationRecord) {
        let watchers = {
            let mut inner = self.inner.lock().await;
            inner.records.insert(record.id, record.clone());
            inner.watchers.retain(|w| !w.is_closed());
            inner.watchers.clone()
        };

        for watcher in watchers {
            // A closed watcher is pruned on the next insert.
            let _ = watcher.send(record.clone()).await;
        }
    }

    pub async fn get(&self, id: RecordId) -> Option<NotificationRecord> {
        self.inner.lock().await.records.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of successful `update` calls.
    pub async fn update_count(&self) -> usize {
        self.inner.lock().await.updates
    }

    /// Number of `delete_batch` calls, failed ones included.
    pub async fn delete_calls(&self) -> usize {
        self.inner.lock().await.delete_calls
    }

    /// Make every subsequent `update` fail.
    pub async fn set_fail_updates(&self, fail: bool) {
        self.inner.lock().await.fail_updates = fail;
    }

    /// Make every subsequent `created_before` fail.
    pub async fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().await.fail_reads = fail;
    }

    /// Make any `delete_batch` containing `id` fail as a whole.
    pub async fn poison_delete(&self, id: RecordId) {
        self.inner.lock().await.poisoned_ids.insert(id);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn watch_created(
        &self,
        collection: &str,
    ) -> Result<mpsc::Receiver<NotificationRecord>, StoreError> {
        if collection != NOTIFICATIONS_COLLECTION {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }

        // Backlog and registration happen under one lock, so a record is
        // either replayed here or announced by `put`, never both.
        let mut inner = self.inner.lock().await;
        let backlog: Vec<NotificationRecord> = inner
            .records
            .values()
            .filter(|r| r.status() == DeliveryStatus::Pending)
            .cloned()
            .collect();

        let (tx, rx) = mpsc::channel(WATCH_BUFFER + backlog.len());
        for record in backlog {
            // Capacity is reserved for the whole backlog.
            let _ = tx.try_send(record);
        }
        inner.watchers.push(tx);
        Ok(rx)
    }

    async fn update(&self, id: RecordId, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_updates {
            return Err(StoreError::Unavailable("update rejected".to_string()));
        }

        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply(patch, Utc::now());
        inner.updates += 1;
        Ok(())
    }

    async fn created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecordId>, StoreError> {
        let inner = self.inner.lock().await;
        if inner.fail_reads {
            return Err(StoreError::Unavailable("range read rejected".to_string()));
        }

        Ok(inner
            .records
            .values()
            .filter(|r| r.created_at < cutoff)
            .map(|r| r.id)
            .collect())
    }

    async fn delete_batch(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.delete_calls += 1;

        if ids.iter().any(|id| inner.poisoned_ids.contains(id)) {
            return Err(StoreError::Unavailable("batch commit rejected".to_string()));
        }

        let removed = ids
            .iter()
            .filter(|id| inner.records.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }
}
