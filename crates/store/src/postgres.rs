use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use relay_common::error::StoreError;
use relay_common::types::{
    NOTIFICATIONS_COLLECTION, NewNotification, NotificationRecord, RecordId, RecordPatch, Timestamp,
};

use crate::traits::{RecordStore, WATCH_BUFFER};

/// `NOTIFY` channel fired by the `notifications_created` insert trigger.
pub const CREATED_CHANNEL: &str = "notifications_created";

/// Pause before retrying after the listener connection drops.
const LISTEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How often pending records are re-read while the listener is healthy.
const RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Number of recently forwarded ids remembered per watcher.
const FORWARDED_MEMORY: usize = 16 * WATCH_BUFFER;

/// PostgreSQL-backed Record Store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Insert a new notification request. Fires the create trigger.
    pub async fn insert(&self, new: &NewNotification) -> Result<NotificationRecord, StoreError> {
        let record: NotificationRecord = sqlx::query_as(
            r#"
            INSERT INTO notifications (recipient, title, body, conversation_ref)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&new.recipient)
        .bind(&new.title)
        .bind(&new.body)
        .bind(&new.conversation_ref)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Fetch a single record by id.
    pub async fn get(&self, id: RecordId) -> Result<NotificationRecord, StoreError> {
        fetch_record(&self.pool, id).await
    }
}

async fn fetch_record(pool: &PgPool, id: RecordId) -> Result<NotificationRecord, StoreError> {
    sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(StoreError::NotFound(id))
}

/// Every record still awaiting its first dispatch, oldest first.
async fn fetch_pending(pool: &PgPool) -> Result<Vec<NotificationRecord>, StoreError> {
    let records = sqlx::query_as(
        r#"
        SELECT * FROM notifications
        WHERE sent = false AND error IS NULL
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// The watcher's receiver was dropped.
struct WatcherGone;

/// Ids already handed to the watcher, bounded to the most recent ones.
#[derive(Default)]
struct Forwarded {
    order: VecDeque<RecordId>,
    seen: HashSet<RecordId>,
}

impl Forwarded {
    /// True the first time `id` is offered.
    fn first_time(&mut self, id: RecordId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > FORWARDED_MEMORY
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        true
    }

    /// Send `record` unless this watcher already received it. Returns whether
    /// it was sent.
    async fn offer(
        &mut self,
        tx: &mpsc::Sender<NotificationRecord>,
        record: NotificationRecord,
    ) -> Result<bool, WatcherGone> {
        if tx.is_closed() {
            return Err(WatcherGone);
        }
        if !self.first_time(record.id) {
            return Ok(false);
        }
        tx.send(record).await.map_err(|_| WatcherGone)?;
        Ok(true)
    }
}

/// Streams record snapshots to one watcher.
///
/// Notifications carry only the record id; the snapshot is read back before
/// forwarding. Pending records are re-read after LISTEN, after every listener
/// failure and every `RESYNC_INTERVAL`, which covers inserts made while no
/// listener was connected.
struct CreatedForwarder {
    pool: PgPool,
    tx: mpsc::Sender<NotificationRecord>,
    forwarded: Forwarded,
}

impl CreatedForwarder {
    async fn run(mut self, mut listener: PgListener) {
        let mut resync = tokio::time::interval(RESYNC_INTERVAL);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;
                _ = self.tx.closed() => Err(WatcherGone),
                _ = resync.tick() => self.replay_pending().await,
                received = listener.try_recv() => match received {
                    Ok(Some(notification)) => self.forward_notified(notification.payload()).await,
                    Ok(None) => {
                        tracing::warn!("Create listener connection lost, resyncing pending records");
                        resync.reset_immediately();
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Create listener failed, retrying");
                        tokio::time::sleep(LISTEN_RETRY_DELAY).await;
                        resync.reset_immediately();
                        Ok(())
                    }
                },
            };

            if step.is_err() {
                tracing::debug!("Create watcher dropped, stopping listener");
                break;
            }
        }
    }

    async fn forward_notified(&mut self, payload: &str) -> Result<(), WatcherGone> {
        let id: RecordId = match payload.parse() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(payload, error = %e, "Ignoring malformed create notification");
                return Ok(());
            }
        };

        match fetch_record(&self.pool, id).await {
            Ok(record) => self.forward(record).await,
            Err(e) => {
                // Already swept or deleted by its producer.
                tracing::warn!(record_id = %id, error = %e, "Created record not readable");
                Ok(())
            }
        }
    }

    async fn replay_pending(&mut self) -> Result<(), WatcherGone> {
        let pending = match fetch_pending(&self.pool).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Pending record resync failed");
                return Ok(());
            }
        };

        let mut replayed = 0usize;
        for record in pending {
            if self.forwarded.offer(&self.tx, record).await? {
                replayed += 1;
            }
        }
        if replayed > 0 {
            tracing::info!(replayed, "Replayed pending records");
        }
        Ok(())
    }

    async fn forward(&mut self, record: NotificationRecord) -> Result<(), WatcherGone> {
        self.forwarded.offer(&self.tx, record).await.map(|_| ())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn watch_created(
        &self,
        collection: &str,
    ) -> Result<mpsc::Receiver<NotificationRecord>, StoreError> {
        if collection != NOTIFICATIONS_COLLECTION {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }

        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CREATED_CHANNEL).await?;
        tracing::info!(channel = CREATED_CHANNEL, "Listening for created records");

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let forwarder = CreatedForwarder {
            pool: self.pool.clone(),
            tx,
            forwarded: Forwarded::default(),
        };
        tokio::spawn(forwarder.run(listener));
        Ok(rx)
    }

    async fn update(&self, id: RecordId, patch: &RecordPatch) -> Result<(), StoreError> {
        let server_sent_at = matches!(patch.sent_at, Some(Timestamp::Server));
        let explicit_sent_at = match patch.sent_at {
            Some(Timestamp::At(ts)) => Some(ts),
            _ => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET sent = COALESCE($2, sent),
                sent_at = CASE WHEN $3 THEN NOW() ELSE COALESCE($4, sent_at) END,
                error = COALESCE($5, error)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.sent)
        .bind(server_sent_at)
        .bind(explicit_sent_at)
        .bind(&patch.error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecordId>, StoreError> {
        let rows: Vec<(RecordId,)> =
            sqlx::query_as("SELECT id FROM notifications WHERE created_at < $1")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn delete_batch(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
