//! Retention sweeper. Purges notification records past the retention window.
//!
//! Each run recomputes the full age-filtered set from scratch, so a failed or
//! missed run is picked up by the next one. No checkpoint is kept.

use chrono::{DateTime, Duration, Utc};

use relay_common::error::StoreError;
use relay_store::RecordStore;

/// Records older than this many days are deleted.
pub const RETENTION_WINDOW_DAYS: i64 = 7;

/// Maximum ids per delete batch.
pub const DELETE_BATCH_SIZE: usize = 500;

/// Result of a single sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub cutoff: DateTime<Utc>,
    /// Records matching the age filter at read time.
    pub matched: usize,
    /// Records actually removed.
    pub deleted: u64,
    /// Ids in batches that failed to delete.
    pub failed: usize,
}

pub struct Sweeper;

impl Sweeper {
    pub fn new() -> Self {
        Self
    }

    pub fn retention_window() -> Duration {
        Duration::days(RETENTION_WINDOW_DAYS)
    }

    /// Sweep using the current wall clock.
    pub async fn sweep(&self, store: &dyn RecordStore) -> Result<SweepReport, StoreError> {
        self.sweep_at(store, Utc::now()).await
    }

    /// Sweep every record created before `now - RETENTION_WINDOW_DAYS`.
    ///
    /// A failing batch does not stop the remaining ones. The run fails only
    /// when the range read fails or every batch of a non-empty set fails.
    pub async fn sweep_at(
        &self,
        store: &dyn RecordStore,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, StoreError> {
        let cutoff = now - Self::retention_window();
        let ids = store.created_before(cutoff).await?;

        let mut deleted = 0u64;
        let mut failed = 0usize;
        let mut last_error = None;

        for chunk in ids.chunks(DELETE_BATCH_SIZE) {
            match store.delete_batch(chunk).await {
                Ok(n) => deleted += n,
                Err(e) => {
                    tracing::warn!(
                        batch_size = chunk.len(),
                        error = %e,
                        "Delete batch failed, continuing"
                    );
                    failed += chunk.len();
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error
            && failed == ids.len()
        {
            tracing::error!(matched = ids.len(), error = %e, "Retention sweep failed");
            return Err(e);
        }

        tracing::info!(
            cutoff = %cutoff,
            matched = ids.len(),
            deleted,
            failed,
            "Deleted old notifications"
        );

        Ok(SweepReport {
            cutoff,
            matched: ids.len(),
            deleted,
            failed,
        })
    }
}

impl Default for Sweeper {
    fn default() -> Self {
        Self::new()
    }
}
