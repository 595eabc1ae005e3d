//! Dispatcher: relays one newly created notification record to the push gateway.
//!
//! Per invocation:
//! 1. Skip records that are already terminal or have no recipient
//! 2. Build the delivery message and call the gateway exactly once
//! 3. Write the terminal outcome back to the record in a single patch
//!
//! Delivery failures are recorded, never retried. A failing write-back is
//! logged and surfaced as `WriteOutcome::Logged`; it never fails the invocation.

use std::sync::Arc;

use relay_common::types::{NotificationRecord, RecordPatch};
use relay_store::RecordStore;

use crate::gateway::PushGateway;
use crate::message::PushMessage;

/// Why a record was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySent,
    AlreadyErrored,
    MissingRecipient,
}

/// Result of the outcome write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The write failed; the reason was logged and swallowed.
    Logged(String),
}

/// What a single dispatcher invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Sent { write: WriteOutcome },
    Errored { error: String, write: WriteOutcome },
}

pub struct Dispatcher {
    gateway: Arc<dyn PushGateway>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn PushGateway>) -> Self {
        Self { gateway }
    }

    /// Handle one creation event for `record`.
    pub async fn dispatch(
        &self,
        record: &NotificationRecord,
        store: &dyn RecordStore,
    ) -> DispatchOutcome {
        let token = match Self::guard(record) {
            Ok(token) => token,
            Err(reason) => {
                tracing::debug!(record_id = %record.id, ?reason, "Notification skipped");
                return DispatchOutcome::Skipped(reason);
            }
        };

        let message = PushMessage::new(
            token,
            record.title.as_str(),
            record.body.as_str(),
            record.conversation_ref.as_deref(),
        );

        match self.gateway.send(&message).await {
            Ok(message_id) => {
                let write = Self::write_back(store, record, RecordPatch::delivered()).await;
                tracing::info!(
                    record_id = %record.id,
                    recipient = %token,
                    message_id = %message_id,
                    "Notification sent"
                );
                DispatchOutcome::Sent { write }
            }
            Err(err) => {
                tracing::error!(
                    record_id = %record.id,
                    recipient = %token,
                    error = ?err,
                    "Push delivery failed"
                );
                let error = err.into_reason();
                let write = Self::write_back(store, record, RecordPatch::failed(error.as_str())).await;
                DispatchOutcome::Errored { error, write }
            }
        }
    }

    /// Returns the destination token, or why the record must not be sent.
    fn guard(record: &NotificationRecord) -> Result<&str, SkipReason> {
        if record.sent {
            return Err(SkipReason::AlreadySent);
        }
        if record.error.is_some() {
            return Err(SkipReason::AlreadyErrored);
        }
        record.recipient().ok_or(SkipReason::MissingRecipient)
    }

    async fn write_back(
        store: &dyn RecordStore,
        record: &NotificationRecord,
        patch: RecordPatch,
    ) -> WriteOutcome {
        match store.update(record.id, &patch).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                tracing::error!(
                    record_id = %record.id,
                    error = %e,
                    "Failed to record delivery outcome"
                );
                WriteOutcome::Logged(e.to_string())
            }
        }
    }
}
