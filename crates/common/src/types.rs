use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the collection holding notification requests.
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

/// Store-assigned identifier of a notification record.
pub type RecordId = Uuid;

/// Notification delivery status, derived from a record's outcome fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Errored,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Errored => write!(f, "errored"),
        }
    }
}

/// A notification request as stored in the Record Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: RecordId,
    pub recipient: Option<String>,
    pub title: String,
    pub body: String,
    pub conversation_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl NotificationRecord {
    /// Destination token, or `None` when absent or empty.
    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref().filter(|r| !r.is_empty())
    }

    pub fn status(&self) -> DeliveryStatus {
        if self.sent {
            DeliveryStatus::Sent
        } else if self.error.is_some() {
            DeliveryStatus::Errored
        } else {
            DeliveryStatus::Pending
        }
    }

    /// Apply a patch in place, resolving server timestamps to `now`.
    pub fn apply(&mut self, patch: &RecordPatch, now: DateTime<Utc>) {
        if let Some(sent) = patch.sent {
            self.sent = sent;
        }
        if let Some(ts) = patch.sent_at {
            self.sent_at = Some(ts.resolve(now));
        }
        if let Some(error) = &patch.error {
            self.error = Some(error.clone());
        }
    }
}

/// Producer-side shape of a new notification request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient: Option<String>,
    pub title: String,
    pub body: String,
    pub conversation_ref: Option<String>,
}

impl NewNotification {
    pub fn new(
        recipient: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: Some(recipient.into()),
            title: title.into(),
            body: body.into(),
            conversation_ref: None,
        }
    }

    pub fn with_conversation_ref(mut self, conversation_ref: impl Into<String>) -> Self {
        self.conversation_ref = Some(conversation_ref.into());
        self
    }
}

/// A timestamp value in a field update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Resolved by the store at write time, never from the caller's clock.
    Server,
    At(DateTime<Utc>),
}

impl Timestamp {
    pub fn resolve(self, server_now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timestamp::Server => server_now,
            Timestamp::At(ts) => ts,
        }
    }
}

/// Partial field update merged atomically into a record.
///
/// `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub sent: Option<bool>,
    pub sent_at: Option<Timestamp>,
    pub error: Option<String>,
}

impl RecordPatch {
    /// `sent = true` together with a server-resolved `sent_at`.
    pub fn delivered() -> Self {
        Self {
            sent: Some(true),
            sent_at: Some(Timestamp::Server),
            error: None,
        }
    }

    /// Record a delivery failure without touching `sent`.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            sent: None,
            sent_at: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            recipient: Some("tok1".to_string()),
            title: "Hi".to_string(),
            body: "there".to_string(),
            conversation_ref: None,
            created_at: Utc::now(),
            sent: false,
            sent_at: None,
            error: None,
        }
    }

    #[test]
    fn test_empty_recipient_is_absent() {
        let mut r = record();
        r.recipient = Some(String::new());
        assert_eq!(r.recipient(), None);
        r.recipient = None;
        assert_eq!(r.recipient(), None);
    }

    #[test]
    fn test_status_derivation() {
        let mut r = record();
        assert_eq!(r.status(), DeliveryStatus::Pending);

        r.error = Some("boom".to_string());
        assert_eq!(r.status(), DeliveryStatus::Errored);

        r.error = None;
        r.sent = true;
        assert_eq!(r.status(), DeliveryStatus::Sent);
    }

    #[test]
    fn test_apply_delivered_resolves_server_timestamp() {
        let mut r = record();
        let now = Utc::now();
        r.apply(&RecordPatch::delivered(), now);
        assert!(r.sent);
        assert_eq!(r.sent_at, Some(now));
        assert_eq!(r.error, None);
    }

    #[test]
    fn test_apply_failed_leaves_sent_untouched() {
        let mut r = record();
        r.apply(&RecordPatch::failed("invalid token"), Utc::now());
        assert!(!r.sent);
        assert_eq!(r.sent_at, None);
        assert_eq!(r.error.as_deref(), Some("invalid token"));
    }
}
