use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a Record Store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A push gateway rejected or failed to accept a message.
///
/// `message` is the human-readable reason and is what gets recorded on the
/// notification's `error` field. `code` carries the backend status when known
/// (e.g. `INVALID_ARGUMENT`, `UNREGISTERED`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub message: String,
    pub code: Option<String>,
}

impl DeliveryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Text to record on the notification. Never empty: a blank message falls
    /// back to the backend code, then to a generic reason.
    pub fn into_reason(self) -> String {
        if !self.message.trim().is_empty() {
            return self.message;
        }
        match self.code {
            Some(code) if !code.trim().is_empty() => code,
            _ => DEFAULT_DELIVERY_REASON.to_string(),
        }
    }
}

/// Recorded when a gateway failure carries neither a message nor a code.
pub const DEFAULT_DELIVERY_REASON: &str = "delivery failed";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_displays_message_only() {
        let err = DeliveryError::new("invalid token").with_code("INVALID_ARGUMENT");
        assert_eq!(err.to_string(), "invalid token");
        assert_eq!(err.code.as_deref(), Some("INVALID_ARGUMENT"));
    }

    #[test]
    fn test_blank_delivery_error_reason_falls_back() {
        assert_eq!(
            DeliveryError::new("invalid token").with_code("INVALID_ARGUMENT").into_reason(),
            "invalid token"
        );
        assert_eq!(
            DeliveryError::new("").with_code("UNREGISTERED").into_reason(),
            "UNREGISTERED"
        );
        assert_eq!(DeliveryError::new("  ").into_reason(), DEFAULT_DELIVERY_REASON);
        assert_eq!(
            DeliveryError::new("").with_code("").into_reason(),
            DEFAULT_DELIVERY_REASON
        );
    }
}
