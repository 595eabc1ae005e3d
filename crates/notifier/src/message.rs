//! Delivery message in the FCM HTTP v1 wire shape.

use serde::{Deserialize, Serialize};

/// Action the client app registers to open the conversation on tap.
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

/// Android notification channel all chat messages are posted to.
pub const ANDROID_CHANNEL_ID: &str = "wavechat_messages";

/// Platform default notification sound.
pub const DEFAULT_SOUND: &str = "default";

/// Badge increment applied on the Apple delivery path.
pub const APNS_BADGE_INCREMENT: u32 = 1;

/// APNs priority for immediate delivery.
const APNS_PRIORITY_IMMEDIATE: &str = "10";

/// A push message addressed to a single device token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    pub notification: NotificationContent,
    pub data: MessageData,
    pub android: AndroidConfig,
    pub apns: ApnsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

/// Auxiliary key/value payload handed to the client app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(rename = "chatId")]
    pub conversation_ref: String,
    pub click_action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AndroidPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidConfig {
    pub priority: AndroidPriority,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidNotification {
    pub channel_id: String,
    pub notification_priority: String,
    pub default_sound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub headers: ApnsHeaders,
    pub payload: ApnsPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsHeaders {
    #[serde(rename = "apns-priority")]
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aps {
    pub sound: String,
    pub badge: u32,
}

impl PushMessage {
    /// Build a high-priority chat message. Title and body pass through
    /// verbatim; a missing conversation reference becomes an empty string.
    pub fn new(
        token: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        conversation_ref: Option<&str>,
    ) -> Self {
        Self {
            token: token.into(),
            notification: NotificationContent {
                title: title.into(),
                body: body.into(),
            },
            data: MessageData {
                conversation_ref: conversation_ref.unwrap_or_default().to_string(),
                click_action: CLICK_ACTION.to_string(),
            },
            android: AndroidConfig {
                priority: AndroidPriority::High,
                notification: AndroidNotification {
                    channel_id: ANDROID_CHANNEL_ID.to_string(),
                    notification_priority: "PRIORITY_HIGH".to_string(),
                    default_sound: true,
                },
            },
            apns: ApnsConfig {
                headers: ApnsHeaders {
                    priority: APNS_PRIORITY_IMMEDIATE.to_string(),
                },
                payload: ApnsPayload {
                    aps: Aps {
                        sound: DEFAULT_SOUND.to_string(),
                        badge: APNS_BADGE_INCREMENT,
                    },
                },
            },
        }
    }
}
