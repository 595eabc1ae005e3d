//! Push Gateway seam and the FCM HTTP v1 adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_common::config::AppConfig;
use relay_common::error::DeliveryError;

use crate::message::PushMessage;

/// Backend-assigned identifier of an accepted message.
pub type MessageId = String;

/// Reported for an accepted message whose response carried no readable name.
pub const UNKNOWN_MESSAGE_ID: &str = "unknown";

/// External delivery backend.
#[async_trait]
pub trait PushGateway: Send + Sync + 'static {
    /// Hand one message to the backend. Any rejection or transport failure is
    /// a `DeliveryError`; the caller never retries.
    async fn send(&self, message: &PushMessage) -> Result<MessageId, DeliveryError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a PushMessage,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    status: Option<String>,
}

/// Firebase Cloud Messaging client (`projects.messages.send`).
pub struct FcmGateway {
    client: reqwest::Client,
    send_url: String,
    access_token: String,
}

impl FcmGateway {
    pub fn new(
        endpoint: &str,
        project_id: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            endpoint.trim_end_matches('/'),
            project_id
        );

        Ok(Self {
            client,
            send_url,
            access_token: access_token.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.fcm_endpoint,
            &config.fcm_project_id,
            config.fcm_access_token.clone(),
            Duration::from_secs(config.fcm_timeout_secs),
        )
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, message: &PushMessage) -> Result<MessageId, DeliveryError> {
        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&SendRequest { message })
            .send()
            .await
            .map_err(|e| DeliveryError::new(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            // FCM accepted the message; an unreadable body does not undo that.
            let text = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<SendResponse>(&text) {
                Ok(body) => Ok(body.name),
                Err(e) => {
                    tracing::warn!(
                        status = %status,
                        error = %e,
                        "FCM accepted message but response had no name"
                    );
                    Ok(UNKNOWN_MESSAGE_ID.to_string())
                }
            };
        }

        let text = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, body = %text, "FCM rejected message");

        Err(match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => {
                let err = DeliveryError::new(envelope.error.message);
                match envelope.error.status {
                    Some(code) => err.with_code(code),
                    None => err,
                }
            }
            Err(_) => DeliveryError::new(format!("FCM returned HTTP {}", status)),
        })
    }
}
