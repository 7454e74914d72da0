//! # WhatsApp Gateway Module
//!
//! Thin client for the WhatsApp Cloud API: sending text notifications and
//! fetching inbound media by id. Text sends are best-effort (failures are
//! logged and swallowed, the conversation is never aborted by a lost
//! notification); media fetches must succeed and propagate errors.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v17.0";

/// Outbound messaging seam, mocked in tests.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Send a text message. Best-effort: never fails from the caller's
    /// point of view.
    async fn send_text(&self, to: &str, body: &str);
    /// Resolve a media id and download its content.
    async fn fetch_media(&self, media_id: &str) -> Result<Vec<u8>>;
}

/// WhatsApp Cloud API client (bearer-token authenticated)
pub struct WhatsAppClient {
    client: reqwest::Client,
    token: String,
    phone_number_id: String,
    api_base: String,
}

#[derive(Deserialize)]
struct MediaDescriptor {
    url: String,
}

impl WhatsAppClient {
    pub fn new(token: String, phone_number_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            phone_number_id,
            api_base: GRAPH_API_BASE.to_string(),
        }
    }

    async fn try_send_text(&self, to: &str, body: &str) -> Result<()> {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("WhatsApp API error: {status} - {detail}"));
        }

        debug!(to = %to, "sent WhatsApp message");
        Ok(())
    }
}

#[async_trait]
impl MessageGateway for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) {
        if let Err(e) = self.try_send_text(to, body).await {
            error!(to = %to, error = %e, "failed to send WhatsApp message");
        }
    }

    async fn fetch_media(&self, media_id: &str) -> Result<Vec<u8>> {
        // First request resolves the media id to a short-lived download URL.
        let descriptor: MediaDescriptor = self
            .client
            .get(format!("{}/{}", self.api_base, media_id))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()
            .context("failed to resolve media URL")?
            .json()
            .await?;

        let bytes = self
            .client
            .get(&descriptor.url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()
            .context("failed to download media")?
            .bytes()
            .await?;

        debug!(media_id = %media_id, size = bytes.len(), "downloaded media");
        Ok(bytes.to_vec())
    }
}
