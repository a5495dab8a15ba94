//! Backend forwarder: delivery of inbound messages to the ingestion API.
//!
//! Delivery is best-effort and fire-and-forget: failures are logged and the
//! message is dropped, never retried and never surfaced back to the channel.
//! The backend owns durability once a POST succeeds.

use serde::Serialize;

const INGEST_PATH: &str = "/api/insertar_whatsapp";

/// Payload for the ingestion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IngestRecord {
    #[serde(rename = "remitente")]
    pub sender: String,
    #[serde(rename = "mensaje")]
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend rejected message: {0}")]
    Api(String),
}

/// Client for the backend ingestion API.
#[derive(Clone)]
pub struct BackendForwarder {
    base_url: String,
    client: reqwest::Client,
}

impl BackendForwarder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// POST the record to the ingestion endpoint and wait for the response.
    /// The response body is ignored; only the status class is checked.
    pub async fn forward(&self, record: &IngestRecord) -> Result<(), ForwardError> {
        let url = format!("{}{}", self.base_url, INGEST_PATH);
        let res = self.client.post(&url).json(record).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ForwardError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }

    /// Launch the forwarding call without awaiting it. The completion handler
    /// only logs; a failed delivery is dropped, not retried.
    pub fn forward_best_effort(&self, record: IngestRecord) {
        let forwarder = self.clone();
        tokio::spawn(async move {
            match forwarder.forward(&record).await {
                Ok(()) => log::info!("stored: {}: {}", record.sender, record.text),
                Err(e) => log::warn!("backend unreachable, message dropped: {}", e),
            }
        });
    }
}
