//! WhatsApp channel: event stream over WebSocket from the session service,
//! outbound sends via its HTTP API.
//!
//! The session service is the pre-built WhatsApp client: it owns pairing,
//! credential persistence, and the wire protocol. This connector only
//! consumes its events (`connection.update`, `messages.upsert`) and its
//! `/send` endpoint, and renders pairing challenges for the operator.

use crate::channels::inbound::InboundMessage;
use crate::channels::registry::ChannelHandle;
use crate::qr;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Address suffix for an individual contact chat.
pub const CONTACT_SUFFIX: &str = "@c.us";

const RECONNECT_DELAY_SECS: u64 = 5;

/// Append the contact domain suffix unless the target already carries one.
pub fn normalize_contact_jid(target: &str) -> String {
    let t = target.trim();
    if t.contains(CONTACT_SUFFIX) {
        t.to_string()
    } else {
        format!("{}{}", t, CONTACT_SUFFIX)
    }
}

/// One frame from the session service event stream: `{ "type", "payload" }`.
#[derive(Debug, Deserialize)]
struct EventFrame {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Payload of `connection.update`: pairing challenges and connection state.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionUpdate {
    #[serde(default)]
    qr: Option<String>,
    #[serde(default)]
    connection: Option<String>,
}

/// Payload of `messages.upsert`.
#[derive(Debug, Deserialize)]
struct MessagesUpsert {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

/// A message as the session service delivers it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(default)]
    pub id: Option<String>,
    /// Bare number of the sending contact.
    pub number: String,
    /// Display name the contact set, when known.
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl WireMessage {
    /// Sender identity for the backend: display name when set and non-blank,
    /// bare number otherwise.
    pub fn sender(&self) -> String {
        self.push_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.number)
            .to_string()
    }
}

/// Response of the session service send endpoint.
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// WhatsApp channel connector: subscribes to the session service event stream
/// and sends messages through its HTTP API.
pub struct WhatsAppChannel {
    id: String,
    service_url: String,
    events_url: String,
    session_id: String,
    running: AtomicBool,
    ready: AtomicBool,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(
        service_url: impl Into<String>,
        events_url: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: "whatsapp".to_string(),
            service_url: service_url.into().trim_end_matches('/').to_string(),
            events_url: events_url.into(),
            session_id: session_id.into(),
            running: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the event stream loop and forward messages to the gateway.
    /// Returns a handle to await on shutdown.
    pub fn start_inbound(
        self: Arc<Self>,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("whatsapp channel: connecting to session service event stream");
        tokio::spawn(async move {
            run_event_loop(self, inbound_tx).await;
        })
    }

    /// Dispatch one event frame. Err means the gateway side hung up.
    async fn handle_frame(
        &self,
        text: &str,
        inbound_tx: &mpsc::Sender<InboundMessage>,
    ) -> Result<(), mpsc::error::SendError<InboundMessage>> {
        let frame: EventFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("whatsapp: unparseable event frame: {}", e);
                return Ok(());
            }
        };
        match frame.typ.as_str() {
            "connection.update" => {
                self.handle_connection_update(frame.payload);
                Ok(())
            }
            "messages.upsert" => {
                let upsert: MessagesUpsert = match serde_json::from_value(frame.payload) {
                    Ok(u) => u,
                    Err(e) => {
                        log::debug!("whatsapp: bad messages.upsert payload: {}", e);
                        return Ok(());
                    }
                };
                for msg in upsert.messages {
                    if msg.from_me {
                        continue;
                    }
                    let Some(text) = msg.text.clone().filter(|t| !t.is_empty()) else {
                        continue;
                    };
                    let id = msg
                        .id
                        .clone()
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                    log::debug!(
                        "whatsapp message {} from {} ({})",
                        id,
                        msg.number,
                        msg.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default()
                    );
                    let inbound = InboundMessage {
                        channel_id: self.id.clone(),
                        sender: msg.sender(),
                        text,
                    };
                    inbound_tx.send(inbound).await?;
                }
                Ok(())
            }
            other => {
                log::debug!("whatsapp: unhandled event type: {}", other);
                Ok(())
            }
        }
    }

    fn handle_connection_update(&self, payload: serde_json::Value) {
        let update: ConnectionUpdate = match serde_json::from_value(payload) {
            Ok(u) => u,
            Err(e) => {
                log::debug!("whatsapp: bad connection.update payload: {}", e);
                return;
            }
        };
        if let Some(ref code) = update.qr {
            log::info!("pairing required, scan this QR with your phone");
            match qr::render_terminal(code) {
                Ok(block) => println!("{}", block),
                Err(e) => log::warn!("could not render pairing QR: {}", e),
            }
        }
        match update.connection.as_deref() {
            Some("open") => {
                self.ready.store(true, Ordering::SeqCst);
                log::info!("whatsapp session ready, listening for messages");
            }
            Some("close") => {
                self.ready.store(false, Ordering::SeqCst);
                log::warn!("whatsapp session closed, waiting for reconnect");
            }
            _ => {}
        }
    }

    /// Send a text message via the session service send endpoint.
    pub async fn send_message(&self, target: &str, text: &str) -> Result<(), String> {
        let url = format!("{}/send", self.service_url);
        let body = serde_json::json!({ "jid": target, "text": text });
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("send failed: {} {}", status, body));
        }
        let data: SendResponse = res.json().await.map_err(|e| e.to_string())?;
        if !data.ok {
            return Err(data.error.unwrap_or_else(|| "send rejected".to_string()));
        }
        Ok(())
    }
}

async fn run_event_loop(channel: Arc<WhatsAppChannel>, inbound_tx: mpsc::Sender<InboundMessage>) {
    while channel.running() {
        let url = format!("{}?session={}", channel.events_url, channel.session_id);
        match tokio_tungstenite::connect_async(&url).await {
            Ok((mut ws, _)) => {
                log::info!("whatsapp channel: event stream connected");
                while channel.running() {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => {
                            if channel.handle_frame(&text, &inbound_tx).await.is_err() {
                                log::debug!("whatsapp: inbound channel closed, stopping loop");
                                return;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::debug!("whatsapp event stream error: {}", e);
                            break;
                        }
                        None => {
                            log::debug!("whatsapp event stream closed");
                            break;
                        }
                    }
                }
                channel.ready.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                log::debug!("whatsapp session service unreachable: {}", e);
            }
        }
        if channel.running() {
            tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
        }
    }
    log::info!("whatsapp channel: event loop stopped");
}

#[async_trait]
impl ChannelHandle for WhatsAppChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), String> {
        WhatsAppChannel::send_message(self, target, text).await
    }
}
