//! Inbound message from a channel: delivered to the gateway for backend forwarding.

/// A message received on a channel, reduced to what the backend ingests.
/// Lives only for the handling of one event; never persisted here.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    /// Sender identity after fallback resolution (display name, else number).
    pub sender: String,
    pub text: String,
}
