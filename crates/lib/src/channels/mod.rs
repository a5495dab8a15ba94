//! Communication channels (WhatsApp).
//!
//! Channel trait and registry so the gateway can start/stop the connector
//! and route sends. Inbound messages are handed to the gateway for backend
//! forwarding.

mod inbound;
mod registry;
mod whatsapp;

pub use inbound::InboundMessage;
pub use registry::{ChannelHandle, ChannelRegistry};
pub use whatsapp::{normalize_contact_jid, WhatsAppChannel, WireMessage, CONTACT_SUFFIX};
