//! Gateway: HTTP control plane for outbound sends.
//!
//! A single port serves the send endpoint and a health probe, and the
//! inbound processor drains channel messages into the backend forwarder.

mod protocol;
mod server;

pub use protocol::{SendMessageError, SendMessageRequest, SendMessageStatus};
pub use server::{
    router, run_gateway, spawn_inbound_processor, GatewayState, WHATSAPP_CHANNEL_ID,
};
