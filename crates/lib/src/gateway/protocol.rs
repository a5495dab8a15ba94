//! Gateway wire types for the send endpoint.
//!
//! Field and body names are the backend's contract (Spanish), kept through
//! serde renames.

use serde::{Deserialize, Serialize};

/// Request body for POST /enviar_mensaje: `{ "numero", "mensaje" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(rename = "numero")]
    pub target: String,
    #[serde(rename = "mensaje")]
    pub text: String,
}

/// Success body: `{ "estado": "enviado" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageStatus {
    #[serde(rename = "estado")]
    pub status: String,
}

impl SendMessageStatus {
    pub fn sent() -> Self {
        Self {
            status: "enviado".to_string(),
        }
    }
}

/// Error body: `{ "error": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageError {
    pub error: String,
}

impl SendMessageError {
    /// The send was attempted and the channel reported failure.
    pub fn send_failed() -> Self {
        Self {
            error: "Fallo en el envío".to_string(),
        }
    }

    /// No session is available to attempt the send.
    pub fn not_ready() -> Self {
        Self {
            error: "sesión no iniciada".to_string(),
        }
    }

    /// The request carried an empty target.
    pub fn empty_target() -> Self {
        Self {
            error: "numero vacío".to_string(),
        }
    }
}
