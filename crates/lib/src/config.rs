//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.wabridge/config.json`) and environment.
//! Defaults: gateway on 3001, backend on localhost:8000, session service on 8055.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Backend ingestion API settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Channel settings (WhatsApp session service).
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the send endpoint and health probe (default 3001).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"). The gateway has no auth and
    /// refuses to start on a non-loopback bind.
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3001
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Backend ingestion API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend. Overridden by WABRIDGE_BACKEND_URL env when set.
    pub base_url: Option<String>,
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub whatsapp: WhatsAppChannelConfig,
}

/// WhatsApp session service config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppChannelConfig {
    /// HTTP base URL of the session service (send endpoint). Overridden by
    /// WABRIDGE_WA_SERVICE_URL env when set.
    pub service_url: Option<String>,
    /// WebSocket URL of the session service event stream. Overridden by
    /// WABRIDGE_WA_EVENTS_URL env; when unset, derived from the service URL.
    pub events_url: Option<String>,
    /// Session identifier under which the service persists credentials.
    pub session_id: Option<String>,
}

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_WA_SERVICE_URL: &str = "http://127.0.0.1:8055";
const DEFAULT_SESSION_ID: &str = "wabridge-session";

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_nonempty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the backend base URL: env WABRIDGE_BACKEND_URL overrides config.
pub fn resolve_backend_url(config: &Config) -> String {
    env_nonempty("WABRIDGE_BACKEND_URL")
        .or_else(|| config_nonempty(config.backend.base_url.as_ref()))
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

/// Resolve the session service HTTP base URL: env WABRIDGE_WA_SERVICE_URL overrides config.
pub fn resolve_wa_service_url(config: &Config) -> String {
    env_nonempty("WABRIDGE_WA_SERVICE_URL")
        .or_else(|| config_nonempty(config.channels.whatsapp.service_url.as_ref()))
        .unwrap_or_else(|| DEFAULT_WA_SERVICE_URL.to_string())
}

/// Resolve the session service event stream URL: env WABRIDGE_WA_EVENTS_URL,
/// then config, then derived from the service URL (http -> ws, `/ws` path).
pub fn resolve_wa_events_url(config: &Config) -> String {
    env_nonempty("WABRIDGE_WA_EVENTS_URL")
        .or_else(|| config_nonempty(config.channels.whatsapp.events_url.as_ref()))
        .unwrap_or_else(|| derive_events_url(&resolve_wa_service_url(config)))
}

/// Resolve the session identifier the service persists credentials under.
pub fn resolve_session_id(config: &Config) -> String {
    config_nonempty(config.channels.whatsapp.session_id.as_ref())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
}

/// Derive the event stream URL from an HTTP service URL.
pub fn derive_events_url(service_url: &str) -> String {
    let base = service_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws", ws)
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("WABRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".wabridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or WABRIDGE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
