//! Gateway HTTP server and inbound processor.
//!
//! The server exposes the outbound send endpoint for the backend; the
//! processor forwards inbound channel messages to the backend ingestion API.

use crate::backend::{BackendForwarder, IngestRecord};
use crate::channels::{
    normalize_contact_jid, ChannelHandle, ChannelRegistry, InboundMessage, WhatsAppChannel,
};
use crate::config::{self, Config};
use crate::gateway::protocol::{SendMessageError, SendMessageRequest, SendMessageStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Registry id of the WhatsApp channel.
pub const WHATSAPP_CHANNEL_ID: &str = "whatsapp";

const INBOUND_QUEUE_CAPACITY: usize = 64;

/// Shared state for the gateway (config, channel registry, backend forwarder).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub channel_registry: Arc<ChannelRegistry>,
    pub forwarder: BackendForwarder,
}

/// Forward one inbound channel message to the backend ingestion endpoint.
/// Messages with no text content are dropped; delivery is best-effort.
pub async fn process_inbound_message(state: &GatewayState, msg: InboundMessage) {
    if msg.text.is_empty() {
        log::debug!(
            "{}: inbound message from {} has no text, skipping",
            msg.channel_id,
            msg.sender
        );
        return;
    }
    state.forwarder.forward_best_effort(IngestRecord {
        sender: msg.sender,
        text: msg.text,
    });
}

/// Spawn the task that drains inbound channel messages into the forwarder.
pub fn spawn_inbound_processor(
    state: GatewayState,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = inbound_rx.recv().await {
            process_inbound_message(&state, msg).await;
        }
    })
}

/// Build the gateway router (send endpoint + health probe).
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/enviar_mensaje", post(send_message))
        .with_state(state)
}

/// Run the gateway: start the WhatsApp connector, the inbound processor, and
/// the HTTP server. Blocks until shutdown (Ctrl+C or SIGTERM).
pub async fn run_gateway(config: Config) -> Result<()> {
    let bind = config.gateway.bind.trim().to_string();
    if !config::is_loopback_bind(&bind) {
        anyhow::bail!(
            "refusing to bind the unauthenticated gateway to {}; use a loopback address",
            bind
        );
    }

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(INBOUND_QUEUE_CAPACITY);
    let channel_tasks: Arc<tokio::sync::RwLock<Vec<JoinHandle<()>>>> =
        Arc::new(tokio::sync::RwLock::new(Vec::new()));

    let state = GatewayState {
        config: Arc::new(config.clone()),
        channel_registry: Arc::new(ChannelRegistry::new()),
        forwarder: BackendForwarder::new(config::resolve_backend_url(&config)),
    };

    let whatsapp = Arc::new(WhatsAppChannel::new(
        config::resolve_wa_service_url(&config),
        config::resolve_wa_events_url(&config),
        config::resolve_session_id(&config),
    ));
    let handle = whatsapp.clone().start_inbound(inbound_tx);
    channel_tasks.write().await.push(handle);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), whatsapp)
        .await;
    log::info!("whatsapp channel registered and event loop started");

    spawn_inbound_processor(state.clone(), inbound_rx);

    let channel_registry = state.channel_registry.clone();
    let app = router(state);

    let bind_addr = format!("{}:{}", bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(channel_registry, channel_tasks))
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Stops channel connectors, then awaits their tasks.
async fn shutdown_signal(
    channel_registry: Arc<ChannelRegistry>,
    channel_tasks: Arc<tokio::sync::RwLock<Vec<JoinHandle<()>>>>,
) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, stopping channels");

    for id in channel_registry.ids().await {
        if let Some(handle) = channel_registry.get(&id).await {
            handle.stop();
        }
    }

    let handles = {
        let mut g = channel_tasks.write().await;
        std::mem::take(&mut *g)
    };
    for h in handles {
        let _ = h.await;
    }
    log::info!("channel tasks finished");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let channels = state.channel_registry.ids().await;
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "channels": channels,
    }))
}

/// POST /enviar_mensaje: validate, normalize the target, send via the
/// WhatsApp channel. 200 on success, 500 on a send failure, 503 when no
/// session is available, 400 on an empty target.
async fn send_message(
    State(state): State<GatewayState>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let target = req.target.trim();
    if target.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SendMessageError::empty_target()),
        )
            .into_response();
    }

    let Some(handle) = state.channel_registry.get(WHATSAPP_CHANNEL_ID).await else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SendMessageError::not_ready()),
        )
            .into_response();
    };
    if !handle.ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SendMessageError::not_ready()),
        )
            .into_response();
    }

    let jid = normalize_contact_jid(target);
    match handle.send_message(&jid, &req.text).await {
        Ok(()) => {
            log::info!("message sent to {}", jid);
            (StatusCode::OK, Json(SendMessageStatus::sent())).into_response()
        }
        Err(e) => {
            log::error!("send to {} failed: {}", jid, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SendMessageError::send_failed()),
            )
                .into_response()
        }
    }
}
