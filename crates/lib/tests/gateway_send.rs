//! Integration tests: serve the gateway router with a stub channel over real
//! HTTP and exercise the send endpoint and the inbound forwarding pipeline.
//! No WhatsApp session service or backend is required; both are stand-ins.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use lib::backend::BackendForwarder;
use lib::channels::{ChannelHandle, ChannelRegistry, InboundMessage};
use lib::config::Config;
use lib::gateway::{self, GatewayState, WHATSAPP_CHANNEL_ID};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Records send invocations; configurable readiness and failure.
struct StubChannel {
    ready: bool,
    fail: bool,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubChannel {
    fn new(ready: bool, fail: bool) -> (Arc<Self>, Arc<Mutex<Vec<(String, String)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stub = Arc::new(Self {
            ready,
            fail,
            sent: sent.clone(),
        });
        (stub, sent)
    }
}

#[async_trait::async_trait]
impl ChannelHandle for StubChannel {
    fn id(&self) -> &str {
        "whatsapp"
    }

    fn stop(&self) {}

    fn ready(&self) -> bool {
        self.ready
    }

    async fn send_message(&self, target: &str, text: &str) -> Result<(), String> {
        self.sent
            .lock()
            .await
            .push((target.to_string(), text.to_string()));
        if self.fail {
            Err("session error".to_string())
        } else {
            Ok(())
        }
    }
}

fn make_state(backend_url: &str) -> GatewayState {
    GatewayState {
        config: Arc::new(Config::default()),
        channel_registry: Arc::new(ChannelRegistry::new()),
        forwarder: BackendForwarder::new(backend_url),
    }
}

/// Bind a free port, serve the gateway router on it, return the base URL.
async fn spawn_gateway(state: GatewayState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind gateway");
    let addr = listener.local_addr().expect("local_addr");
    let app = gateway::router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://127.0.0.1:{}", addr.port())
}

type Captured = Arc<Mutex<Vec<serde_json::Value>>>;

/// Mock backend capturing ingestion POST bodies.
async fn spawn_ingest_mock() -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock");
    let addr = listener.local_addr().expect("local_addr");
    let sink = captured.clone();
    let app = Router::new().route(
        "/api/insertar_whatsapp",
        post(move |Json(body): Json<serde_json::Value>| {
            let sink = sink.clone();
            async move {
                sink.lock().await.push(body);
                StatusCode::OK
            }
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://127.0.0.1:{}", addr.port()), captured)
}

async fn post_send(base: &str, numero: &str, mensaje: &str) -> (StatusCode, serde_json::Value) {
    let res = reqwest::Client::new()
        .post(format!("{}/enviar_mensaje", base))
        .json(&serde_json::json!({ "numero": numero, "mensaje": mensaje }))
        .send()
        .await
        .expect("request");
    let status = StatusCode::from_u16(res.status().as_u16()).expect("status");
    let body: serde_json::Value = res.json().await.expect("json body");
    (status, body)
}

#[tokio::test]
async fn health_reports_running() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, _sent) = StubChannel::new(true, false);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let res = reqwest::get(&base).await.expect("request");
    assert!(res.status().is_success());
    let json: serde_json::Value = res.json().await.expect("json");
    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(
        json.get("channels").and_then(|v| v.as_array()).map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn send_normalizes_target_and_reports_sent() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, sent) = StubChannel::new(true, false);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let (status, body) = post_send(&base, "5551234", "Hi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "estado": "enviado" }));

    assert_eq!(
        *sent.lock().await,
        vec![("5551234@c.us".to_string(), "Hi".to_string())]
    );
}

#[tokio::test]
async fn send_does_not_duplicate_suffix() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, sent) = StubChannel::new(true, false);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let (status, _body) = post_send(&base, "5551234@c.us", "Hi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        *sent.lock().await,
        vec![("5551234@c.us".to_string(), "Hi".to_string())]
    );
}

#[tokio::test]
async fn send_failure_maps_to_500() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, _sent) = StubChannel::new(true, true);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let (status, body) = post_send(&base, "5551234", "Hi").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({ "error": "Fallo en el envío" }));
}

#[tokio::test]
async fn send_without_channel_is_503() {
    let state = make_state("http://127.0.0.1:1");
    let base = spawn_gateway(state).await;

    let (status, body) = post_send(&base, "5551234", "Hi").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, serde_json::json!({ "error": "sesión no iniciada" }));
}

#[tokio::test]
async fn send_with_not_ready_channel_is_503() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, sent) = StubChannel::new(false, false);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let (status, body) = post_send(&base, "5551234", "Hi").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, serde_json::json!({ "error": "sesión no iniciada" }));
    assert!(sent.lock().await.is_empty());
}

#[tokio::test]
async fn send_empty_target_is_400() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, sent) = StubChannel::new(true, false);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let (status, body) = post_send(&base, "  ", "Hi").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({ "error": "numero vacío" }));
    assert!(sent.lock().await.is_empty());
}

#[tokio::test]
async fn repeated_sends_are_independent() {
    let state = make_state("http://127.0.0.1:1");
    let (stub, sent) = StubChannel::new(true, false);
    state
        .channel_registry
        .register(WHATSAPP_CHANNEL_ID.to_string(), stub)
        .await;
    let base = spawn_gateway(state).await;

    let (first, _) = post_send(&base, "5551234", "Hi").await;
    let (second, _) = post_send(&base, "5551234", "Hi").await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(sent.lock().await.len(), 2);
}

#[tokio::test]
async fn inbound_message_is_forwarded_once() {
    let (backend_url, captured) = spawn_ingest_mock().await;
    let state = make_state(&backend_url);
    let (tx, rx) = mpsc::channel::<InboundMessage>(8);
    gateway::spawn_inbound_processor(state, rx);

    tx.send(InboundMessage {
        channel_id: "whatsapp".to_string(),
        sender: "Ana".to_string(),
        text: "Hola".to_string(),
    })
    .await
    .expect("queue inbound");

    for _ in 0..100 {
        let bodies = captured.lock().await;
        if bodies.len() == 1 {
            assert_eq!(
                bodies[0],
                serde_json::json!({ "remitente": "Ana", "mensaje": "Hola" })
            );
            return;
        }
        drop(bodies);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("inbound message was not forwarded within 5s");
}

#[tokio::test]
async fn inbound_empty_text_is_not_forwarded() {
    let (backend_url, captured) = spawn_ingest_mock().await;
    let state = make_state(&backend_url);
    let (tx, rx) = mpsc::channel::<InboundMessage>(8);
    gateway::spawn_inbound_processor(state, rx);

    // The empty message is processed first; only the sentinel may arrive.
    tx.send(InboundMessage {
        channel_id: "whatsapp".to_string(),
        sender: "5551234".to_string(),
        text: String::new(),
    })
    .await
    .expect("queue empty");
    tx.send(InboundMessage {
        channel_id: "whatsapp".to_string(),
        sender: "5551234".to_string(),
        text: "ping".to_string(),
    })
    .await
    .expect("queue sentinel");

    for _ in 0..100 {
        let bodies = captured.lock().await;
        if !bodies.is_empty() {
            assert_eq!(bodies.len(), 1);
            assert_eq!(
                bodies[0],
                serde_json::json!({ "remitente": "5551234", "mensaje": "ping" })
            );
            return;
        }
        drop(bodies);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("sentinel message was not forwarded within 5s");
}
