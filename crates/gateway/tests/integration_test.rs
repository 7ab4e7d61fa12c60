#![cfg(unix)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{routing, Router};
use gateway::configuration::GatewayConfig;
use gateway::limiter::Limiter;
use gateway::server::Server;
use gateway::usage::UsageStore;
use pingora::server::{RunArgs, ShutdownSignal, ShutdownSignalWatch};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;

const ALICE_KEY: &str = "sk-alice-001";
const BOB_KEY: &str = "sk-bob-001";
const CHARLIE_KEY: &str = "sk-charlie-001";
const ADMIN_KEY: &str = "sk-admin-001";

/// Exact bytes the scripted upstream returns for non-streaming requests.
const NON_STREAM_BODY: &str = r#"{"id":"cmpl-1","object":"chat.completion","choices":[{"index":0,"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}],"usage":{"prompt_tokens":12,"completion_tokens":34}}"#;

/// Exact bytes the scripted upstream returns for streaming requests:
/// five content frames, the terminal usage frame, then [DONE].
const SSE_BODY: &str = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"ll\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"o\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
data: {\"usage\":{\"prompt_tokens\":7,\"completion_tokens\":9}}\n\n\
data: [DONE]\n\n";

#[derive(Default)]
struct UpstreamState {
    requests: StdMutex<Vec<Value>>,
    hits: AtomicUsize,
}

impl UpstreamState {
    fn recorded(&self, index: usize) -> Value {
        self.requests.lock().unwrap()[index].clone()
    }
}

async fn completions_handler(State(state): State<Arc<UpstreamState>>, body: String) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.requests.lock().unwrap().push(request.clone());

    let stream = request
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if stream {
        ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response()
    } else {
        ([(header::CONTENT_TYPE, "application/json")], NON_STREAM_BODY).into_response()
    }
}

async fn spawn_upstream_server() -> (
    SocketAddr,
    Arc<UpstreamState>,
    oneshot::Sender<()>,
    tokio::task::JoinHandle<()>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(UpstreamState::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let app = Router::new()
        .route("/v1/chat/completions", routing::post(completions_handler))
        .with_state(Arc::clone(&state));
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });
    let handle = tokio::spawn(async move {
        server.await.expect("upstream server failed");
    });
    (addr, state, shutdown_tx, handle)
}

fn reserve_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind to pick free port")
        .local_addr()
        .unwrap()
        .port()
}

struct ChannelShutdown {
    rx: Mutex<Option<oneshot::Receiver<()>>>,
}

#[async_trait]
impl ShutdownSignalWatch for ChannelShutdown {
    async fn recv(&self) -> ShutdownSignal {
        if let Some(rx) = self.rx.lock().await.take() {
            let _ = rx.await;
        }
        ShutdownSignal::FastShutdown
    }
}

fn spawn_gateway(
    listen_port: u16,
    upstream_addr: SocketAddr,
) -> (oneshot::Sender<()>, thread::JoinHandle<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = thread::spawn(move || {
        let config = GatewayConfig {
            listen: format!("127.0.0.1:{listen_port}"),
            upstream: upstream_addr.to_string(),
            upstream_host: upstream_addr.to_string(),
            users: Vec::new(), // built-in simulation users
        };
        let registry = Arc::new(config.registry());
        let store = Arc::new(UsageStore::new());
        let limiter = Arc::new(Limiter::new());

        let mut server = Server::new(None).expect("create server");
        server
            .bootstrap(config, registry, store, limiter)
            .expect("bootstrap server");

        let run_args = RunArgs {
            shutdown_signal: Box::new(ChannelShutdown {
                rx: Mutex::new(Some(shutdown_rx)),
            }),
        };
        server.run(run_args);
    });

    (shutdown_tx, handle)
}

async fn wait_for_port(port: u16) {
    let addr = format!("127.0.0.1:{port}");
    for _ in 0..50 {
        if TcpStream::connect(&addr).await.is_ok() {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("port {addr} did not open in time");
}

struct TestGateway {
    base: String,
    upstream: Arc<UpstreamState>,
    gateway_shutdown: oneshot::Sender<()>,
    gateway_handle: thread::JoinHandle<()>,
    upstream_shutdown: oneshot::Sender<()>,
    upstream_handle: tokio::task::JoinHandle<()>,
}

impl TestGateway {
    async fn start() -> Self {
        let (upstream_addr, upstream, upstream_shutdown, upstream_handle) =
            spawn_upstream_server().await;
        let port = reserve_port();
        let (gateway_shutdown, gateway_handle) = spawn_gateway(port, upstream_addr);
        wait_for_port(port).await;
        Self {
            base: format!("http://127.0.0.1:{port}"),
            upstream,
            gateway_shutdown,
            gateway_handle,
            upstream_shutdown,
            upstream_handle,
        }
    }

    async fn stop(self) {
        let _ = self.gateway_shutdown.send(());
        let _ = self.gateway_handle.join();
        let _ = self.upstream_shutdown.send(());
        self.upstream_handle.await.unwrap();
    }
}

async fn set_limits(
    client: &Client,
    base: &str,
    user: &str,
    rps: i64,
    max_tokens: i64,
    max_tokens_per_request: i64,
) {
    let resp = client
        .post(format!("{base}/admin/limits"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({
            "user_id": user,
            "rps": rps,
            "max_tokens": max_tokens,
            "max_tokens_per_request": max_tokens_per_request,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200, "set_limits for {user} failed");
}

async fn suspend(client: &Client, base: &str, user: &str) {
    let resp = client
        .post(format!("{base}/admin/suspend"))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({ "user_id": user }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["status"],
        Value::from("suspended")
    );
}

/// Accounting is asynchronous; poll the admin snapshot until the debit lands.
async fn wait_for_used_tokens(client: &Client, base: &str, user: &str, expected: i64) {
    for _ in 0..50 {
        let limits: Value = client
            .get(format!("{base}/admin/limits"))
            .bearer_auth(ADMIN_KEY)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if limits["limits"][user]["used_tokens"].as_i64() == Some(expected) {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("user {user} never reached {expected} used tokens");
}

#[tokio::test(flavor = "multi_thread")]
async fn auth_errors_and_admin_guard() {
    let gw = TestGateway::start().await;
    let client = Client::new();
    let completions = format!("{}/v1/chat/completions", gw.base);

    // No credential at all.
    let resp = client
        .post(&completions)
        .json(&json!({"model": "m1", "stream": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["error"],
        Value::from("missing API key")
    );

    // A credential nobody registered.
    let resp = client
        .post(&completions)
        .bearer_auth("sk-nobody-999")
        .json(&json!({"model": "m1", "stream": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["error"],
        Value::from("unknown API key")
    );

    // Unknown routes 404 without touching the upstream.
    let resp = client
        .get(format!("{}/v2/other", gw.base))
        .bearer_auth(ALICE_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // The usage endpoint needs a valid key.
    let resp = client
        .get(format!("{}/v1/usage", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    // Admin endpoints reject non-admin users.
    let resp = client
        .post(format!("{}/admin/limits", gw.base))
        .bearer_auth(ALICE_KEY)
        .json(&json!({"user_id": "bob", "rps": 1, "max_tokens": 1, "max_tokens_per_request": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["error"],
        Value::from("admin access required")
    );

    // Zero is not a configurable limit value.
    let resp = client
        .post(format!("{}/admin/limits", gw.base))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({"user_id": "bob", "rps": 0, "max_tokens": 100, "max_tokens_per_request": 50}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    assert_eq!(gw.upstream.hits.load(Ordering::SeqCst), 0);
    gw.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn non_stream_request_is_proxied_and_accounted() {
    let gw = TestGateway::start().await;
    let client = Client::new();

    let resp = client
        .post(format!("{}/v1/chat/completions", gw.base))
        .bearer_auth(ALICE_KEY)
        .json(&json!({
            "model": "m1",
            "stream": false,
            "max_tokens": 100,
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    // The upstream body reaches the client unchanged.
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await.unwrap(), NON_STREAM_BODY);

    // The debit lands off the request path.
    wait_for_used_tokens(&client, &gw.base, "alice", 46).await;

    let usage: Value = client
        .get(format!("{}/v1/usage", gw.base))
        .bearer_auth(ALICE_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(usage["usage_by_model"]["m1"]["prompt_tokens"], 12);
    assert_eq!(usage["usage_by_model"]["m1"]["completion_tokens"], 34);

    // max_tokens was under the free-tier cap, so the body went through
    // unrewritten (stream:false means no stream_options either).
    let forwarded = gw.upstream.recorded(0);
    assert_eq!(forwarded["max_tokens"], 100);
    assert_eq!(forwarded["messages"][0]["content"], "hi");
    assert!(forwarded.get("stream_options").is_none());

    gw.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stream_request_passes_through_and_accounts_usage() {
    let gw = TestGateway::start().await;
    let client = Client::new();
    let completions = format!("{}/v1/chat/completions", gw.base);

    // `stream` omitted: defaults to true.
    let resp = client
        .post(&completions)
        .bearer_auth(BOB_KEY)
        .json(&json!({
            "model": "m2",
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    // Every SSE frame reaches the client byte-identically.
    assert_eq!(resp.text().await.unwrap(), SSE_BODY);

    // The terminal usage frame is accounted once the stream closes.
    wait_for_used_tokens(&client, &gw.base, "bob", 16).await;

    // The forwarded body gained the accounting hook and the free-tier
    // per-request cap; the client's own fields are intact.
    let forwarded = gw.upstream.recorded(0);
    assert_eq!(forwarded["stream_options"]["include_usage"], true);
    assert_eq!(forwarded["max_tokens"], 4000);
    assert_eq!(forwarded["model"], "m2");
    assert_eq!(forwarded["messages"][0]["content"], "hi");

    // Tighten bob's per-request cap and verify the clamp.
    set_limits(&client, &gw.base, "bob", -1, -1, 50).await;
    let resp = client
        .post(&completions)
        .bearer_auth(BOB_KEY)
        .json(&json!({
            "model": "m2",
            "stream": false,
            "max_tokens": 9999,
            "temperature": 0.7,
            "messages": [{"role": "user", "content": "clamp me"}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let forwarded = gw.upstream.recorded(1);
    assert_eq!(forwarded["max_tokens"], 50);
    assert_eq!(forwarded["temperature"], 0.7);
    assert_eq!(forwarded["messages"][0]["content"], "clamp me");

    gw.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rate_quota_and_suspension_rejections() {
    let gw = TestGateway::start().await;
    let client = Client::new();
    let completions = format!("{}/v1/chat/completions", gw.base);
    let body = json!({"model": "m3", "stream": false, "messages": []});

    // 1 RPS: the first request forwards, the second is rejected without
    // contacting the upstream.
    set_limits(&client, &gw.base, "charlie", 1, -1, -1).await;
    let first = client
        .post(&completions)
        .bearer_auth(CHARLIE_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 200);
    let second = client
        .post(&completions)
        .bearer_auth(CHARLIE_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 429);
    assert_eq!(
        second.json::<Value>().await.unwrap()["error"],
        Value::from("rate limit exceeded")
    );
    assert_eq!(gw.upstream.hits.load(Ordering::SeqCst), 1);

    // Let the first request's debit settle before reconfiguring, so the
    // reset below starts the quota phase from zero.
    wait_for_used_tokens(&client, &gw.base, "charlie", 46).await;

    // Tiny token quota: one accounted response (46 tokens) pushes charlie
    // past quota + grace, and the next request is rejected up front.
    set_limits(&client, &gw.base, "charlie", -1, 10, -1).await;
    let resp = client
        .post(&completions)
        .bearer_auth(CHARLIE_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    wait_for_used_tokens(&client, &gw.base, "charlie", 46).await;

    let resp = client
        .post(&completions)
        .bearer_auth(CHARLIE_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["error"],
        Value::from("token quota exceeded")
    );
    assert_eq!(gw.upstream.hits.load(Ordering::SeqCst), 2);

    // Suspension hard-blocks regardless of quota state.
    suspend(&client, &gw.base, "charlie").await;
    let resp = client
        .post(&completions)
        .bearer_auth(CHARLIE_KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 429);
    assert_eq!(gw.upstream.hits.load(Ordering::SeqCst), 2);

    gw.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_bypasses_admission_but_is_accounted() {
    let gw = TestGateway::start().await;
    let client = Client::new();

    // Even a suspended admin is admitted.
    suspend(&client, &gw.base, "admin").await;

    let resp = client
        .post(format!("{}/v1/chat/completions", gw.base))
        .bearer_auth(ADMIN_KEY)
        .json(&json!({"model": "m9", "stream": false, "messages": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    wait_for_used_tokens(&client, &gw.base, "admin", 46).await;

    let usage: Value = client
        .get(format!("{}/v1/usage", gw.base))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(usage["usage_by_model"]["m9"]["prompt_tokens"], 12);

    gw.stop().await;
}
