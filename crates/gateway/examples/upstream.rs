//! A scripted OpenAI-compatible upstream for exercising the gateway locally.
//!
//! Responds to `POST /v1/chat/completions` with a canned completion: a JSON
//! body with a `usage` object for non-streaming requests, an SSE stream with
//! a terminal usage frame otherwise.

use axum::extract::Json;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{routing, Router};
use clap::Parser;
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(name = "upstream", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 11434)]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    println!("{:?}", args);

    let listener = TcpListener::bind(format!("{}:{}", args.ip, args.port))
        .await
        .unwrap();
    let app = Router::new().route("/v1/chat/completions", routing::post(completions));
    axum::serve(listener, app).await.unwrap();
}

async fn completions(Json(request): Json<Value>) -> Response {
    let model = request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let stream = request
        .get("stream")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    println!("request for {model} (stream: {stream})");

    if stream {
        let body = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":"Hello from the scripted upstream."}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "",
            r#"data: {"usage":{"prompt_tokens":12,"completion_tokens":7}}"#,
            "",
            "data: [DONE]",
            "",
            "",
        ]
        .join("\n");
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    } else {
        let body = serde_json::json!({
            "id": "cmpl-upstream-1",
            "object": "chat.completion",
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello from the scripted upstream."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7}
        });
        Json(body).into_response()
    }
}
