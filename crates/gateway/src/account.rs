//! Out-of-band token accounting for proxied completion responses.
//!
//! Two strategies, selected by the `stream` flag captured at request time:
//!
//! - Buffered: the whole (non-streaming) response body is handed to a
//!   background task that parses the top-level `usage` object.
//! - Streaming: every chunk flushed to the client is also sent into an
//!   unbounded side channel; a background task scans the copy line by line
//!   and retains the last `data: ` frame that carries a `usage` field. The
//!   channel being unbounded means the scanner can never back-pressure the
//!   client stream, and dropping the sender is the sole end-of-stream signal
//!   — the same teardown covers normal completion, client disconnect, and
//!   error paths.
//!
//! Accounting is best-effort: parse failures and missing usage frames are
//! dropped without any client-visible effect.

use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::limiter::Limiter;
use crate::usage::UsageStore;

/// Longest SSE line the scanner will parse. Dense frames stay well under
/// this; anything longer is discarded without losing stream position.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Shape of the `usage` field in OpenAI-compatible responses.
#[derive(Debug, Default, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    usage: UsageCounts,
}

#[derive(Debug, Default, Deserialize)]
struct UsageCounts {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn publish(store: &UsageStore, limiter: &Limiter, user: &str, model: &str, counts: &UsageCounts) {
    store.add(user, model, counts.prompt_tokens, counts.completion_tokens);
    limiter.consume_tokens(user, (counts.prompt_tokens + counts.completion_tokens) as i64);
}

/// Account a fully buffered (non-streaming) response body in the background.
///
/// The caller keeps streaming the original bytes to the client; this task
/// only ever reads the copy. Returns the task handle so tests can await
/// completion; the proxy drops it (fire-and-forget).
pub fn spawn_buffered(
    store: Arc<UsageStore>,
    limiter: Arc<Limiter>,
    user: String,
    model: String,
    body: Bytes,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Ok(payload) = serde_json::from_slice::<UsagePayload>(&body) else {
            return; // best-effort: unparsable bodies are not accounted
        };
        publish(&store, &limiter, &user, &model, &payload.usage);
    })
}

/// Streaming-response accountant: a side channel fed by the proxy's response
/// body filter, scanned by a background task.
pub struct StreamAccountant {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    handle: JoinHandle<()>,
}

impl StreamAccountant {
    /// Spawn the scanner task for one streaming response.
    pub fn spawn(
        store: Arc<UsageStore>,
        limiter: Arc<Limiter>,
        user: String,
        model: String,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(scan_stream(rx, store, limiter, user, model));
        Self {
            tx: Some(tx),
            handle,
        }
    }

    /// Feed a copy of a response chunk into the scanner.
    pub fn observe(&self, chunk: &Bytes) {
        if let Some(tx) = &self.tx {
            // A closed receiver just means the scanner is done; the copy is
            // dropped and the client stream is unaffected.
            let _ = tx.send(chunk.clone());
        }
    }

    /// Close the side channel and hand back the scanner handle. The proxy
    /// drops the handle (the task finishes on its own); tests await it.
    pub fn finish(mut self) -> JoinHandle<()> {
        self.tx.take();
        self.handle
    }
}

/// Scan the duplicated byte stream for the terminal usage frame.
///
/// OpenAI-compatible streams emit a frame with a `usage` object shortly
/// before `data: [DONE]`. Intermediate frames may contain the literal
/// `"usage"` inside content text, so only the *last* matching frame is
/// retained — the true terminal frame arrives last among them.
async fn scan_stream(
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    store: Arc<UsageStore>,
    limiter: Arc<Limiter>,
    user: String,
    model: String,
) {
    let mut buf: Vec<u8> = Vec::new();
    let mut discarding = false;
    let mut retained: Option<String> = None;

    while let Some(chunk) = rx.recv().await {
        buf.extend_from_slice(&chunk);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let rest = buf.split_off(pos + 1);
            let line = std::mem::replace(&mut buf, rest);
            if discarding {
                // Tail of an oversized line; skip it and resume scanning.
                discarding = false;
                continue;
            }
            scan_line(&line, &mut retained);
        }

        if buf.len() > MAX_LINE_BYTES {
            buf.clear();
            discarding = true;
        }
    }

    // Channel closed: the stream may end without a trailing newline.
    if !buf.is_empty() && !discarding {
        scan_line(&buf, &mut retained);
    }

    let Some(data) = retained else {
        return; // stream ended without a usage frame (e.g. client disconnect)
    };
    let Ok(payload) = serde_json::from_str::<UsagePayload>(&data) else {
        return;
    };
    publish(&store, &limiter, &user, &model, &payload.usage);
}

/// Examine one SSE line; retain the payload of `data: ` frames that mention
/// a usage field, overwriting any previously retained frame.
fn scan_line(line: &[u8], retained: &mut Option<String>) {
    let Ok(line) = std::str::from_utf8(line) else {
        return;
    };
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data: ") else {
        return;
    };
    if data.contains("\"usage\"") {
        *retained = Some(data.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (Arc<UsageStore>, Arc<Limiter>) {
        (Arc::new(UsageStore::new()), Arc::new(Limiter::new()))
    }

    fn used(limiter: &Limiter, user: &str) -> i64 {
        let registry = registry::Registry::new([registry::User::new(user, "sk-test", false)]);
        limiter.get_all_limits(&registry)[user].used_tokens
    }

    #[tokio::test]
    async fn buffered_response_is_accounted() {
        let (store, limiter) = fixtures();
        let body = Bytes::from_static(
            br#"{"id":"x","choices":[],"usage":{"prompt_tokens":12,"completion_tokens":34}}"#,
        );

        spawn_buffered(
            Arc::clone(&store),
            Arc::clone(&limiter),
            "alice".into(),
            "m1".into(),
            body,
        )
        .await
        .unwrap();

        let usage = store.get("alice");
        assert_eq!(usage["m1"].prompt_tokens, 12);
        assert_eq!(usage["m1"].completion_tokens, 34);
        assert_eq!(used(&limiter, "alice"), 46);
    }

    #[tokio::test]
    async fn buffered_parse_failure_is_dropped() {
        let (store, limiter) = fixtures();

        spawn_buffered(
            Arc::clone(&store),
            Arc::clone(&limiter),
            "alice".into(),
            "m1".into(),
            Bytes::from_static(b"not json at all"),
        )
        .await
        .unwrap();

        assert!(store.get("alice").is_empty());
    }

    async fn run_stream(chunks: &[&[u8]]) -> (Arc<UsageStore>, Arc<Limiter>) {
        let (store, limiter) = fixtures();
        let acct = StreamAccountant::spawn(
            Arc::clone(&store),
            Arc::clone(&limiter),
            "bob".into(),
            "m2".into(),
        );
        for chunk in chunks {
            acct.observe(&Bytes::copy_from_slice(chunk));
        }
        acct.finish().await.unwrap();
        (store, limiter)
    }

    #[tokio::test]
    async fn stream_terminal_usage_frame_is_accounted() {
        let (store, limiter) = run_stream(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"there\"}}]}\n\n",
            b"data: {\"usage\":{\"prompt_tokens\":7,\"completion_tokens\":9}}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;

        let usage = store.get("bob");
        assert_eq!(usage["m2"].prompt_tokens, 7);
        assert_eq!(usage["m2"].completion_tokens, 9);
        assert_eq!(used(&limiter, "bob"), 16);
    }

    #[tokio::test]
    async fn stream_chunk_boundaries_inside_lines() {
        // Frames arrive split at arbitrary byte boundaries, including inside
        // the usage object itself.
        let (store, _) = run_stream(&[
            b"data: {\"choices\":[]}\ndata: {\"usa",
            b"ge\":{\"prompt_tokens\":3,\"comp",
            b"letion_tokens\":4}}\ndata: [DONE]\n",
        ])
        .await;

        let usage = store.get("bob");
        assert_eq!(usage["m2"].prompt_tokens, 3);
        assert_eq!(usage["m2"].completion_tokens, 4);
    }

    #[tokio::test]
    async fn stream_last_usage_frame_wins() {
        // "usage" appearing inside content text is superseded by the real
        // terminal frame.
        let (store, _) = run_stream(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"the \\\"usage\\\" field\"}}]}\n",
            b"data: {\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":2}}\n",
            b"data: [DONE]\n",
        ])
        .await;

        let usage = store.get("bob");
        assert_eq!(usage["m2"].prompt_tokens, 1);
        assert_eq!(usage["m2"].completion_tokens, 2);
    }

    #[tokio::test]
    async fn stream_crlf_line_endings() {
        let (store, _) = run_stream(&[
            b"data: {\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":6}}\r\n",
            b"data: [DONE]\r\n",
        ])
        .await;

        assert_eq!(store.get("bob")["m2"].prompt_tokens, 5);
    }

    #[tokio::test]
    async fn stream_without_trailing_newline_is_accounted() {
        let (store, _) = run_stream(&[
            b"data: {\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":2}}",
        ])
        .await;

        assert_eq!(store.get("bob")["m2"].completion_tokens, 2);
    }

    #[tokio::test]
    async fn disconnect_before_usage_frame_drops_accounting() {
        let (store, limiter) = run_stream(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
        ])
        .await;

        assert!(store.get("bob").is_empty());
        assert_eq!(used(&limiter, "bob"), 0);
    }

    #[tokio::test]
    async fn oversized_line_is_discarded_without_derailing_scan() {
        let mut oversized = Vec::from(&b"data: {\"pad\":\""[..]);
        oversized.resize(MAX_LINE_BYTES + 16, b'x');
        let (store, _) = run_stream(&[
            &oversized,
            b"\"}\n",
            b"data: {\"usage\":{\"prompt_tokens\":8,\"completion_tokens\":1}}\n",
            b"data: [DONE]\n",
        ])
        .await;

        let usage = store.get("bob");
        assert_eq!(usage["m2"].prompt_tokens, 8);
        assert_eq!(usage["m2"].completion_tokens, 1);
    }

    #[tokio::test]
    async fn unparsable_usage_frame_is_dropped() {
        let (store, _) =
            run_stream(&[b"data: this mentions \"usage\" but is not json\n", b"data: [DONE]\n"])
                .await;

        assert!(store.get("bob").is_empty());
    }
}
