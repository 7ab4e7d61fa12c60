//! Request-body peek and rewrite for `/v1/chat/completions`.
//!
//! Two narrow rewrites are applied before forwarding:
//! 1. Clamp `max_tokens` to the user's per-request cap.
//! 2. For streaming requests, force `stream_options.include_usage = true` so
//!    the upstream emits a terminal usage frame.
//!
//! The body is manipulated as a map of raw JSON values, so every field the
//! rewrite does not touch keeps its exact bytes. Bodies that are not JSON
//! objects are forwarded untouched — the quota layer still protects the
//! system even when per-request capping is relinquished.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::limiter::INF_TOKENS_PER_REQ;

/// Fields the proxy needs to look at before forwarding.
#[derive(Debug, Default, Deserialize)]
pub struct RequestPeek {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
}

impl RequestPeek {
    /// Streaming defaults to true when the field is absent.
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(true)
    }
}

/// Best-effort peek; malformed bodies yield defaults.
pub fn peek(body: &[u8]) -> RequestPeek {
    serde_json::from_slice(body).unwrap_or_default()
}

/// Apply the per-request token cap and the streaming accounting hook.
///
/// Returns `Some(rewritten)` only when a change was made; `None` means the
/// body should be forwarded as-is.
pub fn rewrite(body: &[u8], peek: &RequestPeek, max_tokens_per_req: i64) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(body).ok()?;
    let mut raw: BTreeMap<String, Box<RawValue>> = serde_json::from_str(text).ok()?;
    let mut modified = false;

    // 1. Enforce max_tokens: overwrite when absent or above the cap.
    if max_tokens_per_req != INF_TOKENS_PER_REQ
        && peek.max_tokens.map_or(true, |m| m > max_tokens_per_req)
    {
        raw.insert(
            "max_tokens".to_string(),
            RawValue::from_string(max_tokens_per_req.to_string()).ok()?,
        );
        modified = true;
    }

    // 2. Enforce stream_options: { include_usage: true }, merging with any
    // options the client already sent.
    if peek.is_stream() {
        let mut opts: serde_json::Map<String, Value> = raw
            .get("stream_options")
            .and_then(|v| serde_json::from_str(v.get()).ok())
            .unwrap_or_default();
        let include = opts
            .get("include_usage")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !include {
            opts.insert("include_usage".to_string(), Value::Bool(true));
            let opts = serde_json::to_string(&opts).ok()?;
            raw.insert("stream_options".to_string(), RawValue::from_string(opts).ok()?);
            modified = true;
        }
    }

    if modified {
        serde_json::to_vec(&raw).ok()
    } else {
        None
    }
}
