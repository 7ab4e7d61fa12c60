//! The completion proxy: authentication, admission, request rewrite,
//! upstream forwarding, and response observation.
//!
//! `POST /v1/chat/completions` is proxied to the configured upstream with two
//! body rewrites (per-request token cap, streaming usage hook) and an
//! accountant attached to the response. The user/admin JSON endpoints are
//! served directly from `request_filter` without touching the upstream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pingora::http::{RequestHeader, ResponseHeader};
use pingora::prelude::*;
use registry::Registry;

use crate::account::{self, StreamAccountant};
use crate::api::{self, ApiResponse};
use crate::configuration::GatewayConfig;
use crate::limiter::Limiter;
use crate::rewrite;
use crate::usage::UsageStore;

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const USER_USAGE_PATH: &str = "/v1/usage";

/// Outcome of resolving the bearer credential of a request.
enum Credential {
    Missing,
    Unknown,
    User { id: String, is_admin: bool },
}

/// Per-request state threaded through the proxy filters.
#[derive(Default)]
pub struct RequestCtx {
    user_id: String,
    /// Captured at request time from the request body, not inferred from the
    /// response.
    model: String,
    is_stream: bool,
    /// True only for requests headed to the upstream (the completions path).
    proxied: bool,
    /// Request body buffered for the rewrite.
    req_body: Vec<u8>,
    /// Full response body capture (buffered accounting strategy).
    resp_body: Option<Vec<u8>>,
    /// Side-channel tee (streaming accounting strategy).
    accountant: Option<StreamAccountant>,
}

pub struct CompletionProxy {
    upstream_addr: String,
    upstream_host: String,
    registry: Arc<Registry>,
    store: Arc<UsageStore>,
    limiter: Arc<Limiter>,
}

impl CompletionProxy {
    pub fn new(
        config: &GatewayConfig,
        registry: Arc<Registry>,
        store: Arc<UsageStore>,
        limiter: Arc<Limiter>,
    ) -> Self {
        Self {
            upstream_addr: config.upstream.clone(),
            upstream_host: config.upstream_host.clone(),
            registry,
            store,
            limiter,
        }
    }

    fn resolve_credential(&self, session: &Session) -> Credential {
        let key = session
            .req_header()
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(registry::bearer_token);
        let Some(key) = key else {
            return Credential::Missing;
        };
        match self.registry.resolve(key) {
            Some((id, is_admin)) => Credential::User {
                id: id.to_string(),
                is_admin,
            },
            None => Credential::Unknown,
        }
    }

    fn is_admin(&self, session: &Session) -> bool {
        matches!(
            self.resolve_credential(session),
            Credential::User { is_admin: true, .. }
        )
    }

    async fn respond(&self, session: &mut Session, resp: ApiResponse) -> Result<()> {
        let (code, body) = resp;
        let mut header = ResponseHeader::build(code, None)?;
        header.insert_header("Content-Type", "application/json")?;
        header.insert_header("Content-Length", body.len().to_string())?;
        session.set_keepalive(None);
        session
            .write_response_header(Box::new(header), false)
            .await?;
        session.write_response_body(Bytes::from(body), true).await?;
        Ok(())
    }

    /// Admin endpoints carry small JSON bodies; read them in full here.
    async fn api_route(&self, session: &mut Session, method: &str, path: &str) -> ApiResponse {
        if let Some(admin_path) = path.strip_prefix("/admin") {
            if !self.is_admin(session) {
                return (401, api::error_body("admin access required"));
            }
            return match (method, admin_path) {
                ("GET", "/usage") => api::all_usage(&self.store, &self.registry),
                ("GET", "/limits") => api::all_limits(&self.limiter, &self.registry),
                ("POST", "/limits") => match read_body(session).await {
                    Ok(body) => api::set_limits(&self.limiter, &body),
                    Err(_) => (400, api::error_body("failed to read body")),
                },
                ("POST", "/suspend") => match read_body(session).await {
                    Ok(body) => api::suspend(&self.limiter, &body),
                    Err(_) => (400, api::error_body("failed to read body")),
                },
                _ => (404, api::error_body("not found")),
            };
        }

        if method == "GET" && path == USER_USAGE_PATH {
            return match self.resolve_credential(session) {
                Credential::User { id, .. } => api::user_usage(&self.store, &id),
                _ => (401, api::error_body("invalid API key")),
            };
        }

        (404, api::error_body("not found"))
    }
}

async fn read_body(session: &mut Session) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = session.read_request_body().await? {
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[async_trait]
impl ProxyHttp for CompletionProxy {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let method = session.req_header().method.as_str().to_owned();
        let path = session.req_header().uri.path().to_owned();

        if method == "POST" && path == COMPLETIONS_PATH {
            let (user_id, is_admin) = match self.resolve_credential(session) {
                Credential::Missing => {
                    self.respond(session, (401, api::error_body("missing API key")))
                        .await?;
                    return Ok(true);
                }
                Credential::Unknown => {
                    self.respond(session, (401, api::error_body("unknown API key")))
                        .await?;
                    return Ok(true);
                }
                Credential::User { id, is_admin } => (id, is_admin),
            };

            // Admin bypasses admission but is still accounted.
            if !is_admin {
                if !self.limiter.check_rps(&user_id) {
                    self.respond(session, (429, api::error_body("rate limit exceeded")))
                        .await?;
                    return Ok(true);
                }
                if !self.limiter.check_quota(&user_id) {
                    self.respond(session, (403, api::error_body("token quota exceeded")))
                        .await?;
                    return Ok(true);
                }
            }

            ctx.user_id = user_id;
            ctx.proxied = true;
            return Ok(false);
        }

        let resp = self.api_route(session, &method, &path).await;
        self.respond(session, resp).await?;
        Ok(true)
    }

    async fn request_body_filter(
        &self,
        _session: &mut Session,
        body: &mut Option<Bytes>,
        end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        if !ctx.proxied {
            return Ok(());
        }

        // Completion requests are small; hold chunks back until the full
        // body is here, then rewrite and forward it in one piece.
        if let Some(chunk) = body.take() {
            ctx.req_body.extend_from_slice(&chunk);
        }
        if end_of_stream {
            let buffered = std::mem::take(&mut ctx.req_body);
            let peek = rewrite::peek(&buffered);
            ctx.model = peek.model.clone();
            ctx.is_stream = peek.is_stream();

            let cap = self.limiter.max_tokens_per_request(&ctx.user_id);
            *body = Some(match rewrite::rewrite(&buffered, &peek, cap) {
                Some(rewritten) => Bytes::from(rewritten),
                None => Bytes::from(buffered),
            });
        }
        Ok(())
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        // Plain HTTP to the inference backend.
        Ok(Box::new(HttpPeer::new(
            self.upstream_addr.as_str(),
            false,
            String::new(),
        )))
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        _ctx: &mut Self::CTX,
    ) -> Result<()> {
        // Present as a direct client of the upstream; strip headers the
        // backend may reject (like Origin from browser extensions).
        upstream_request.insert_header("Host", &self.upstream_host)?;
        upstream_request.remove_header("Origin");

        // The body is re-emitted in one piece after the rewrite, so its
        // length is unknown at header time.
        upstream_request.remove_header("Content-Length");
        upstream_request.insert_header("Transfer-Encoding", "chunked")?;
        Ok(())
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        _upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        if !ctx.proxied {
            return Ok(());
        }
        // Install the accountant before the first body byte flows.
        if ctx.is_stream {
            ctx.accountant = Some(StreamAccountant::spawn(
                Arc::clone(&self.store),
                Arc::clone(&self.limiter),
                ctx.user_id.clone(),
                ctx.model.clone(),
            ));
        } else {
            ctx.resp_body = Some(Vec::new());
        }
        Ok(())
    }

    fn response_body_filter(
        &self,
        _session: &mut Session,
        body: &mut Option<Bytes>,
        _end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> Result<Option<Duration>> {
        // Chunks pass through untouched; the accounting side only ever sees
        // copies.
        if let Some(acct) = ctx.accountant.as_ref() {
            if let Some(chunk) = body.as_ref() {
                acct.observe(chunk);
            }
        } else if let Some(buf) = ctx.resp_body.as_mut() {
            if let Some(chunk) = body.as_ref() {
                buf.extend_from_slice(chunk);
            }
        }
        Ok(None)
    }

    async fn logging(&self, _session: &mut Session, _e: Option<&Error>, ctx: &mut Self::CTX) {
        // Closing the tee is the only signal the scanner needs; the same
        // teardown covers normal completion and client disconnect.
        if let Some(acct) = ctx.accountant.take() {
            let _ = acct.finish();
        }
        if let Some(buf) = ctx.resp_body.take() {
            let _ = account::spawn_buffered(
                Arc::clone(&self.store),
                Arc::clone(&self.limiter),
                std::mem::take(&mut ctx.user_id),
                std::mem::take(&mut ctx.model),
                Bytes::from(buf),
            );
        }
    }

    async fn fail_to_proxy(&self, session: &mut Session, e: &Error, _ctx: &mut Self::CTX) -> u16 {
        if session.response_written().is_some() {
            // Mid-stream failure; nothing more we can send.
            return 0;
        }
        log::warn!("upstream failure: {e}");
        let msg = format!("upstream error: {e}");
        session.set_keepalive(None);
        if let Ok(mut header) = ResponseHeader::build(502, None) {
            let _ = header.insert_header("Content-Type", "text/plain");
            let _ = header.insert_header("Content-Length", msg.len().to_string());
            if session
                .write_response_header(Box::new(header), false)
                .await
                .is_ok()
            {
                let _ = session.write_response_body(Bytes::from(msg), true).await;
            }
        }
        502
    }
}
