//! User and admin JSON endpoints served directly by the proxy.
//!
//! None of these touch the upstream; each handler builds a status code and a
//! JSON body that the proxy writes to the downstream session.

use std::collections::HashMap;

use registry::Registry;
use serde::{Deserialize, Serialize};

use crate::limiter::{Limiter, LimitInfo, INF_RPS, INF_TOKENS, INF_TOKENS_PER_REQ};
use crate::usage::{ModelUsage, UsageStore};

/// A status code and serialized JSON body.
pub type ApiResponse = (u16, Vec<u8>);

pub fn error_body(msg: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "error": msg })).unwrap_or_default()
}

fn ok(body: &impl Serialize) -> ApiResponse {
    match serde_json::to_vec(body) {
        Ok(body) => (200, body),
        Err(_) => (500, error_body("failed to encode response")),
    }
}

#[derive(Debug, Serialize)]
struct UsageResponse {
    usage_by_model: HashMap<String, ModelUsage>,
}

#[derive(Debug, Serialize)]
struct AllUsageResponse {
    usage_by_user: HashMap<String, UsageResponse>,
}

#[derive(Debug, Serialize)]
struct AllLimitsResponse {
    limits: HashMap<String, LimitInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetLimitsRequest {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    rps: i64,
    #[serde(default)]
    max_tokens: i64,
    #[serde(default)]
    max_tokens_per_request: i64,
}

#[derive(Debug, Serialize)]
struct SetLimitsResponse {
    user_id: String,
    rps: i64,
    max_tokens: i64,
    max_tokens_per_request: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspendUserRequest {
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Serialize)]
struct SuspendUserResponse {
    user_id: String,
    status: &'static str,
}

/// GET /v1/usage — token usage for the authenticated user, keyed by model.
pub fn user_usage(store: &UsageStore, user: &str) -> ApiResponse {
    ok(&UsageResponse {
        usage_by_model: store.get(user),
    })
}

/// GET /admin/usage — token usage for every user.
pub fn all_usage(store: &UsageStore, registry: &Registry) -> ApiResponse {
    let usage_by_user = store
        .get_all(registry)
        .into_iter()
        .map(|(user, usage_by_model)| (user, UsageResponse { usage_by_model }))
        .collect();
    ok(&AllUsageResponse { usage_by_user })
}

/// GET /admin/limits — limit and usage snapshot for every user.
pub fn all_limits(limiter: &Limiter, registry: &Registry) -> ApiResponse {
    ok(&AllLimitsResponse {
        limits: limiter.get_all_limits(registry),
    })
}

/// Each limit field must be set explicitly: positive, or -1 for unlimited.
/// Zero is reserved internally ("leave unchanged" / suspension) and is not a
/// valid configured value.
fn validate_limits(req: &SetLimitsRequest) -> Result<(), String> {
    if req.user_id.is_empty() {
        return Err("field \"user_id\" is required".to_string());
    }
    let fields = [
        ("rps", req.rps, INF_RPS),
        ("max_tokens", req.max_tokens, INF_TOKENS),
        (
            "max_tokens_per_request",
            req.max_tokens_per_request,
            INF_TOKENS_PER_REQ,
        ),
    ];
    for (name, value, inf) in fields {
        if value <= 0 && value != inf {
            return Err(format!("field {name:?} must be > 0 or -1; got {value}"));
        }
    }
    Ok(())
}

/// POST /admin/limits — set per-user limits. Resets the user's consumed
/// token counter as a side effect.
pub fn set_limits(limiter: &Limiter, body: &[u8]) -> ApiResponse {
    let Ok(req) = serde_json::from_slice::<SetLimitsRequest>(body) else {
        return (400, error_body("invalid JSON body"));
    };
    if let Err(msg) = validate_limits(&req) {
        return (400, error_body(&msg));
    }
    limiter.set_limits(&req.user_id, req.rps, req.max_tokens, req.max_tokens_per_request);
    log::info!(
        "limits updated for {}: rps={} max_tokens={} max_tokens_per_request={}",
        req.user_id,
        req.rps,
        req.max_tokens,
        req.max_tokens_per_request
    );

    ok(&SetLimitsResponse {
        user_id: req.user_id,
        rps: req.rps,
        max_tokens: req.max_tokens,
        max_tokens_per_request: req.max_tokens_per_request,
    })
}

/// POST /admin/suspend — hard-block a user.
pub fn suspend(limiter: &Limiter, body: &[u8]) -> ApiResponse {
    let req = serde_json::from_slice::<SuspendUserRequest>(body).unwrap_or_default();
    if req.user_id.is_empty() {
        return (400, error_body("user_id is required"));
    }
    // rps = 0 with zero burst: the rate check rejects every request, so the
    // token fields can stay untouched.
    limiter.set_limits(&req.user_id, 0, 0, 0);
    log::info!("user {} suspended", req.user_id);

    ok(&SuspendUserResponse {
        user_id: req.user_id,
        status: "suspended",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn json(resp: &ApiResponse) -> Value {
        serde_json::from_slice(&resp.1).unwrap()
    }

    #[test]
    fn user_usage_returns_accounted_counters() {
        let store = UsageStore::new();
        store.add("alice", "m1", 12, 34);

        let resp = user_usage(&store, "alice");
        assert_eq!(resp.0, 200);
        let v = json(&resp);
        assert_eq!(v["usage_by_model"]["m1"]["prompt_tokens"], 12);
        assert_eq!(v["usage_by_model"]["m1"]["completion_tokens"], 34);
    }

    #[test]
    fn all_usage_seeds_registered_users() {
        let store = UsageStore::new();
        let registry = Registry::default();

        let v = json(&all_usage(&store, &registry));
        assert!(v["usage_by_user"]["alice"]["usage_by_model"]
            .as_object()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn set_limits_applies_and_echoes() {
        let limiter = Limiter::new();
        let body = br#"{"user_id":"alice","rps":2,"max_tokens":100,"max_tokens_per_request":50}"#;

        let resp = set_limits(&limiter, body);
        assert_eq!(resp.0, 200);
        assert_eq!(json(&resp)["max_tokens"], 100);
        assert_eq!(limiter.max_tokens_per_request("alice"), 50);
    }

    #[test]
    fn set_limits_accepts_unlimited_sentinels() {
        let limiter = Limiter::new();
        let body = br#"{"user_id":"alice","rps":-1,"max_tokens":-1,"max_tokens_per_request":-1}"#;

        let resp = set_limits(&limiter, body);
        assert_eq!(resp.0, 200);
        assert_eq!(limiter.max_tokens_per_request("alice"), INF_TOKENS_PER_REQ);
        // Unlimited quota never rejects.
        limiter.consume_tokens("alice", 1_000_000);
        assert!(limiter.check_quota("alice"));
    }

    #[test]
    fn set_limits_rejects_zero_fields() {
        let limiter = Limiter::new();
        let body = br#"{"user_id":"alice","rps":0,"max_tokens":100,"max_tokens_per_request":50}"#;

        let resp = set_limits(&limiter, body);
        assert_eq!(resp.0, 400);
        assert!(json(&resp)["error"].as_str().unwrap().contains("rps"));
    }

    #[test]
    fn set_limits_requires_user_id() {
        let limiter = Limiter::new();
        let body = br#"{"rps":2,"max_tokens":100,"max_tokens_per_request":50}"#;

        assert_eq!(set_limits(&limiter, body).0, 400);
    }

    #[test]
    fn set_limits_rejects_malformed_body() {
        let limiter = Limiter::new();
        assert_eq!(set_limits(&limiter, b"{not json").0, 400);
    }

    #[test]
    fn suspend_hard_blocks_user() {
        let limiter = Limiter::new();
        let resp = suspend(&limiter, br#"{"user_id":"bob"}"#);

        assert_eq!(resp.0, 200);
        assert_eq!(json(&resp)["status"], "suspended");
        assert!(!limiter.check_rps("bob"));
    }

    #[test]
    fn suspend_requires_user_id() {
        let limiter = Limiter::new();
        assert_eq!(suspend(&limiter, b"{}").0, 400);
    }
}
