//! Per-user request-rate and token-quota limits.
//!
//! Rate admission uses a shared one-second [`Rate`] window keyed by user id,
//! compared against the user's configured allowance. Token debits arrive
//! asynchronously from the accounting tasks, so the quota check tolerates a
//! small grace beyond the configured cap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pingora_limits::rate::Rate;
use registry::Registry;
use serde::Serialize;

/// Extra tokens a user may consume beyond their configured quota before
/// requests start being rejected. This tolerates the inherent async delay
/// between a request completing and its tokens being recorded — keeping the
/// common case off the hot path.
const TOKEN_QUOTA_GRACE: i64 = 5;

/// Defaults applied to users the limiter has not been configured for.
pub const FREE_TIER_RPS: i64 = 1000;
pub const FREE_TIER_TOKENS: i64 = 100_000;
pub const FREE_TIER_TOKENS_PER_REQ: i64 = 4000;

/// Wire sentinel: no limit.
pub const INF_RPS: i64 = -1;
pub const INF_TOKENS: i64 = -1;
pub const INF_TOKENS_PER_REQ: i64 = -1;

/// Rate + quota state for one user.
///
/// Fields are atomics so reconfiguration (serialized through the table mutex)
/// and the lock-free read/debit paths never contend.
#[derive(Debug)]
struct UserLimit {
    rps: AtomicI64,
    max_tokens: AtomicI64,
    max_tokens_per_req: AtomicI64,
    used_tokens: AtomicI64,
}

impl UserLimit {
    fn free_tier() -> Self {
        Self {
            rps: AtomicI64::new(FREE_TIER_RPS),
            max_tokens: AtomicI64::new(FREE_TIER_TOKENS),
            max_tokens_per_req: AtomicI64::new(FREE_TIER_TOKENS_PER_REQ),
            used_tokens: AtomicI64::new(0),
        }
    }

    fn zeroed() -> Self {
        Self {
            rps: AtomicI64::new(0),
            max_tokens: AtomicI64::new(0),
            max_tokens_per_req: AtomicI64::new(0),
            used_tokens: AtomicI64::new(0),
        }
    }
}

/// Limit snapshot for one user (admin inspection).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LimitInfo {
    pub max_tokens: i64,
    pub max_tokens_per_req: i64,
    pub used_tokens: i64,
    pub rps: i64,
}

/// Manages per-user RPS and token quota limits.
#[derive(Debug)]
pub struct Limiter {
    users: Mutex<HashMap<String, Arc<UserLimit>>>,
    rate: Rate,
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Limiter {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            rate: Rate::new(Duration::from_secs(1)),
        }
    }

    fn get_or_create(&self, user: &str) -> Arc<UserLimit> {
        let mut users = self.users.lock().expect("limiter table poisoned");
        Arc::clone(
            users
                .entry(user.to_string())
                // New users start on the free tier.
                .or_insert_with(|| Arc::new(UserLimit::free_tier())),
        )
    }

    /// Update RPS, total token quota, and per-request token cap for a user.
    ///
    /// `INF_RPS` / `INF_TOKENS` / `INF_TOKENS_PER_REQ` (-1) remove a limit;
    /// 0 leaves the token fields unchanged; `rps == 0` hard-blocks the user.
    /// The consumed-token counter is always reset. Takes effect immediately
    /// for all subsequent requests.
    pub fn set_limits(&self, user: &str, rps: i64, max_tokens: i64, max_tokens_per_req: i64) {
        let mut users = self.users.lock().expect("limiter table poisoned");
        let entry = users
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(UserLimit::zeroed()));
        entry.rps.store(rps, Ordering::Relaxed);
        if max_tokens != 0 {
            // INF_TOKENS (-1) stored as-is = unlimited
            entry.max_tokens.store(max_tokens, Ordering::Relaxed);
        }
        if max_tokens_per_req != 0 {
            entry
                .max_tokens_per_req
                .store(max_tokens_per_req, Ordering::Relaxed);
        }
        // Reset consumed token counter when limits are updated.
        entry.used_tokens.store(0, Ordering::Relaxed);
    }

    /// Non-blocking rate admission: true if the user is within its allowance
    /// for the current one-second window.
    pub fn check_rps(&self, user: &str) -> bool {
        let entry = self.get_or_create(user);
        match entry.rps.load(Ordering::Relaxed) {
            INF_RPS => true,
            // rps = 0 is the suspension state: never admits.
            0 => false,
            rps => self.rate.observe(&user, 1) <= rps as isize,
        }
    }

    /// Quota admission: true while consumed tokens stay below
    /// `max_tokens + grace`. `INF_TOKENS` never rejects.
    pub fn check_quota(&self, user: &str) -> bool {
        let entry = self.get_or_create(user);
        let max_tokens = entry.max_tokens.load(Ordering::Relaxed);
        if max_tokens == INF_TOKENS {
            return true;
        }
        entry.used_tokens.load(Ordering::Relaxed) < max_tokens + TOKEN_QUOTA_GRACE
    }

    /// Atomically record token usage after inference.
    pub fn consume_tokens(&self, user: &str, n: i64) {
        let entry = self.get_or_create(user);
        entry.used_tokens.fetch_add(n, Ordering::Relaxed);
    }

    /// Per-request token cap for a user (`INF_TOKENS_PER_REQ` = unlimited).
    pub fn max_tokens_per_request(&self, user: &str) -> i64 {
        let entry = self.get_or_create(user);
        entry.max_tokens_per_req.load(Ordering::Relaxed)
    }

    /// Limit snapshot for every registered user. Users the limiter has not
    /// seen yet surface free-tier defaults with zero usage.
    pub fn get_all_limits(&self, registry: &Registry) -> HashMap<String, LimitInfo> {
        let users = self.users.lock().expect("limiter table poisoned");
        registry
            .all()
            .into_iter()
            .map(|u| {
                let info = match users.get(&u.id) {
                    Some(entry) => LimitInfo {
                        max_tokens: entry.max_tokens.load(Ordering::Relaxed),
                        max_tokens_per_req: entry.max_tokens_per_req.load(Ordering::Relaxed),
                        used_tokens: entry.used_tokens.load(Ordering::Relaxed),
                        rps: entry.rps.load(Ordering::Relaxed),
                    },
                    None => LimitInfo {
                        max_tokens: FREE_TIER_TOKENS,
                        max_tokens_per_req: FREE_TIER_TOKENS_PER_REQ,
                        used_tokens: 0,
                        rps: FREE_TIER_RPS,
                    },
                };
                (u.id, info)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_rps_explicit_unlimited() {
        let lim = Limiter::new();
        lim.set_limits("user-a", INF_RPS, 0, 0);

        // With unlimited RPS, 100 rapid calls should all pass.
        for i in 0..100 {
            assert!(lim.check_rps("user-a"), "call {i} should pass");
        }
    }

    #[test]
    fn check_rps_limit_enforced() {
        let lim = Limiter::new();
        lim.set_limits("user-b", 2, 0, 0); // 2 RPS, token fields untouched

        // First two calls pass (allowance = RPS per window).
        assert!(lim.check_rps("user-b"), "call 1 should pass");
        assert!(lim.check_rps("user-b"), "call 2 should pass");

        // Third call in the same window is rejected.
        assert!(!lim.check_rps("user-b"), "call 3 should be rate-limited");

        // After the window rolls over, requests pass again.
        std::thread::sleep(Duration::from_millis(1100));
        assert!(lim.check_rps("user-b"), "call after refill should pass");
    }

    #[test]
    fn check_rps_suspended_never_admits() {
        let lim = Limiter::new();
        lim.set_limits("user-s", 0, 0, 0);

        for _ in 0..10 {
            assert!(!lim.check_rps("user-s"));
        }
    }

    #[test]
    fn check_quota_limit_enforced() {
        let lim = Limiter::new();
        lim.set_limits("user-c", INF_RPS, 10, 0);

        assert!(lim.check_quota("user-c"), "should pass before consuming");

        // Consume exactly quota + grace; should now be rejected.
        lim.consume_tokens("user-c", 15);
        assert!(!lim.check_quota("user-c"), "quota + grace exhausted");
    }

    #[test]
    fn check_quota_unlimited_never_rejects() {
        let lim = Limiter::new();
        lim.set_limits("user-inf", INF_RPS, INF_TOKENS, 0);
        lim.consume_tokens("user-inf", 1_000_000);

        assert!(lim.check_quota("user-inf"));
    }

    #[test]
    fn consume_tokens_accumulates() {
        let lim = Limiter::new();
        lim.set_limits("user-d", INF_RPS, 100, 0);

        lim.consume_tokens("user-d", 30);
        lim.consume_tokens("user-d", 30);
        lim.consume_tokens("user-d", 30);

        // 90/100 used, within quota + grace.
        assert!(lim.check_quota("user-d"));

        // 105/100 exceeds quota + grace.
        lim.consume_tokens("user-d", 15);
        assert!(!lim.check_quota("user-d"));
    }

    #[test]
    fn set_limits_resets_usage() {
        let lim = Limiter::new();
        lim.set_limits("user-e", INF_RPS, 5, 0);
        lim.consume_tokens("user-e", 10); // quota (5) + grace (5)
        assert!(!lim.check_quota("user-e"));

        // Reconfiguring resets the counter even for an over-quota user.
        lim.set_limits("user-e", INF_RPS, 100, 0);
        assert!(lim.check_quota("user-e"));
    }

    #[test]
    fn set_limits_zero_leaves_token_fields_unchanged() {
        let lim = Limiter::new();
        lim.set_limits("user-f", INF_RPS, 50, 60);
        lim.set_limits("user-f", 10, 0, 0);

        let registry = registry::Registry::new([registry::User::new("user-f", "sk-f", false)]);
        let info = lim.get_all_limits(&registry)["user-f"];
        assert_eq!(info.max_tokens, 50);
        assert_eq!(info.max_tokens_per_req, 60);
        assert_eq!(info.rps, 10);
        assert_eq!(info.used_tokens, 0);
    }

    #[test]
    fn new_users_start_on_free_tier() {
        let lim = Limiter::new();

        assert_eq!(lim.max_tokens_per_request("fresh"), FREE_TIER_TOKENS_PER_REQ);
        assert!(lim.check_quota("fresh"));
        assert!(lim.check_rps("fresh"));
    }

    #[test]
    fn get_all_limits_seeds_unseen_users_with_defaults() {
        let lim = Limiter::new();
        lim.set_limits("alice", 5, 10, 20);

        let registry = Registry::default();
        let limits = lim.get_all_limits(&registry);

        assert_eq!(limits["alice"].rps, 5);
        assert_eq!(limits["alice"].max_tokens, 10);
        assert_eq!(limits["bob"].rps, FREE_TIER_RPS);
        assert_eq!(limits["bob"].max_tokens, FREE_TIER_TOKENS);
        assert_eq!(limits["bob"].used_tokens, 0);
    }
}
