//! Token-metering reverse proxy for an OpenAI-compatible inference backend.
//!
//! The data plane authenticates bearer credentials against the registry,
//! enforces per-user rate and token-quota policy, rewrites completion
//! requests to constrain cost, forwards them upstream, and attributes token
//! usage by observing the response off the critical path.

pub mod account;
pub mod api;
pub mod configuration;
pub mod limiter;
pub mod proxy;
pub mod rewrite;
pub mod server;
pub mod usage;
