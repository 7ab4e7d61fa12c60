//! In-memory user registry mapping bearer API keys to user identities.
//!
//! This crate provides:
//! - Extracting the bearer token from an `Authorization` header value
//! - Hashing API keys for storage (keys are never held in plaintext maps)
//! - Resolving a presented key to a stable user id and admin flag
//!
//! The registry is immutable for the lifetime of the process. In production
//! this would be backed by a database or secrets manager; here it is loaded
//! once from configuration (or seeded with simulation defaults).

mod bearer;
mod hash;
mod table;
mod user;

pub use bearer::bearer_token;
pub use hash::hash_key;
pub use table::Registry;
pub use user::User;
