//! The registry table: hashed key -> user lookup.

use std::collections::HashMap;

use crate::hash::hash_key;
use crate::user::User;

/// Immutable lookup table from hashed API key to user identity.
#[derive(Debug)]
pub struct Registry {
    by_hash: HashMap<String, User>,
}

impl Registry {
    /// Build a registry from a list of users.
    ///
    /// Later entries with the same key silently win; configuration
    /// validation is expected to reject duplicates before this point.
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        let by_hash = users
            .into_iter()
            .map(|u| (hash_key(&u.key), u))
            .collect();
        Self { by_hash }
    }

    /// Resolve a presented API key to `(user_id, is_admin)`.
    ///
    /// Returns `None` for unknown keys.
    pub fn resolve(&self, key: &str) -> Option<(&str, bool)> {
        let user = self.by_hash.get(&hash_key(key))?;
        Some((user.id.as_str(), user.is_admin))
    }

    /// All registered users (copies, in no particular order).
    pub fn all(&self) -> Vec<User> {
        self.by_hash.values().cloned().collect()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

impl Default for Registry {
    /// Static simulation registry. In production these would come from a
    /// database or secrets manager.
    fn default() -> Self {
        Self::new([
            User::new("alice", "sk-alice-001", false),
            User::new("bob", "sk-bob-001", false),
            User::new("charlie", "sk-charlie-001", false),
            User::new("admin", "sk-admin-001", true),
        ])
    }
}
