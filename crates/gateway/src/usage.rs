//! In-memory per-user, per-model token usage accounting.

use std::collections::HashMap;
use std::sync::Mutex;

use registry::Registry;
use serde::Serialize;

/// Token counters for one model. Counters never decrement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Thread-safe in-memory usage store keyed by user -> model.
#[derive(Debug, Default)]
pub struct UsageStore {
    data: Mutex<HashMap<String, HashMap<String, ModelUsage>>>,
}

impl UsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment token counts for the given user + model.
    /// Entries are created on first write.
    pub fn add(&self, user: &str, model: &str, prompt: u64, completion: u64) {
        let mut data = self.data.lock().expect("usage store poisoned");
        let usage = data
            .entry(user.to_string())
            .or_default()
            .entry(model.to_string())
            .or_default();
        usage.prompt_tokens += prompt;
        usage.completion_tokens += completion;
    }

    /// Snapshot of usage for one user, keyed by model.
    /// Unknown users yield an empty map.
    pub fn get(&self, user: &str) -> HashMap<String, ModelUsage> {
        self.data
            .lock()
            .expect("usage store poisoned")
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of usage for every user, seeded so that each registered user
    /// appears even before its first request.
    pub fn get_all(&self, registry: &Registry) -> HashMap<String, HashMap<String, ModelUsage>> {
        let data = self.data.lock().expect("usage store poisoned");
        let mut out: HashMap<String, HashMap<String, ModelUsage>> = registry
            .all()
            .into_iter()
            .map(|u| (u.id, HashMap::new()))
            .collect();
        for (user, models) in data.iter() {
            out.insert(user.clone(), models.clone());
        }
        out
    }
}
