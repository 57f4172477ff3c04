//! In-memory result store using DashMap.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use sitegrade_core::{Capabilities, ResultStore, SoilPropertiesSource, StandardSoils};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::error::ApiError;
use crate::config::Config;

struct StoredResult {
    value: Value,
    stored_at: Instant,
}

/// Keeps responses for `ttl`, evicting the oldest beyond `capacity`.
pub struct MemoryResultStore {
    entries: DashMap<String, StoredResult>,
    capacity: usize,
    ttl: Duration,
}

impl MemoryResultStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn prune(&self) {
        let now = Instant::now();
        let mut ages: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stored_at))
            .collect();

        ages.retain(|(key, stored_at)| {
            if now.duration_since(*stored_at) > self.ttl {
                self.entries.remove(key);
                false
            } else {
                true
            }
        });

        if self.entries.len() <= self.capacity {
            return;
        }
        ages.sort_by_key(|(_, stored_at)| *stored_at);
        for (key, _) in ages {
            if self.entries.len() <= self.capacity {
                break;
            }
            self.entries.remove(&key);
        }
    }
}

impl ResultStore for MemoryResultStore {
    fn put(&self, key: &str, value: Value) {
        self.entries.insert(
            key.to_string(),
            StoredResult {
                value,
                stored_at: Instant::now(),
            },
        );
        self.prune();
    }

    fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Application state - configuration plus the injected collaborators.
pub struct AppState {
    config: Config,
    results: Arc<dyn ResultStore>,
    soils: Arc<dyn SoilPropertiesSource>,
    capabilities: Capabilities,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let results = Arc::new(MemoryResultStore::new(
            config.result_capacity,
            Duration::from_secs(config.result_ttl_s),
        ));
        Self::with_parts(config, results, Arc::new(StandardSoils), Capabilities::standard())
    }

    pub fn with_parts(
        config: Config,
        results: Arc<dyn ResultStore>,
        soils: Arc<dyn SoilPropertiesSource>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            config,
            results,
            soils,
            capabilities,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn results(&self) -> &dyn ResultStore {
        self.results.as_ref()
    }

    pub fn soils(&self) -> &dyn SoilPropertiesSource {
        self.soils.as_ref()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Reject terrain payloads above the configured cell limit.
    pub fn ensure_grid_size(&self, cells: usize) -> Result<(), ApiError> {
        if cells > self.config.max_grid_cells {
            return Err(ApiError::Validation(format!(
                "terrain has {} cells, limit is {}",
                cells, self.config.max_grid_cells
            )));
        }
        Ok(())
    }

    /// Serialize and keep a response under `id`.
    pub fn store_response<T: Serialize>(&self, id: &str, response: &T) -> Result<(), ApiError> {
        let value = serde_json::to_value(response)
            .map_err(|err| ApiError::Internal(format!("failed to serialize result: {err}")))?;
        self.results.put(id, value);
        tracing::debug!(id, stored = self.results.len(), "result stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_evicts_oldest_beyond_capacity() {
        let store = MemoryResultStore::new(2, Duration::from_secs(60));
        store.put("a", json!(1));
        std::thread::sleep(Duration::from_millis(2));
        store.put("b", json!(2));
        std::thread::sleep(Duration::from_millis(2));
        store.put("c", json!(3));
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_none());
        assert_eq!(store.get("c"), Some(json!(3)));
    }

    #[test]
    fn expired_results_are_dropped() {
        let store = MemoryResultStore::new(8, Duration::ZERO);
        store.put("a", json!({"ok": true}));
        std::thread::sleep(Duration::from_millis(2));
        assert!(store.get("a").is_none());
        assert!(store.is_empty());
    }
}
