//! Persistence seam for computed results.

use serde_json::Value;

/// Keyed storage of serialized results. Implementations decide retention.
pub trait ResultStore: Send + Sync {
    fn put(&self, key: &str, value: Value);

    fn get(&self, key: &str) -> Option<Value>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
