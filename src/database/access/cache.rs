use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::filter::FilterBuilder;

/// Where a cached document comes from.
#[derive(Debug, Clone)]
pub enum CacheSource {
    /// First document of `collection` matching `filter`, re-read once the TTL elapses.
    Query { collection: String, filter: FilterBuilder, ttl: Duration },
    /// Value supplied by configuration; never refreshed.
    Fixed(Value),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<Value>,
    expires_at: Instant,
}

/// Lazily refreshed named documents. Sources are registered at startup;
/// entries are filled on first access and after expiry.
#[derive(Debug, Default)]
pub struct DocumentCache {
    sources: HashMap<String, CacheSource>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, source: CacheSource) {
        self.sources.insert(key.into(), source);
    }

    pub fn source(&self, key: &str) -> Option<&CacheSource> {
        self.sources.get(key)
    }

    /// Fresh cached value, if any. `Some(None)` records a cached miss.
    pub async fn lookup(&self, key: &str) -> Option<Option<Value>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    pub async fn store(&self, key: &str, value: Option<Value>, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
