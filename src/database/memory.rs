use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::engine::{apply_update, compare::as_date, matches, path, sort_docs};
use super::manager::DatabaseError;
use super::store::{DocumentStore, IndexSpec, StoreQuery, UpdateResult};
use crate::consts::ID_FIELD;

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<Value>,
    ttl: Vec<(String, Duration)>,
}

impl Collection {
    fn is_expired(&self, doc: &Value) -> bool {
        let now = Utc::now();
        self.ttl.iter().any(|(field, after)| {
            let Some(at) = path::get(doc, field).and_then(as_date) else {
                return false;
            };
            chrono::Duration::from_std(*after)
                .map(|after| at + after <= now)
                .unwrap_or(false)
        })
    }

    fn purge_expired(&mut self) {
        if self.ttl.is_empty() {
            return;
        }
        let before = self.docs.len();
        let mut docs = std::mem::take(&mut self.docs);
        docs.retain(|doc| !self.is_expired(doc));
        self.docs = docs;
        if self.docs.len() != before {
            tracing::debug!("expired {} documents", before - self.docs.len());
        }
    }

    fn position(&self, filter: &Value) -> Result<Option<usize>, DatabaseError> {
        for (idx, doc) in self.docs.iter().enumerate() {
            if matches(doc, filter)? {
                return Ok(Some(idx));
            }
        }
        Ok(None)
    }
}

/// In-process store evaluating the filter dialect with the query engine.
/// Used when no database URL is configured, and by the test suite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(doc: &Value) -> Result<&str, DatabaseError> {
    doc.get(ID_FIELD).and_then(Value::as_str).ok_or(DatabaseError::MissingId)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self, collection: &str, indexes: &[IndexSpec]) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        for index in indexes {
            if let Some(after) = index.expire_after {
                if !entry.ttl.iter().any(|(f, _)| *f == index.field) {
                    entry.ttl.push((index.field.clone(), after));
                }
            }
        }
        Ok(())
    }

    async fn collection_names(&self) -> Result<Vec<String>, DatabaseError> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn find(&self, collection: &str, query: StoreQuery<'_>) -> Result<Vec<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for doc in &coll.docs {
            if !coll.is_expired(doc) && matches(doc, query.filter)? {
                found.push(doc.clone());
            }
        }
        sort_docs(&mut found, query.sort);
        let page = found.into_iter().skip(query.skip);
        Ok(match query.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(0);
        };
        let mut count = 0;
        for doc in &coll.docs {
            if !coll.is_expired(doc) && matches(doc, filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        coll.purge_expired();
        for doc in docs {
            let id = doc_id(doc)?;
            if coll.docs.iter().any(|existing| doc_id(existing).ok() == Some(id)) {
                return Err(DatabaseError::DuplicateKey(id.to_string()));
            }
            coll.docs.push(doc.clone());
        }
        Ok(())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
    ) -> Result<Option<(Value, Value)>, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        coll.purge_expired();
        let Some(idx) = coll.position(filter)? else {
            return Ok(None);
        };
        let mut updated = coll.docs[idx].clone();
        apply_update(&mut updated, update, filter)?;
        let old = std::mem::replace(&mut coll.docs[idx], updated.clone());
        Ok(Some((old, updated)))
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
        multi: bool,
    ) -> Result<UpdateResult, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(UpdateResult::default());
        };
        coll.purge_expired();
        let mut result = UpdateResult::default();
        for doc in coll.docs.iter_mut() {
            if !matches(doc, filter)? {
                continue;
            }
            result.matched += 1;
            let mut updated = doc.clone();
            if apply_update(&mut updated, update, filter)? {
                *doc = updated;
                result.modified += 1;
            }
            if !multi {
                break;
            }
        }
        Ok(result)
    }

    async fn find_one_and_delete(&self, collection: &str, filter: &Value) -> Result<Option<Value>, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        coll.purge_expired();
        Ok(coll.position(filter)?.map(|idx| coll.docs.remove(idx)))
    }

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };
        coll.purge_expired();
        let mut kept = Vec::with_capacity(coll.docs.len());
        let mut deleted = 0;
        for doc in coll.docs.drain(..) {
            if matches(&doc, filter)? {
                deleted += 1;
            } else {
                kept.push(doc);
            }
        }
        coll.docs = kept;
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
