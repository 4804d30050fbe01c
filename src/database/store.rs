use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::manager::DatabaseError;
use crate::filter::SortBuilder;

/// Secondary index declared for a collection at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub field: String,
    /// Documents expire once the date stored in `field` plus this delay has passed.
    pub expire_after: Option<Duration>,
}

impl IndexSpec {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            expire_after: None,
        }
    }

    pub fn ttl(field: &str, expire_after: Duration) -> Self {
        Self {
            field: field.to_string(),
            expire_after: Some(expire_after),
        }
    }
}

/// Read request handed to a store. Projection is applied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct StoreQuery<'a> {
    pub filter: &'a Value,
    pub sort: &'a SortBuilder,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl<'a> StoreQuery<'a> {
    pub fn new(filter: &'a Value, sort: &'a SortBuilder) -> Self {
        Self {
            filter,
            sort,
            skip: 0,
            limit: None,
        }
    }

    pub fn window(mut self, skip: usize, limit: Option<usize>) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

/// Document storage primitives. Filters and update commands use the
/// Mongo-shaped dialect produced by `FilterBuilder` and `filter::update`;
/// every document carries its primary key in `_id`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Creates the collection if needed and registers its indexes.
    async fn ensure_collection(&self, collection: &str, indexes: &[IndexSpec]) -> Result<(), DatabaseError>;

    async fn collection_names(&self) -> Result<Vec<String>, DatabaseError>;

    async fn find(&self, collection: &str, query: StoreQuery<'_>) -> Result<Vec<Value>, DatabaseError>;

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError>;

    /// Inserts in order and stops at the first failure; earlier documents stay.
    async fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<(), DatabaseError>;

    /// Updates the first match and returns the document before and after.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
    ) -> Result<Option<(Value, Value)>, DatabaseError>;

    async fn update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
        multi: bool,
    ) -> Result<UpdateResult, DatabaseError>;

    async fn find_one_and_delete(&self, collection: &str, filter: &Value) -> Result<Option<Value>, DatabaseError>;

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
