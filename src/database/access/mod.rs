//! Tenant-scoped operations over a `DocumentStore`.
//!
//! Every operation receives a `Scope` carrying the tenant and collection of
//! the current request. Non-admin variants add the tenant predicate before
//! reaching the store; `admin_*` variants run the filter as given.

mod aggregate;
mod cache;
mod error;
mod indexes;
mod read;
mod write;

pub use aggregate::{AggregationTemplate, TEMPLATE_MAX_LIMIT};
pub use cache::{CacheSource, DocumentCache};
pub use error::DbError;
pub use indexes::indexes_for;

use serde_json::Value;
use std::sync::Arc;

use crate::filter::FilterBuilder;
use super::store::{DocumentStore, StoreQuery};
use crate::filter::SortBuilder;

/// Tenant and collection of the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    tenant: String,
    collection: String,
}

impl Scope {
    pub fn new(tenant: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            collection: collection.into(),
        }
    }

    pub fn tenant(&self) -> Result<&str, DbError> {
        if self.tenant.is_empty() {
            return Err(DbError::MissingContext("customerGUID"));
        }
        Ok(&self.tenant)
    }

    pub fn collection(&self) -> Result<&str, DbError> {
        if self.collection.is_empty() {
            return Err(DbError::MissingContext("collection"));
        }
        Ok(&self.collection)
    }

    /// Same tenant, another collection.
    pub fn with_collection(&self, collection: impl Into<String>) -> Self {
        Self {
            tenant: self.tenant.clone(),
            collection: collection.into(),
        }
    }

    /// Appends the tenant predicate to `filter`.
    fn scoped(&self, filter: FilterBuilder, with_globals: bool) -> Result<FilterBuilder, DbError> {
        let collection = self.collection()?;
        let tenant = self.tenant()?;
        Ok(if with_globals {
            filter.with_customer_and_global(tenant)
        } else {
            filter.with_customer(collection, tenant)
        })
    }

    /// Tenant predicate first, then `filter`.
    fn scoped_first(&self, filter: FilterBuilder) -> Result<FilterBuilder, DbError> {
        let base = self.scoped(FilterBuilder::new(), false)?;
        Ok(base.with_filter(filter))
    }
}

pub struct DataAccess {
    store: Arc<dyn DocumentStore>,
    cache: DocumentCache,
}

impl DataAccess {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: DocumentCache::new(),
        }
    }

    /// Registers a lazily cached document. Only valid before the access
    /// layer is shared.
    pub fn with_cached_document(mut self, key: impl Into<String>, source: CacheSource) -> Self {
        self.cache.register(key, source);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Creates the collection and its indexes.
    pub async fn ensure_collection(&self, collection: &str) -> Result<(), DbError> {
        self.store.ensure_collection(collection, &indexes_for(collection)).await?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), DbError> {
        self.store.health_check().await?;
        Ok(())
    }

    /// Named document served from the lazy cache, re-read from the store
    /// once its TTL has elapsed.
    pub async fn get_cached_document(&self, key: &str) -> Result<Option<Value>, DbError> {
        let source = self
            .cache
            .source(key)
            .ok_or_else(|| DbError::UnknownCachedDocument(key.to_string()))?;
        let (collection, filter, ttl) = match source {
            CacheSource::Fixed(value) => return Ok(Some(value.clone())),
            CacheSource::Query { collection, filter, ttl } => (collection, filter, *ttl),
        };
        if let Some(cached) = self.cache.lookup(key).await {
            return Ok(cached);
        }

        tracing::debug!(key, collection = %collection, "refreshing cached document");
        let predicate = filter.build();
        let sort = SortBuilder::new();
        let mut docs = self
            .store
            .find(collection, StoreQuery::new(&predicate, &sort).window(0, Some(1)))
            .await?;
        let value = if docs.is_empty() { None } else { Some(docs.remove(0)) };
        self.cache.store(key, value.clone(), ttl).await;
        Ok(value)
    }
}
