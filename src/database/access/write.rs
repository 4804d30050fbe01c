use futures::future::join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{DataAccess, DbError, Scope};
use crate::consts::{CUSTOMERS_COLLECTION, NAME_FIELD};
use crate::database::manager::DatabaseError;
use crate::document::{new_document, DocumentKind};
use crate::filter::update::{add_to_set_command, pull_command};
use crate::filter::FilterBuilder;

impl DataAccess {
    /// Prepares and inserts `docs` in order. The first failure stops the
    /// batch; documents inserted before it remain.
    pub async fn insert_documents(
        &self,
        scope: &Scope,
        kind: DocumentKind,
        docs: Vec<Value>,
    ) -> Result<Vec<Value>, DbError> {
        let collection = scope.collection()?;
        let tenant = scope.tenant()?;
        let prepared: Vec<Value> = docs.into_iter().map(|doc| new_document(kind, doc, tenant)).collect();
        self.store.insert_many(collection, &prepared).await?;
        tracing::debug!(collection, tenant, count = prepared.len(), "inserted documents");
        Ok(prepared)
    }

    pub async fn insert_document(&self, scope: &Scope, kind: DocumentKind, doc: Value) -> Result<Value, DbError> {
        let mut inserted = self.insert_documents(scope, kind, vec![doc]).await?;
        inserted.pop().ok_or(DbError::Store(DatabaseError::MissingId))
    }

    /// Inserts a document exactly as given; `_id` must already be set.
    pub async fn insert_db_document(&self, scope: &Scope, doc: Value) -> Result<(), DbError> {
        let collection = scope.collection()?;
        scope.tenant()?;
        self.store.insert_many(collection, std::slice::from_ref(&doc)).await?;
        Ok(())
    }

    /// Applies `update` to the tenant's document `id` and returns the
    /// document before and after, or `None` when it does not exist.
    pub async fn update_document(
        &self,
        scope: &Scope,
        id: &str,
        update: &Value,
    ) -> Result<Option<(Value, Value)>, DbError> {
        let collection = scope.collection()?;
        let filter = scope.scoped_first(FilterBuilder::new().with_id(id))?.build();
        Ok(self.store.find_one_and_update(collection, &filter, update).await?)
    }

    pub async fn add_to_array(&self, scope: &Scope, id: &str, array_path: &str, values: Vec<Value>) -> Result<u64, DbError> {
        self.update_one(scope, id, &add_to_set_command(array_path, values)).await
    }

    pub async fn pull_from_array(&self, scope: &Scope, id: &str, array_path: &str, values: Vec<Value>) -> Result<u64, DbError> {
        self.update_one(scope, id, &pull_command(array_path, values)).await
    }

    /// Returns the modified count.
    pub async fn update_one(&self, scope: &Scope, id: &str, update: &Value) -> Result<u64, DbError> {
        let collection = scope.collection()?;
        let filter = scope.scoped_first(FilterBuilder::new().with_id(id))?.build();
        let result = self.store.update(collection, &filter, update, false).await?;
        Ok(result.modified)
    }

    /// Updates every match of `filter` across tenants.
    pub async fn admin_update_many(&self, scope: &Scope, filter: &FilterBuilder, update: &Value) -> Result<u64, DbError> {
        let collection = scope.collection()?;
        let result = self.store.update(collection, &filter.build(), update, true).await?;
        tracing::info!(collection, matched = result.matched, modified = result.modified, "admin update");
        Ok(result.modified)
    }

    pub async fn delete_by_guid(&self, scope: &Scope, guid: &str) -> Result<Option<Value>, DbError> {
        let collection = scope.collection()?;
        let filter = scope.scoped_first(FilterBuilder::new().with_id(guid))?.build();
        Ok(self.store.find_one_and_delete(collection, &filter).await?)
    }

    pub async fn delete_by_name(&self, scope: &Scope, name: &str) -> Result<Option<Value>, DbError> {
        let collection = scope.collection()?;
        let filter = scope.scoped_first(FilterBuilder::new().with_name(name))?.build();
        Ok(self.store.find_one_and_delete(collection, &filter).await?)
    }

    pub async fn bulk_delete_by_name<S: AsRef<str>>(&self, scope: &Scope, names: &[S]) -> Result<u64, DbError> {
        let names: Vec<Value> = names.iter().map(|n| Value::String(n.as_ref().to_string())).collect();
        self.bulk_delete(scope, FilterBuilder::new().with_in(NAME_FIELD, names)).await
    }

    /// Deletes the tenant's documents matching `filter`.
    pub async fn bulk_delete(&self, scope: &Scope, filter: FilterBuilder) -> Result<u64, DbError> {
        let collection = scope.collection()?;
        let filter = scope.scoped(filter, false)?.build();
        Ok(self.store.delete_many(collection, &filter).await?)
    }

    /// Deletes every match of `filter` across tenants.
    pub async fn admin_delete_many(&self, scope: &Scope, filter: &FilterBuilder) -> Result<u64, DbError> {
        let collection = scope.collection()?;
        let deleted = self.store.delete_many(collection, &filter.build()).await?;
        tracing::info!(collection, deleted, "admin delete");
        Ok(deleted)
    }

    /// Purges everything the current tenant owns, including its record.
    pub async fn delete_customer_docs(&self, scope: &Scope) -> Result<u64, DbError> {
        let tenant = scope.tenant()?.to_string();
        self.admin_delete_customers_docs(&[tenant]).await
    }

    /// Deletes, concurrently, every document owned by one of `tenants` in
    /// every collection, and the tenants' own records. All failures are
    /// collected; any failure fails the whole call.
    pub async fn admin_delete_customers_docs<S: AsRef<str>>(&self, tenants: &[S]) -> Result<u64, DbError> {
        let tenants: Vec<String> = tenants.iter().map(|t| t.as_ref().to_string()).collect();
        let mut collections = self.store.collection_names().await?;
        if !collections.iter().any(|c| c == CUSTOMERS_COLLECTION) {
            collections.push(CUSTOMERS_COLLECTION.to_string());
        }

        let deleted = Arc::new(AtomicU64::new(0));
        let (errors_tx, mut errors_rx) = mpsc::unbounded_channel::<DbError>();
        let collector = tokio::spawn(async move {
            let mut errors = Vec::new();
            while let Some(err) = errors_rx.recv().await {
                errors.push(err);
            }
            errors
        });

        let mut tasks = Vec::with_capacity(collections.len());
        for collection in collections {
            let filter = if collection == CUSTOMERS_COLLECTION {
                FilterBuilder::new().with_ids(&tenants)
            } else {
                FilterBuilder::new().with_customers(&tenants)
            };
            let store = self.store.clone();
            let deleted = deleted.clone();
            let errors_tx = errors_tx.clone();
            tasks.push(tokio::spawn(async move {
                match store.delete_many(&collection, &filter.build()).await {
                    Ok(count) => {
                        deleted.fetch_add(count, Ordering::Relaxed);
                        tracing::debug!(collection = %collection, count, "purged tenant documents");
                    }
                    Err(err) => {
                        tracing::error!(collection = %collection, "purge failed: {}", err);
                        let _ = errors_tx.send(err.into());
                    }
                }
            }));
        }
        drop(errors_tx);

        for joined in join_all(tasks).await {
            joined?;
        }
        let errors = collector.await?;
        if !errors.is_empty() {
            return Err(DbError::Aggregated(errors));
        }
        let total = deleted.load(Ordering::Relaxed);
        tracing::info!(tenants = ?tenants, deleted = total, "purged tenants");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::filter::update::get_update_doc_command;
    use serde_json::json;

    fn access() -> DataAccess {
        DataAccess::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn insert_assigns_owner_and_rejects_duplicates() {
        let access = access();
        let scope = Scope::new("t1", "v1_repositories");
        let doc = access
            .insert_document(&scope, DocumentKind::Repository, json!({"name": "repo"}))
            .await
            .unwrap();
        assert_eq!(doc["customers"], json!(["t1"]));
        assert_eq!(doc["_id"], doc["guid"]);

        let scope = Scope::new("t1", "users_notifications_cache");
        access
            .insert_document(&scope, DocumentKind::Cache, json!({"guid": "fixed"}))
            .await
            .unwrap();
        let err = access
            .insert_document(&scope, DocumentKind::Cache, json!({"guid": "fixed"}))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn updates_only_reach_owned_documents() {
        let access = access();
        let scope = Scope::new("t1", "workflows");
        let doc = access
            .insert_document(&scope, DocumentKind::Standard, json!({"name": "w", "scope": []}))
            .await
            .unwrap();
        let guid = doc["guid"].as_str().unwrap().to_string();

        let update = get_update_doc_command(&json!({"name": "w2"}), &[] as &[&str], &[]).unwrap();
        let other = Scope::new("t2", "workflows");
        assert!(access.update_document(&other, &guid, &update).await.unwrap().is_none());

        let (old, new) = access.update_document(&scope, &guid, &update).await.unwrap().unwrap();
        assert_eq!(old["name"], "w");
        assert_eq!(new["name"], "w2");

        assert_eq!(access.add_to_array(&scope, &guid, "scope", vec![json!("a"), json!("b")]).await.unwrap(), 1);
        assert_eq!(access.add_to_array(&scope, &guid, "scope", vec![json!("a")]).await.unwrap(), 0);
        assert_eq!(access.pull_from_array(&scope, &guid, "scope", vec![json!("a")]).await.unwrap(), 1);
        let doc = access.get_doc_by_guid(&scope, &guid).await.unwrap().unwrap();
        assert_eq!(doc["scope"], json!(["b"]));
    }

    #[tokio::test]
    async fn deletes_are_scoped_and_counted() {
        let access = access();
        let scope = Scope::new("t1", "workflows");
        let docs = vec![json!({"name": "a"}), json!({"name": "b"}), json!({"name": "c"})];
        access.insert_documents(&scope, DocumentKind::Standard, docs).await.unwrap();

        assert!(access.delete_by_name(&Scope::new("t2", "workflows"), "a").await.unwrap().is_none());
        assert_eq!(access.delete_by_name(&scope, "a").await.unwrap().unwrap()["name"], "a");
        assert_eq!(access.bulk_delete_by_name(&scope, &["b", "c", "d"]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn purge_removes_tenant_documents_everywhere() {
        let access = access();
        for tenant in ["u1", "u2"] {
            let scope = Scope::new(tenant, "clusters");
            access
                .insert_documents(&scope, DocumentKind::Cluster, vec![json!({"name": "c1"}), json!({"name": "c2"})])
                .await
                .unwrap();
            let registry = Scope::new(tenant, CUSTOMERS_COLLECTION);
            access
                .insert_db_document(&registry, json!({"_id": tenant, "guid": tenant, "name": tenant}))
                .await
                .unwrap();
        }

        assert_eq!(access.admin_delete_customers_docs(&["u2"]).await.unwrap(), 3);
        let u1 = Scope::new("u1", "clusters");
        assert_eq!(access.get_all_for_customer(&u1, false).await.unwrap().len(), 2);
        let u2 = Scope::new("u2", "clusters");
        assert!(access.get_all_for_customer(&u2, false).await.unwrap().is_empty());
        let registry = Scope::new("u2", CUSTOMERS_COLLECTION);
        assert!(access.get_doc_by_guid(&registry, "u2").await.unwrap().is_none());
    }
}
