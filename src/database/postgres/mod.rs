//! Postgres document store: one `(id text, doc jsonb)` table per collection.

pub mod jsonpath;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use self::jsonpath::{compile, CompiledFilter, Predicate};
use super::engine::apply_update;
use super::manager::{DatabaseError, DatabaseManager};
use super::store::{DocumentStore, IndexSpec, StoreQuery, UpdateResult};
use crate::consts::ID_FIELD;
use crate::filter::scalar::format_date;
use crate::filter::SortDirection;

const UNIQUE_VIOLATION: &str = "23505";

pub struct PostgresStore {
    pool: PgPool,
    ttl: RwLock<HashMap<String, Vec<(String, Duration)>>>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ttl: RwLock::new(HashMap::new()),
        }
    }

    fn table(collection: &str) -> Result<String, DatabaseError> {
        if !DatabaseManager::is_valid_identifier(collection) {
            return Err(DatabaseError::InvalidCollectionName(collection.to_string()));
        }
        Ok(DatabaseManager::quote_identifier(collection))
    }

    /// Appends ` WHERE ...` for an expression predicate. Callers handle `Never`.
    fn push_where(qb: &mut QueryBuilder<'_, Postgres>, compiled: &CompiledFilter) {
        if let Predicate::Expr(expr) = &compiled.predicate {
            qb.push(" WHERE jsonb_path_match(doc, ")
                .push_bind(expr.clone())
                .push("::jsonpath, ")
                .push_bind(compiled.vars.clone())
                .push("::jsonb)");
        }
    }

    /// Deletes documents whose TTL field has passed. Dates compare as text.
    async fn purge_expired(&self, collection: &str) -> Result<(), DatabaseError> {
        let rules = {
            let ttl = self.ttl.read().await;
            match ttl.get(collection) {
                Some(rules) => rules.clone(),
                None => return Ok(()),
            }
        };
        for (field, after) in rules {
            let cutoff = chrono::Duration::from_std(after)
                .map(|after| Utc::now() - after)
                .unwrap_or_else(|_| Utc::now());
            let filter = json!({ field: { "$lte": format_date(&cutoff) } });
            let removed = self.delete_matching(collection, &filter).await?;
            if removed > 0 {
                debug!("expired {} documents from {}", removed, collection);
            }
        }
        Ok(())
    }

    async fn delete_matching(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError> {
        let table = Self::table(collection)?;
        let compiled = compile(filter)?;
        if compiled.predicate == Predicate::Never {
            return Ok(0);
        }
        let mut qb = QueryBuilder::new(format!("DELETE FROM {}", table));
        Self::push_where(&mut qb, &compiled);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn map_insert_error(err: sqlx::Error, id: &str) -> DatabaseError {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                DatabaseError::DuplicateKey(id.to_string())
            }
            _ => DatabaseError::Sqlx(err),
        }
    }

    /// Array literal for an index expression path, e.g. `'{"a","b"}'`.
    fn path_literal(field: &str) -> String {
        let segments: Vec<String> = field
            .split('.')
            .map(|s| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        format!("'{{{}}}'", segments.join(",").replace('\'', "''"))
    }

    fn index_name(collection: &str, field: &str) -> String {
        let suffix: String = field
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        DatabaseManager::quote_identifier(&format!("{}_{}_idx", collection, suffix))
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ensure_collection(&self, collection: &str, indexes: &[IndexSpec]) -> Result<(), DatabaseError> {
        let table = Self::table(collection)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id text PRIMARY KEY, doc jsonb NOT NULL)",
            table
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING GIN (doc jsonb_path_ops)",
            Self::index_name(collection, "doc"),
            table
        ))
        .execute(&self.pool)
        .await?;

        for index in indexes {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ((doc #> {}))",
                Self::index_name(collection, &index.field),
                table,
                Self::path_literal(&index.field)
            ))
            .execute(&self.pool)
            .await?;
            if let Some(after) = index.expire_after {
                let mut ttl = self.ttl.write().await;
                let rules = ttl.entry(collection.to_string()).or_default();
                if !rules.iter().any(|(f, _)| *f == index.field) {
                    rules.push((index.field.clone(), after));
                }
            }
        }
        info!("ensured collection {} with {} indexes", collection, indexes.len());
        Ok(())
    }

    async fn collection_names(&self) -> Result<Vec<String>, DatabaseError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = current_schema() ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn find(&self, collection: &str, query: StoreQuery<'_>) -> Result<Vec<Value>, DatabaseError> {
        let table = Self::table(collection)?;
        self.purge_expired(collection).await?;
        let compiled = compile(query.filter)?;
        if compiled.predicate == Predicate::Never || query.limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new(format!("SELECT doc FROM {}", table));
        Self::push_where(&mut qb, &compiled);
        qb.push(" ORDER BY ");
        for (field, direction) in query.sort.fields() {
            let segments: Vec<String> = field.split('.').map(str::to_string).collect();
            // missing values sort first ascending, as the in-process store does
            let nulls = match direction {
                SortDirection::Asc => "NULLS FIRST",
                SortDirection::Desc => "NULLS LAST",
            };
            qb.push("doc #> ")
                .push_bind(segments)
                .push(format!("::text[] {} {}, ", direction.to_sql(), nulls));
        }
        qb.push("id ASC");
        if query.skip > 0 {
            qb.push(" OFFSET ").push_bind(query.skip as i64);
        }
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let docs = qb.build_query_scalar::<Value>().fetch_all(&self.pool).await?;
        Ok(docs)
    }

    async fn count(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError> {
        let table = Self::table(collection)?;
        self.purge_expired(collection).await?;
        let compiled = compile(filter)?;
        if compiled.predicate == Predicate::Never {
            return Ok(0);
        }
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table));
        Self::push_where(&mut qb, &compiled);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<(), DatabaseError> {
        let table = Self::table(collection)?;
        self.purge_expired(collection).await?;
        let statement = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", table);
        for doc in docs {
            let id = doc.get(ID_FIELD).and_then(Value::as_str).ok_or(DatabaseError::MissingId)?;
            sqlx::query(&statement)
                .bind(id)
                .bind(doc)
                .execute(&self.pool)
                .await
                .map_err(|e| Self::map_insert_error(e, id))?;
        }
        Ok(())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
    ) -> Result<Option<(Value, Value)>, DatabaseError> {
        let table = Self::table(collection)?;
        self.purge_expired(collection).await?;
        let compiled = compile(filter)?;
        if compiled.predicate == Predicate::Never {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;
        let mut qb = QueryBuilder::new(format!("SELECT id, doc FROM {}", table));
        Self::push_where(&mut qb, &compiled);
        qb.push(" ORDER BY id LIMIT 1 FOR UPDATE");
        let row: Option<(String, Value)> = qb.build_query_as().fetch_optional(&mut *tx).await?;
        let Some((id, old)) = row else {
            return Ok(None);
        };

        let mut updated = old.clone();
        if apply_update(&mut updated, update, filter)? {
            sqlx::query(&format!("UPDATE {} SET doc = $1 WHERE id = $2", table))
                .bind(&updated)
                .bind(&id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(Some((old, updated)))
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Value,
        update: &Value,
        multi: bool,
    ) -> Result<UpdateResult, DatabaseError> {
        let table = Self::table(collection)?;
        self.purge_expired(collection).await?;
        let compiled = compile(filter)?;
        if compiled.predicate == Predicate::Never {
            return Ok(UpdateResult::default());
        }

        let mut tx = self.pool.begin().await?;
        let mut qb = QueryBuilder::new(format!("SELECT id, doc FROM {}", table));
        Self::push_where(&mut qb, &compiled);
        qb.push(" ORDER BY id");
        if !multi {
            qb.push(" LIMIT 1");
        }
        qb.push(" FOR UPDATE");
        let rows: Vec<(String, Value)> = qb.build_query_as().fetch_all(&mut *tx).await?;

        let statement = format!("UPDATE {} SET doc = $1 WHERE id = $2", table);
        let mut result = UpdateResult::default();
        for (id, mut doc) in rows {
            result.matched += 1;
            if apply_update(&mut doc, update, filter)? {
                sqlx::query(&statement).bind(&doc).bind(&id).execute(&mut *tx).await?;
                result.modified += 1;
            }
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn find_one_and_delete(&self, collection: &str, filter: &Value) -> Result<Option<Value>, DatabaseError> {
        let table = Self::table(collection)?;
        self.purge_expired(collection).await?;
        let compiled = compile(filter)?;
        if compiled.predicate == Predicate::Never {
            return Ok(None);
        }
        let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE id = (SELECT id FROM {}", table, table));
        Self::push_where(&mut qb, &compiled);
        qb.push(" ORDER BY id LIMIT 1 FOR UPDATE) RETURNING doc");
        let doc = qb.build_query_scalar::<Value>().fetch_optional(&self.pool).await?;
        Ok(doc)
    }

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64, DatabaseError> {
        self.purge_expired(collection).await?;
        self.delete_matching(collection, filter).await
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
