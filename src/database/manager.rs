use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use super::engine::EngineError;
use super::memory::MemoryStore;
use super::postgres::PostgresStore;
use super::store::DocumentStore;
use crate::config::DatabaseConfig;

/// Errors raised by the document stores
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("duplicate key {0}")]
    DuplicateKey(String),

    #[error("document without a string _id")]
    MissingId,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pool cache keyed by database name, plus store selection
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Postgres when a database URL is configured, the in-process store otherwise.
    pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        let Some(base_url) = config.url.as_deref() else {
            info!("DATABASE_URL not set, using the in-memory document store");
            return Ok(Arc::new(MemoryStore::new()));
        };
        let connection_string = Self::build_connection_string(base_url, config.name.as_deref())?;
        let pool = Self::instance().get_pool(&connection_string, config).await?;
        Ok(Arc::new(PostgresStore::new(pool)))
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(&self, connection_string: &str, config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(connection_string) {
                return Ok(pool.clone());
            }
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(connection_string)
            .await?;

        {
            let mut pools = self.pools.write().await;
            pools.insert(connection_string.to_string(), pool.clone());
        }

        info!("Created database pool for: {}", Self::redacted(connection_string));
        Ok(pool)
    }

    /// Swaps the database name into the URL path when one is configured
    fn build_connection_string(base: &str, database_name: Option<&str>) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if let Some(name) = database_name {
            if !Self::is_valid_identifier(name) {
                return Err(DatabaseError::InvalidDatabaseUrl);
            }
            url.set_path(&format!("/{}", name));
        }
        Ok(url.into())
    }

    fn redacted(connection_string: &str) -> String {
        match url::Url::parse(connection_string) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.into()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Collection and database names: lowercase ascii, digits and underscores
    pub fn is_valid_identifier(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 63
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let manager = Self::instance();
        let mut pools = manager.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", Self::redacted(&name));
        }
    }
}
