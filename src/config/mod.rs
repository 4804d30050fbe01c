use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub query: QueryConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Largest page a list or unique-values request may return.
    pub max_page_size: usize,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Without a URL the service keeps its documents in memory.
    pub url: Option<String>,
    /// Overrides the database named in the URL.
    pub name: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Tenants allowed on the admin surface regardless of their cookie.
    pub admin_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Served instead of the stored global configuration when set.
    pub customer_config: Option<Value>,
    pub cached_document_ttl_secs: u64,
    pub notifications_cache_ttl_days: i64,
}

/// Optional file named by `CONFIG_PATH`. YAML, or JSON as its subset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub admins: Vec<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    #[serde(default)]
    pub default_configs: FileDefaults,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDefaults {
    pub customer_config: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };
        if let Ok(path) = env::var("CONFIG_PATH") {
            match FileConfig::load(&path) {
                Ok(file) => config = config.with_file(file),
                Err(err) => eprintln!("ignoring config file: {}", err),
            }
        }
        config.with_env_overrides()
    }

    pub fn with_file(mut self, file: FileConfig) -> Self {
        if !file.admins.is_empty() {
            self.security.admin_users = file.admins;
        }
        if let Some(port) = file.port {
            self.api.port = port;
        }
        if file.database_url.is_some() {
            self.database.url = file.database_url;
        }
        if file.database_name.is_some() {
            self.database.name = file.database_name;
        }
        if file.default_configs.customer_config.is_some() {
            self.defaults.customer_config = file.default_configs.customer_config;
        }
        self
    }

    fn with_env_overrides(mut self) -> Self {
        // Query overrides
        if let Ok(v) = env::var("QUERY_MAX_PAGE_SIZE") {
            self.query.max_page_size = v.parse().unwrap_or(self.query.max_page_size);
        }
        if let Ok(v) = env::var("QUERY_DEBUG_LOGGING") {
            self.query.debug_logging = v.parse().unwrap_or(self.query.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_NAME") {
            self.database.name = Some(v).filter(|name| !name.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("CONFIG_SERVICE_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("ADMIN_USERS") {
            self.security.admin_users = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Defaults overrides
        if let Ok(v) = env::var("CACHED_DOCUMENT_TTL_SECS") {
            self.defaults.cached_document_ttl_secs = v.parse().unwrap_or(self.defaults.cached_document_ttl_secs);
        }
        if let Ok(v) = env::var("NOTIFICATIONS_CACHE_TTL_DAYS") {
            self.defaults.notifications_cache_ttl_days =
                v.parse().unwrap_or(self.defaults.notifications_cache_ttl_days);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            query: QueryConfig {
                max_page_size: 150,
                debug_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                name: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig { admin_users: Vec::new() },
            defaults: DefaultsConfig {
                customer_config: None,
                cached_document_ttl_secs: 5 * 60,
                notifications_cache_ttl_days: 90,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            query: QueryConfig {
                max_page_size: 150,
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                name: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig { admin_users: Vec::new() },
            defaults: DefaultsConfig {
                customer_config: None,
                cached_document_ttl_secs: 5 * 60,
                notifications_cache_ttl_days: 90,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            query: QueryConfig {
                max_page_size: 150,
                debug_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                name: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 8080,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig { admin_users: Vec::new() },
            defaults: DefaultsConfig {
                customer_config: None,
                cached_document_ttl_secs: 5 * 60,
                notifications_cache_ttl_days: 90,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
