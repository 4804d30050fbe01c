//! Assembles the HTTP application: collection routes behind the tenant
//! middleware, the admin surface behind the admin check, and the public
//! endpoints.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::admin;
use crate::collections;
use crate::config::AppConfig;
use crate::consts::{CUSTOMER_CONFIG_COLLECTION, DEFAULT_CUSTOMER_CONFIG_KEY, GLOBAL_CONFIG_NAME};
use crate::database::access::CacheSource;
use crate::database::{DataAccess, DbError, DocumentStore};
use crate::filter::FilterBuilder;
use crate::middleware::{admin_middleware, tenant_middleware};
use crate::routes::RouteError;
use crate::schema::ApiRegistry;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid route configuration: {0}")]
    Route(#[from] RouteError),

    #[error("failed to prepare collections: {0}")]
    Database(#[from] DbError),
}

/// Source of the global customer configuration: the configured document
/// when there is one, the stored `default` document otherwise.
fn default_customer_config(config: &AppConfig) -> CacheSource {
    match config.defaults.customer_config.clone() {
        Some(value) => CacheSource::Fixed(value),
        None => CacheSource::Query {
            collection: CUSTOMER_CONFIG_COLLECTION.to_string(),
            filter: FilterBuilder::new().with_global().with_name(GLOBAL_CONFIG_NAME),
            ttl: Duration::from_secs(config.defaults.cached_document_ttl_secs),
        },
    }
}

/// Builds the application over `store`. Collections and their indexes are
/// created before the router is returned.
pub async fn app(store: Arc<dyn DocumentStore>, config: AppConfig) -> Result<Router, StartupError> {
    let mut registry = ApiRegistry::new();
    let api = collections::routes(&mut registry, &config)?;

    let access = DataAccess::new(store).with_cached_document(DEFAULT_CUSTOMER_CONFIG_KEY, default_customer_config(&config));
    for collection in registry.collections() {
        access.ensure_collection(&collection).await?;
    }
    tracing::info!(
        backend = access.backend(),
        paths = registry.paths().len(),
        "collections ready"
    );

    let body_limit = config.api.max_request_size_bytes;
    let request_logging = config.api.enable_request_logging;
    let state = AppState {
        access: Arc::new(access),
        registry: Arc::new(registry),
        config: Arc::new(config),
    };

    let admin = admin::routes().route_layer(from_fn_with_state(state.clone(), admin_middleware));
    let protected = api.merge(admin).route_layer(from_fn(tenant_middleware));

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(collections::customer::public_routes())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        );
    if request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    Ok(app.with_state(state))
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let paths: Vec<String> = state.registry.paths().into_iter().map(|p| format!("/{}", p)).collect();
    Json(json!({
        "name": "config-service",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.access.backend(),
        "paths": paths,
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    match state.access.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok",
            })),
        ),
        Err(err) => {
            tracing::error!("health check failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable",
                })),
            )
        }
    }
}
