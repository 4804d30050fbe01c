//! Layered configuration: the global `default` document, the tenant's own
//! `CustomerConfig` and per-cluster documents named after their cluster.
//! Reads merge the layers unless `unmerged` is set.

use async_trait::async_trait;
use axum::{
    extract::{RawQuery, State},
    routing::get,
    Extension,
};
use serde_json::Value;
use std::sync::Arc;

use crate::consts::{
    CLUSTER_NAME_PARAM, CONFIG_NAME_PARAM, CUSTOMER_CONFIG_COLLECTION, CUSTOMER_CONFIG_NAME, CUSTOMER_CONFIG_PATH,
    CUSTOMER_SCOPE, DEFAULT_CUSTOMER_CONFIG_KEY, DEFAULT_SCOPE, GLOBAL_CONFIG_NAME, GUID_FIELD, NAME_FIELD,
    SCOPE_PARAM, UNMERGED_PARAM,
};
use crate::context::{CollectionContext, RequestContext};
use crate::document::{guid_of, name_of, DocumentKind};
use crate::error::ApiError;
use crate::filter::scalar::parse_bool;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::get as get_handlers;
use crate::routes::utils::{query_pairs, query_value};
use crate::routes::RouteOptions;
use crate::state::AppState;
use crate::validator::{ValidationContext, Validator};

pub fn options() -> RouteOptions {
    RouteOptions::new(CUSTOMER_CONFIG_PATH, CUSTOMER_CONFIG_COLLECTION, DocumentKind::CustomerConfig)
        .with_get_by_guid_only(true)
        .with_include_globals(true)
        .with_delete(false)
        .with_put_guid(false)
        .with_put_validator(ResolveConfigByName)
        .with_route("", get(get_config).delete(delete_config))
}

/// Configuration name addressed by the query: `configName`, then
/// `clusterName`, then `scope`.
fn requested_name(params: &[(String, String)]) -> Result<Option<String>, ApiError> {
    if let Some(name) = query_value(params, CONFIG_NAME_PARAM).or_else(|| query_value(params, CLUSTER_NAME_PARAM)) {
        return Ok(Some(name.to_string()));
    }
    match query_value(params, SCOPE_PARAM) {
        Some(DEFAULT_SCOPE) => Ok(Some(GLOBAL_CONFIG_NAME.to_string())),
        Some(CUSTOMER_SCOPE) => Ok(Some(CUSTOMER_CONFIG_NAME.to_string())),
        Some(other) => Err(ApiError::bad_request(format!("unknown scope {}", other))),
        None => Ok(None),
    }
}

/// Deep merge where `overlay` wins. Objects merge key by key; nulls in the
/// overlay keep the base value.
pub fn merge_configs(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                let merged = match base.remove(&key) {
                    Some(existing) => merge_configs(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

async fn default_config(state: &AppState) -> Result<Option<Value>, ApiError> {
    Ok(state.access.get_cached_document(DEFAULT_CUSTOMER_CONFIG_KEY).await?)
}

/// GET /v1_customer_configuration - merged or stored configuration by name, cluster or scope
async fn get_config(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let params = query_pairs(query.clone());
    let Some(name) = requested_name(&params)? else {
        return get_handlers::list(State(state), Extension(request), Extension(collection), RawQuery(query)).await;
    };

    if name == GLOBAL_CONFIG_NAME {
        let config = default_config(&state)
            .await?
            .ok_or_else(|| ApiError::not_found("document not found"))?;
        return Ok(ApiResponse::success(collection.send(config)));
    }

    let scope = collection.scope(&request);
    let stored = state.access.get_doc_by_name(&scope, &name).await?;
    let unmerged = query_value(&params, UNMERGED_PARAM).and_then(parse_bool).unwrap_or(false);
    if unmerged {
        let stored = stored.ok_or_else(|| ApiError::not_found("document not found"))?;
        return Ok(ApiResponse::success(collection.send(stored)));
    }

    let mut layers = vec![default_config(&state).await?];
    if name != CUSTOMER_CONFIG_NAME {
        layers.push(state.access.get_doc_by_name(&scope, CUSTOMER_CONFIG_NAME).await?);
    }
    layers.push(stored);
    let merged = layers
        .into_iter()
        .flatten()
        .reduce(merge_configs)
        .ok_or_else(|| ApiError::not_found("document not found"))?;
    Ok(ApiResponse::success(collection.send(merged)))
}

/// DELETE /v1_customer_configuration - delete the tenant's configuration by name, cluster or scope
async fn delete_config(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let name = requested_name(&params)?.ok_or_else(|| ApiError::bad_request("missing name"))?;
    let deleted = state
        .access
        .delete_by_name(&collection.scope(&request), &name)
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;
    tracing::info!(tenant = %request.tenant, name = %name, "customer configuration deleted");
    Ok(ApiResponse::success(collection.send(deleted)))
}

/// Updates address a stored configuration by name, taken from the query
/// or from the document, and receive its guid.
pub struct ResolveConfigByName;

#[async_trait]
impl Validator for ResolveConfigByName {
    fn name(&self) -> &'static str {
        "resolve_config_by_name"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        let from_query = requested_name(ctx.query)?;
        let scope = ctx.scope();
        for doc in docs.iter_mut() {
            let name = from_query
                .clone()
                .or_else(|| name_of(doc).filter(|n| !n.is_empty()).map(str::to_string))
                .ok_or_else(|| ApiError::bad_request("missing name"))?;
            let stored = ctx
                .access
                .get_doc_by_name(&scope, &name)
                .await?
                .ok_or_else(|| ApiError::not_found("document not found"))?;
            let guid = guid_of(&stored).unwrap_or_default().to_string();
            let object = doc
                .as_object_mut()
                .ok_or_else(|| ApiError::bad_request("request body must be a JSON object"))?;
            object.insert(NAME_FIELD.to_string(), Value::String(name));
            object.insert(GUID_FIELD.to_string(), Value::String(guid));
        }
        Ok(docs)
    }
}
