use axum::{
    extract::{Path, RawQuery, State},
    Extension,
};
use serde_json::Value;
use std::sync::Arc;

use super::utils::{has_param, query_pairs, query_value};
use crate::consts::{CUSTOMERS_FIELD, LIST_PARAM, NAME_FIELD};
use crate::context::{CollectionContext, RequestContext};
use crate::database::DataAccess;
use crate::error::ApiError;
use crate::filter::{FilterBuilder, FindOptions};
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::query_params_to_filter;
use crate::state::AppState;

/// GET P - list the tenant's documents
///
/// Served, in order, as a names list (`?list`), a single document by name
/// (the collection's name parameter), a scope query (recognised query
/// parameters) or the full tenant list.
pub async fn list(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let scope = collection.scope(&request);

    if collection.serve_names_list && has_param(&params, LIST_PARAM) {
        let mut opts = FindOptions::new();
        opts.projection_mut().include(&[NAME_FIELD]).exclude_id();
        let docs = state
            .access
            .find_for_customer(&scope, opts, collection.include_globals)
            .await?;
        let names: Vec<Value> = docs.into_iter().filter_map(|doc| doc.get(NAME_FIELD).cloned()).collect();
        return Ok(ApiResponse::success(Value::Array(names)));
    }

    if let Some(param) = collection.name_query_param.as_deref() {
        if let Some(name) = query_value(&params, param) {
            let doc = find_one(
                &state.access,
                &request,
                &collection,
                FilterBuilder::new().with_name(name),
            )
            .await?
            .ok_or_else(|| ApiError::not_found("document not found"))?;
            return Ok(ApiResponse::success(collection.send(doc)));
        }
    }

    if let Some(config) = collection.query_config.as_ref() {
        if let Some(filter) = query_params_to_filter(&params, config) {
            tracing::debug!(collection = %collection.collection, filter = %filter.build(), "scope query");
            let mut opts = FindOptions::new();
            opts.set_filter(filter);
            let docs = state.access.find_for_customer(&scope, opts, false).await?;
            return Ok(ApiResponse::success(Value::Array(collection.send_all(docs))));
        }
    }

    let docs = state
        .access
        .get_all_for_customer(&scope, collection.include_globals)
        .await?;
    Ok(ApiResponse::success(Value::Array(collection.send_all(docs))))
}

/// GET P/:guid - single document by id
pub async fn get_by_guid(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    Path(guid): Path<String>,
) -> ApiResult<Value> {
    let doc = find_one(&state.access, &request, &collection, FilterBuilder::new().with_id(guid))
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;
    Ok(ApiResponse::success(collection.send(doc)))
}

/// First match of `filter` visible to the tenant. With global documents
/// included, the tenant's own document wins over a global one.
pub(crate) async fn find_one(
    access: &DataAccess,
    request: &RequestContext,
    collection: &CollectionContext,
    filter: FilterBuilder,
) -> Result<Option<Value>, ApiError> {
    let scope = collection.scope(request);
    let mut opts = FindOptions::new();
    opts.set_filter(filter);
    let mut docs = access.find_for_customer(&scope, opts, collection.include_globals).await?;
    let owned = docs.iter().position(|doc| is_owned_by(doc, &request.tenant));
    Ok(match owned {
        Some(index) => Some(docs.swap_remove(index)),
        None if docs.is_empty() => None,
        None => Some(docs.swap_remove(0)),
    })
}

fn is_owned_by(doc: &Value, tenant: &str) -> bool {
    doc.get(CUSTOMERS_FIELD)
        .and_then(Value::as_array)
        .map(|owners| owners.iter().any(|owner| owner.as_str() == Some(tenant)))
        .unwrap_or(false)
}
