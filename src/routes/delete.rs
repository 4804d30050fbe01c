use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    Extension,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::utils::{json_body, query_pairs, query_values};
use crate::consts::{GUID_FIELD, NAME_FIELD};
use crate::context::{CollectionContext, RequestContext};
use crate::error::ApiError;
use crate::filter::FilterBuilder;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// DELETE P/:guid - delete one document and return it
pub async fn delete_by_guid(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    Path(guid): Path<String>,
) -> ApiResult<Value> {
    let scope = collection.scope(&request);
    let deleted = state
        .access
        .delete_by_guid(&scope, &guid)
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;
    tracing::info!(collection = %collection.collection, tenant = %request.tenant, guid = %guid, "deleted document");
    Ok(ApiResponse::success(collection.send(deleted)))
}

/// DELETE P/bulk - delete by `guid` query parameters or a JSON array of ids
pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let mut guids = query_values(&params, GUID_FIELD);
    if guids.is_empty() {
        guids = string_list(json_body(&body).ok().flatten());
    }
    if guids.is_empty() {
        return Err(ApiError::bad_request("missing guids in query or body"));
    }

    let scope = collection.scope(&request);
    let deleted = state
        .access
        .bulk_delete(&scope, FilterBuilder::new().with_ids(&guids))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("document not found"));
    }
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}

/// DELETE P - delete by name, from the query or a body `[{<param>: name}]`
///
/// A single name answers with the deleted document, several with the count.
pub async fn delete_by_name(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Value> {
    let param = collection.name_query_param.as_deref().unwrap_or(NAME_FIELD);
    let params = query_pairs(query);
    let mut names = query_values(&params, param);
    if names.is_empty() {
        names = named_entries(json_body(&body).ok().flatten(), param);
    }
    if names.is_empty() {
        return Err(ApiError::bad_request("missing name"));
    }

    let scope = collection.scope(&request);
    if let [name] = names.as_slice() {
        let deleted = state
            .access
            .delete_by_name(&scope, name)
            .await?
            .ok_or_else(|| ApiError::not_found("document not found"))?;
        return Ok(ApiResponse::success(collection.send(deleted)));
    }

    let deleted = state.access.bulk_delete_by_name(&scope, &names).await?;
    if deleted == 0 {
        return Err(ApiError::not_found("document not found"));
    }
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}

fn string_list(body: Option<Value>) -> Vec<String> {
    match body {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn named_entries(body: Option<Value>, param: &str) -> Vec<String> {
    match body {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get(param).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
