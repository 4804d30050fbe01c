use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};

use crate::context::RequestContext;
use crate::database::{Scope, SearchResult, UniqueValuesResponse};
use crate::document::strip_internal;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::{unique_values_find_options, v2_list_find_options, UniqueValuesRequest, V2ListRequest};
use crate::routes::utils::typed_body;
use crate::schema::ApiInfo;
use crate::state::AppState;

/// Registration of a public path, or 404 listing the known ones.
fn api_info<'a>(state: &'a AppState, path: &str) -> Result<&'a ApiInfo, ApiError> {
    state.registry.get(path).ok_or_else(|| {
        let available: Vec<String> = state.registry.paths().into_iter().map(|p| format!("/{}", p)).collect();
        ApiError::not_found(format!(
            "unknown path /{} - available paths are [{}]",
            path,
            available.join(" ")
        ))
    })
}

fn admin_scope(request: &RequestContext, info: &ApiInfo) -> Scope {
    request.scope(&info.db_collection)
}

/// POST /admin/:path/query - paginated search across tenants
pub async fn query(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult<SearchResult> {
    let info = api_info(&state, &path)?;
    let list: V2ListRequest = typed_body(&body)?;
    let opts = v2_list_find_options(&list, &info.schema, state.max_page_size())?;
    let result = state
        .access
        .admin_find_paginated(&admin_scope(&request, info), &opts)
        .await?;
    tracing::info!(admin = %request.tenant, path = %path, total = result.total.value, "admin query");
    Ok(ApiResponse::success(result.map_response(strip_internal)))
}

/// DELETE /admin/:path/query - delete every document matched by a v2 list request
pub async fn delete_by_query(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult<Value> {
    let info = api_info(&state, &path)?;
    let list: V2ListRequest = typed_body(&body)?;
    let opts = v2_list_find_options(&list, &info.schema, state.max_page_size())?;
    let deleted = state
        .access
        .admin_delete_many(&admin_scope(&request, info), opts.filter())
        .await?;
    tracing::info!(admin = %request.tenant, path = %path, deleted, "admin delete by query");
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}

/// POST /admin/:path/uniqueValues - distinct values across tenants
pub async fn unique_values(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Path(path): Path<String>,
    body: Bytes,
) -> ApiResult<UniqueValuesResponse> {
    let info = api_info(&state, &path)?;
    let unique: UniqueValuesRequest = typed_body(&body)?;
    let opts = unique_values_find_options(&unique, &info.schema, state.max_page_size())?;
    let result = state
        .access
        .admin_aggregate(&admin_scope(&request, info), &opts, &info.schema)
        .await?;
    Ok(ApiResponse::success(result))
}
