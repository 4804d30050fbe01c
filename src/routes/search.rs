use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::utils::typed_body;
use crate::context::{CollectionContext, RequestContext};
use crate::database::{SearchResult, UniqueValuesResponse};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::{unique_values_find_options, v2_list_find_options, UniqueValuesRequest, V2ListRequest};
use crate::state::AppState;

/// POST P/query - paginated search
pub async fn query(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    body: Bytes,
) -> ApiResult<SearchResult> {
    let list: V2ListRequest = typed_body(&body)?;
    let opts = v2_list_find_options(&list, &collection.schema, state.max_page_size())?;
    let scope = collection.scope(&request);
    let result = state.access.find_paginated_for_customer(&scope, opts).await?;
    tracing::debug!(collection = %collection.collection, total = result.total.value, "v2 list");
    Ok(ApiResponse::success(result.map_response(|doc| collection.send(doc))))
}

/// POST P/:guid/query - paginated search inside one document's nested array
pub async fn nested_query(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    Path(guid): Path<String>,
    body: Bytes,
) -> ApiResult<SearchResult> {
    let nested_path = collection
        .schema
        .nested_doc_path()
        .ok_or_else(|| ApiError::not_found("no nested documents in this collection"))?;
    let list: V2ListRequest = typed_body(&body)?;
    let opts = v2_list_find_options(&list, &collection.schema, state.max_page_size())?;
    let scope = collection.scope(&request);
    let result = state
        .access
        .find_nested_paginated(&scope, &guid, nested_path, &opts, false)
        .await?;
    Ok(ApiResponse::success(result.map_response(|doc| collection.send(doc))))
}

/// POST P/uniqueValues - distinct values and counts per field
pub async fn unique_values(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    body: Bytes,
) -> ApiResult<UniqueValuesResponse> {
    let unique: UniqueValuesRequest = typed_body(&body)?;
    let opts = unique_values_find_options(&unique, &collection.schema, state.max_page_size())?;
    let scope = collection.scope(&request);
    let result = state
        .access
        .aggregate_for_customer(&scope, opts, &collection.schema)
        .await?;
    Ok(ApiResponse::success(result))
}

/// DELETE P/query - delete the tenant's documents matched by a v2 list request
pub async fn delete_by_query(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    body: Bytes,
) -> ApiResult<Value> {
    let list: V2ListRequest = typed_body(&body)?;
    let opts = v2_list_find_options(&list, &collection.schema, state.max_page_size())?;
    let scope = collection.scope(&request);
    let deleted = state.access.bulk_delete(&scope, opts.filter().clone()).await?;
    tracing::info!(collection = %collection.collection, tenant = %request.tenant, deleted, "deleted by query");
    Ok(ApiResponse::success(json!({ "deletedCount": deleted })))
}
