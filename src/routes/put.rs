use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    Extension,
};
use serde_json::Value;
use std::sync::Arc;

use super::utils::{decode_documents, json_body, query_pairs};
use crate::consts::UPDATED_TIME_FIELD;
use crate::context::{CollectionContext, RequestContext};
use crate::document::{guid_of, now};
use crate::error::ApiError;
use crate::filter::update::get_update_doc_command;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validator::{Operation, ValidationContext};

/// PUT P - update the document whose guid is in the body
pub async fn update(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Value> {
    update_document(&state, &request, &collection, None, query, body).await
}

/// PUT P/:guid - update the document named by the path
pub async fn update_by_guid(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    Path(guid): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Value> {
    update_document(&state, &request, &collection, Some(guid), query, body).await
}

/// Runs the update validators, then applies the update to the tenant's
/// document and answers with `[old, new]`.
async fn update_document(
    state: &AppState,
    request: &RequestContext,
    collection: &CollectionContext,
    path_guid: Option<String>,
    query: Option<String>,
    body: Bytes,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let body = json_body(&body)?.ok_or_else(|| ApiError::bad_request("no documents in request"))?;
    if collection.body_decoder.is_none() && !body.is_object() {
        return Err(ApiError::bad_request("request body must be a JSON object"));
    }
    let docs = decode_documents(request, collection, body)?;

    let ctx = ValidationContext {
        access: &state.access,
        request,
        collection,
        operation: Operation::Update,
        path_guid: path_guid.as_deref(),
        query: &params,
    };
    let mut docs = collection.put_validators.run(&ctx, docs).await?;
    if docs.is_empty() {
        return Err(ApiError::bad_request("no documents in request"));
    }
    let mut doc = docs.swap_remove(0);

    let guid = guid_of(&doc)
        .map(str::to_string)
        .or(path_guid)
        .ok_or_else(|| ApiError::bad_request("missing guid"))?;
    if let Some(object) = doc.as_object_mut() {
        object.insert(UPDATED_TIME_FIELD.to_string(), Value::String(now()));
    }

    let read_only = collection.kind.read_only_fields(&doc);
    let update = get_update_doc_command(&doc, &collection.put_fields, &read_only)?;
    let scope = collection.scope(request);
    let (old, new) = state
        .access
        .update_document(&scope, &guid, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;
    tracing::info!(collection = %collection.collection, tenant = %request.tenant, guid = %guid, "updated document");

    Ok(ApiResponse::success(Value::Array(vec![
        collection.send(old),
        collection.send(new),
    ])))
}
