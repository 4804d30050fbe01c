use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    Extension,
};
use serde_json::Value;
use std::sync::Arc;

use super::utils::{decode_documents, json_body, query_pairs};
use crate::context::{CollectionContext, RequestContext};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validator::{Operation, ValidationContext};

/// POST P - insert one document or a batch
pub async fn create(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let body = json_body(&body)?.ok_or_else(|| ApiError::bad_request("no documents in request"))?;
    let bulk = body.is_array();
    let docs = decode_documents(&request, &collection, body)?;
    if docs.is_empty() {
        return Err(ApiError::bad_request("no documents in request"));
    }

    let ctx = ValidationContext {
        access: &state.access,
        request: &request,
        collection: &collection,
        operation: Operation::Create,
        path_guid: None,
        query: &params,
    };
    let docs = collection.post_validators.run(&ctx, docs).await?;

    let scope = collection.scope(&request);
    let inserted = state.access.insert_documents(&scope, collection.kind, docs).await?;
    tracing::info!(
        collection = %collection.collection,
        tenant = %request.tenant,
        count = inserted.len(),
        "created documents"
    );

    let mut sent = collection.send_all(inserted);
    if !bulk && sent.len() == 1 {
        return Ok(ApiResponse::created(sent.remove(0)));
    }
    Ok(ApiResponse::created(Value::Array(sent)))
}
