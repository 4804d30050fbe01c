//! The tenant record. Its guid is the tenant id, so every tenant sees at
//! most one document here.

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};

use crate::consts::{CUSTOMERS_COLLECTION, CUSTOMER_PATH, GUID_FIELD, TENANT_PATH};
use crate::context::RequestContext;
use crate::database::Scope;
use crate::document::{guid_of, strip_internal, DocumentKind};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::utils::json_body;
use crate::routes::RouteOptions;
use crate::state::AppState;

pub fn options() -> RouteOptions {
    RouteOptions::new(CUSTOMER_PATH, CUSTOMERS_COLLECTION, DocumentKind::Customer)
        .with_get_by_guid_only(true)
        .with_delete(false)
        .with_post_unique_name(false)
        .with_body_decoder(decode_own_record)
        .with_route("", get(get_own_record).delete(delete_own_data))
}

/// Routes reachable without a tenant cookie.
pub fn public_routes() -> Router<AppState> {
    Router::new().route(TENANT_PATH, post(create_tenant))
}

/// The record always describes the calling tenant.
fn decode_own_record(request: &RequestContext, body: Value) -> Result<Vec<Value>, ApiError> {
    let Value::Object(mut record) = body else {
        return Err(ApiError::bad_request("customer record must be a JSON object"));
    };
    record.insert(GUID_FIELD.to_string(), Value::String(request.tenant.clone()));
    Ok(vec![Value::Object(record)])
}

/// GET /customer - the caller's tenant record
async fn get_own_record(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
) -> ApiResult<Value> {
    let scope = request.scope(CUSTOMERS_COLLECTION);
    let record = state
        .access
        .get_doc_by_guid(&scope, &request.tenant)
        .await?
        .ok_or_else(|| ApiError::not_found("document not found"))?;
    Ok(ApiResponse::success(strip_internal(record)))
}

/// DELETE /customer - purge every document of the caller, record included
async fn delete_own_data(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
) -> ApiResult<Value> {
    let deleted = state
        .access
        .delete_customer_docs(&request.scope(CUSTOMERS_COLLECTION))
        .await?;
    tracing::info!(tenant = %request.tenant, deleted, "tenant deleted its data");
    Ok(ApiResponse::success(json!({ "deleted": deleted })))
}

/// POST /customer_tenant - create a tenant record; the body's guid names the tenant
async fn create_tenant(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let record = json_body(&body)?.ok_or_else(|| ApiError::bad_request("no documents in request"))?;
    if !record.is_object() {
        return Err(ApiError::bad_request("customer record must be a JSON object"));
    }
    let tenant = guid_of(&record)
        .filter(|guid| !guid.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("missing guid"))?;

    let scope = Scope::new(tenant.clone(), CUSTOMERS_COLLECTION);
    let created = state
        .access
        .insert_document(&scope, DocumentKind::Customer, record)
        .await?;
    tracing::info!(tenant = %tenant, "tenant created");
    Ok(ApiResponse::created(strip_internal(created)))
}
