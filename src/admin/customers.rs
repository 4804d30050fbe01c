use axum::{
    extract::{RawQuery, State},
    Extension,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::consts::{
    CUSTOMERS_COLLECTION, CUSTOMERS_PARAM, FROM_DATE_PARAM, LIMIT_PARAM, PROJECTION_PARAM, SKIP_PARAM, TO_DATE_PARAM,
};
use crate::context::RequestContext;
use crate::database::AggResult;
use crate::document::{format_time, strip_internal};
use crate::error::ApiError;
use crate::filter::FindOptions;
use crate::middleware::{ApiResponse, ApiResult};
use crate::query::{query_params_to_filter, QueryParamsConfig};
use crate::routes::utils::{query_pairs, query_value, query_values};
use crate::state::AppState;

const ACTIVE_CUSTOMERS_TEMPLATE: &str = "customersWithScansBetweenDates";
const DEFAULT_ACTIVE_LIMIT: usize = 1000;

/// GET /admin/activeCustomers - tenants with a posture scan between two dates
pub async fn active_customers(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<AggResult> {
    let params = query_pairs(query);
    let limit = number_param(&params, LIMIT_PARAM, DEFAULT_ACTIVE_LIMIT)?;
    let skip = number_param(&params, SKIP_PARAM, 0)?;
    let from = date_param(&params, FROM_DATE_PARAM)?;
    let to = date_param(&params, TO_DATE_PARAM)?;

    let mut args = Map::new();
    args.insert(FROM_DATE_PARAM.to_string(), Value::String(from));
    args.insert(TO_DATE_PARAM.to_string(), Value::String(to));
    let mut result = state
        .access
        .aggregate_with_template(ACTIVE_CUSTOMERS_TEMPLATE, limit, skip, &args)
        .await?;
    result.results = result.results.into_iter().map(strip_internal).collect();
    Ok(ApiResponse::success(result))
}

/// GET /admin/customers - tenant records matching flat query parameters
pub async fn find_customers(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let filter = query_params_to_filter(&params, &QueryParamsConfig::flat())
        .ok_or_else(|| ApiError::bad_request("must provide query params"))?;
    let mut opts = FindOptions::new();
    opts.set_filter(filter);
    if let Some(projection) = query_value(&params, PROJECTION_PARAM) {
        let fields: Vec<&str> = projection.split(',').map(str::trim).filter(|f| !f.is_empty()).collect();
        if !fields.is_empty() {
            opts.projection_mut().include(&fields);
        }
    }
    let customers = state
        .access
        .admin_find(&request.scope(CUSTOMERS_COLLECTION), &opts)
        .await?;
    Ok(ApiResponse::success(Value::Array(
        customers.into_iter().map(strip_internal).collect(),
    )))
}

/// DELETE /admin/customers?customers=<id>... - purge every document of the tenants
pub async fn delete_customers(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let params = query_pairs(query);
    let tenants = query_values(&params, CUSTOMERS_PARAM);
    if tenants.is_empty() {
        return Err(ApiError::bad_request(format!("missing {} query param", CUSTOMERS_PARAM)));
    }
    let deleted = state.access.admin_delete_customers_docs(&tenants).await?;
    tracing::info!(
        admin = %request.tenant,
        tenants = tenants.len(),
        deleted,
        "purged tenant data"
    );
    Ok(ApiResponse::success(json!({ "deleted": deleted })))
}

fn number_param(params: &[(String, String)], name: &str, default: usize) -> Result<usize, ApiError> {
    match query_value(params, name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("{} must be a number", name))),
        None => Ok(default),
    }
}

/// Required RFC 3339 parameter, normalised to UTC.
fn date_param(params: &[(String, String)], name: &str) -> Result<String, ApiError> {
    let raw = query_value(params, name).ok_or_else(|| ApiError::bad_request(format!("missing {} query param", name)))?;
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| ApiError::bad_request(format!("{} must be in RFC3339 format", name)))?;
    Ok(format_time(parsed.with_timezone(&Utc)))
}
