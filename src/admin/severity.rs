use axum::{body::Bytes, extract::State, Extension};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::consts::{POSTURE_EXCEPTION_POLICIES_COLLECTION, VULNERABILITY_EXCEPTION_POLICIES_COLLECTION};
use crate::context::RequestContext;
use crate::filter::update::set_field_command;
use crate::filter::FilterBuilder;
use crate::middleware::{ApiResponse, ApiResult};
use crate::routes::utils::typed_body;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilitySeverityUpdate {
    #[serde(default)]
    pub cves: Vec<String>,
    #[serde(default)]
    pub severity_score: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureSeverityUpdate {
    #[serde(default, rename = "controlIDS")]
    pub control_ids: Vec<String>,
    #[serde(default)]
    pub severity_score: i64,
}

/// PUT /admin/updateVulnerabilityExceptionsSeverity - rescore listed CVEs in every exception policy
pub async fn update_vulnerability_exceptions(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult<Value> {
    let update: VulnerabilitySeverityUpdate = typed_body(&body)?;
    let filter = FilterBuilder::new().with_in("vulnerabilities.name", strings(update.cves));
    let command = set_field_command("vulnerabilities.$.severityScore", json!(update.severity_score));
    let scope = request.scope(VULNERABILITY_EXCEPTION_POLICIES_COLLECTION);
    let updated = state.access.admin_update_many(&scope, &filter, &command).await?;
    Ok(ApiResponse::success(json!({ "updatedCount": updated })))
}

/// PUT /admin/updatePostureExceptionsSeverity - rescore listed controls in every exception policy
pub async fn update_posture_exceptions(
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult<Value> {
    let update: PostureSeverityUpdate = typed_body(&body)?;
    let filter = FilterBuilder::new().with_in("posturePolicies.controlID", strings(update.control_ids));
    let command = set_field_command("posturePolicies.$.severityScore", json!(update.severity_score));
    let scope = request.scope(POSTURE_EXCEPTION_POLICIES_COLLECTION);
    let updated = state.access.admin_update_many(&scope, &filter, &command).await?;
    Ok(ApiResponse::success(json!({ "updatedCount": updated })))
}

fn strings(values: Vec<String>) -> Vec<Value> {
    values.into_iter().map(Value::String).collect()
}
