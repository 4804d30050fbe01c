//! Notification settings, stored inside the tenant record under
//! `notifications_config` and served as a resource of their own.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::consts::{CUSTOMERS_COLLECTION, GUID_FIELD, NOTIFICATION_CONFIG_PATH, UPDATED_TIME_FIELD};
use crate::context::RequestContext;
use crate::document::DocumentKind;
use crate::error::ApiError;
use crate::routes::{ContainerHandler, ContainerKind, ContainerTarget, RouteOptions};

const NOTIFICATION_CONFIG_FIELD: &str = "notifications_config";
const UNSUBSCRIBED_USERS_PREFIX: &str = "notifications_config.unsubscribedUsers.";
const LATEST_PUSH_REPORTS_PREFIX: &str = "notifications_config.latestPushReports.";

pub fn options() -> RouteOptions {
    RouteOptions::new(NOTIFICATION_CONFIG_PATH, CUSTOMERS_COLLECTION, DocumentKind::Customer)
        .with_get_by_guid_only(true)
        .with_put_fields(&[NOTIFICATION_CONFIG_FIELD, UPDATED_TIME_FIELD])
        .with_post(false)
        .with_delete(false)
        .with_body_decoder(decode_notification_config)
        .with_response_sender(notification_config_of)
        .with_container(ContainerHandler::new(
            "/unsubscribe/:userId",
            ContainerKind::Array,
            unsubscribe_target,
        ))
        .with_container(ContainerHandler::new(
            "/latestPushReport/:clusterName",
            ContainerKind::Map,
            latest_push_report_target,
        ))
}

/// Wraps the settings in a partial tenant record. Bulk bodies are rejected.
fn decode_notification_config(request: &RequestContext, body: Value) -> Result<Vec<Value>, ApiError> {
    if !body.is_object() {
        return Err(ApiError::bad_request("notification config must be a JSON object"));
    }
    let mut record = Map::new();
    record.insert(GUID_FIELD.to_string(), Value::String(request.tenant.clone()));
    record.insert(NOTIFICATION_CONFIG_FIELD.to_string(), body);
    Ok(vec![Value::Object(record)])
}

fn notification_config_of(mut record: Value) -> Value {
    record
        .get_mut(NOTIFICATION_CONFIG_FIELD)
        .map(Value::take)
        .filter(|config| !config.is_null())
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn required_param<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("missing {}", name)))
}

/// Notification ids a user unsubscribed from, one or many per request.
fn unsubscribe_target(
    request: &RequestContext,
    params: &HashMap<String, String>,
    body: Option<Value>,
) -> Result<ContainerTarget, ApiError> {
    let user_id = required_param(params, "userId")?;
    let ids = match body {
        Some(Value::Array(ids)) => ids,
        Some(id) => vec![id],
        None => Vec::new(),
    };
    if ids.is_empty() {
        return Err(ApiError::bad_request("missing notificationId"));
    }
    let valid = ids.iter().all(|id| {
        id.get("notificationType")
            .and_then(Value::as_str)
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    });
    if !valid {
        return Err(ApiError::bad_request("missing notificationId"));
    }
    Ok(ContainerTarget {
        path: format!("{}{}", UNSUBSCRIBED_USERS_PREFIX, user_id),
        values: ids,
        guid: Some(request.tenant.clone()),
    })
}

/// Last push report per cluster. PUT carries the report, DELETE nothing.
fn latest_push_report_target(
    request: &RequestContext,
    params: &HashMap<String, String>,
    body: Option<Value>,
) -> Result<ContainerTarget, ApiError> {
    let cluster = required_param(params, "clusterName")?;
    if body.as_ref().map(|b| !b.is_object()).unwrap_or(false) {
        return Err(ApiError::bad_request("push report must be a JSON object"));
    }
    Ok(ContainerTarget {
        path: format!("{}{}", LATEST_PUSH_REPORTS_PREFIX, cluster),
        values: body.into_iter().collect(),
        guid: Some(request.tenant.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn config_is_wrapped_in_tenant_record() {
        let request = RequestContext::new("t1", false);
        let docs = decode_notification_config(&request, json!({"weekly": true})).unwrap();
        assert_eq!(docs, vec![json!({"guid": "t1", "notifications_config": {"weekly": true}})]);
        assert!(decode_notification_config(&request, json!([{}])).is_err());
    }

    #[test]
    fn sender_returns_settings_only() {
        let record = json!({"guid": "t1", "name": "acme", "notifications_config": {"weekly": true}});
        assert_eq!(notification_config_of(record), json!({"weekly": true}));
        assert_eq!(notification_config_of(json!({"guid": "t1"})), json!({}));
    }

    #[test]
    fn unsubscribe_requires_notification_type() {
        let request = RequestContext::new("t1", false);
        let target = unsubscribe_target(
            &request,
            &params(&[("userId", "u1")]),
            Some(json!([{"notificationType": "push"}, {"notificationType": "weekly"}])),
        )
        .unwrap();
        assert_eq!(target.path, "notifications_config.unsubscribedUsers.u1");
        assert_eq!(target.values.len(), 2);
        assert_eq!(target.guid.as_deref(), Some("t1"));

        let err = unsubscribe_target(&request, &params(&[("userId", "u1")]), Some(json!({"x": 1}))).unwrap_err();
        assert_eq!(err.message(), "missing notificationId");
    }

    #[test]
    fn push_report_path_is_per_cluster() {
        let request = RequestContext::new("t1", false);
        let target = latest_push_report_target(&request, &params(&[("clusterName", "prod")]), None).unwrap();
        assert_eq!(target.path, "notifications_config.latestPushReports.prod");
        assert!(target.values.is_empty());
        assert!(latest_push_report_target(&request, &params(&[]), None).is_err());
    }
}
