//! Runtime incidents and the alerts nested inside them. Both paths share the
//! incidents collection.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::consts::{RUNTIME_ALERT_PATH, RUNTIME_INCIDENT_COLLECTION, RUNTIME_INCIDENT_PATH};
use crate::document::{day_date, DocumentKind, RELATED_ALERTS_FIELD};
use crate::error::ApiError;
use crate::routes::RouteOptions;
use crate::schema::{FieldType, SchemaInfo};
use crate::validator::{ValidationContext, Validator};

const RESOLVE_DAY_DATE_FIELD: &str = "resolveDayDate";

pub fn incidents() -> RouteOptions {
    let schema = SchemaInfo::new()
        .with_array_paths(&[RELATED_ALERTS_FIELD, "relatedResources"])
        .with_field_type("creationTimestamp", FieldType::Date)
        .with_field_type("seenAt", FieldType::Date)
        .with_field_type("timestamp", FieldType::Date)
        .with_field_type("relatedAlerts.timestamp", FieldType::Date)
        .with_field_type("creationDayDate", FieldType::Date)
        .with_field_type(RESOLVE_DAY_DATE_FIELD, FieldType::Date)
        .with_timestamp_field("creationTimestamp")
        .with_must_exclude_fields(&[RELATED_ALERTS_FIELD, "creationDayDate", RESOLVE_DAY_DATE_FIELD]);
    RouteOptions::new(RUNTIME_INCIDENT_PATH, RUNTIME_INCIDENT_COLLECTION, DocumentKind::RuntimeIncident)
        .with_schema(schema)
        .with_names_list(false)
        .with_post_unique_name(false)
        .with_put_validator(ResolveDayDate)
        .with_v2_list(true)
}

pub fn alerts() -> RouteOptions {
    let schema = SchemaInfo::new()
        .with_nested_doc_path(RELATED_ALERTS_FIELD)
        .with_timestamp_field("timestamp")
        .with_array_paths(&[RELATED_ALERTS_FIELD, "relatedResources"])
        .with_field_type("creationTimestamp", FieldType::Date)
        .with_field_type("seenAt", FieldType::Date)
        .with_field_type("timestamp", FieldType::Date)
        .with_field_type("relatedAlerts.timestamp", FieldType::Date);
    RouteOptions::new(RUNTIME_ALERT_PATH, RUNTIME_INCIDENT_COLLECTION, DocumentKind::RuntimeAlert)
        .with_schema(schema)
        .with_v2_list(true)
}

/// Stamps the resolution day the first time an incident is dismissed.
pub struct ResolveDayDate;

fn is_resolved(doc: &Value) -> bool {
    ["isDismissed", "resolved"]
        .iter()
        .any(|field| doc.get(*field).and_then(Value::as_bool).unwrap_or(false))
}

#[async_trait]
impl Validator for ResolveDayDate {
    fn name(&self) -> &'static str {
        "resolve_day_date"
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        let today = day_date(Utc::now());
        for doc in docs.iter_mut() {
            let unset = doc.get(RESOLVE_DAY_DATE_FIELD).map(Value::is_null).unwrap_or(true);
            if !(is_resolved(doc) && unset) {
                continue;
            }
            if let Some(object) = doc.as_object_mut() {
                object.insert(RESOLVE_DAY_DATE_FIELD.to_string(), Value::String(today.clone()));
            }
        }
        Ok(docs)
    }
}
