//! Per-collection document behaviour: which fields an update may not touch,
//! how a guid is assigned and what an insert initialises.

use chrono::{DateTime, Timelike, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::consts::{
    ATTRIBUTES_FIELD, CREATION_TIME_FIELD, CUSTOMERS_FIELD, GUID_FIELD, ID_FIELD, NAME_FIELD, UPDATED_TIME_FIELD,
};
use crate::filter::scalar::format_date;

const COMMON_READ_ONLY: &[&str] = &[NAME_FIELD, ID_FIELD, GUID_FIELD];
const COMMON_READ_ONLY_V1: &[&str] = &[CREATION_TIME_FIELD, NAME_FIELD, ID_FIELD, GUID_FIELD];
const ALLOW_RENAME_READ_ONLY: &[&str] = &[CREATION_TIME_FIELD, ID_FIELD, GUID_FIELD];
const CLUSTER_READ_ONLY: &[&str] = &["subscription_date", NAME_FIELD, ID_FIELD, GUID_FIELD];
const REPOSITORY_READ_ONLY: &[&str] = &["creationDate", NAME_FIELD, ID_FIELD, GUID_FIELD];
const CRON_JOB_READ_ONLY: &[&str] = &[
    CREATION_TIME_FIELD,
    "clusterName",
    "registryName",
    NAME_FIELD,
    ID_FIELD,
    GUID_FIELD,
];
const ATTACK_CHAIN_READ_ONLY: &[&str] = &[
    CREATION_TIME_FIELD,
    "customerGUID",
    "clusterName",
    NAME_FIELD,
    ID_FIELD,
    GUID_FIELD,
];
const RUNTIME_INCIDENT_READ_ONLY: &[&str] = &[
    "creationTimestamp",
    "creationDayDate",
    CREATION_TIME_FIELD,
    NAME_FIELD,
    ID_FIELD,
    GUID_FIELD,
];

pub const RELATED_ALERTS_FIELD: &str = "relatedAlerts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Exception policies, workflows, integration references and the like.
    Standard,
    /// Policies whose name may change on update.
    Renamable,
    Framework,
    Cluster,
    Customer,
    CustomerConfig,
    Repository,
    RegistryCronJob,
    AttackChain,
    RuntimeIncident,
    RuntimeAlert,
    Cache,
}

impl DocumentKind {
    /// Fields dropped from an update command built from `update`.
    pub fn read_only_fields(&self, update: &Value) -> Vec<String> {
        let fields: &[&str] = match self {
            DocumentKind::Standard | DocumentKind::CustomerConfig | DocumentKind::Cache => COMMON_READ_ONLY_V1,
            DocumentKind::Renamable => ALLOW_RENAME_READ_ONLY,
            DocumentKind::Framework | DocumentKind::Customer => COMMON_READ_ONLY,
            DocumentKind::Cluster => CLUSTER_READ_ONLY,
            DocumentKind::Repository => REPOSITORY_READ_ONLY,
            DocumentKind::RegistryCronJob => CRON_JOB_READ_ONLY,
            DocumentKind::AttackChain => ATTACK_CHAIN_READ_ONLY,
            DocumentKind::RuntimeIncident | DocumentKind::RuntimeAlert => RUNTIME_INCIDENT_READ_ONLY,
        };
        let mut fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        // an incident update without alerts must not wipe the stored ones
        if *self == DocumentKind::RuntimeIncident {
            let has_alerts = update
                .get(RELATED_ALERTS_FIELD)
                .and_then(Value::as_array)
                .map(|a| !a.is_empty())
                .unwrap_or(false);
            if !has_alerts {
                fields.push(RELATED_ALERTS_FIELD.to_string());
            }
        }
        fields
    }

    /// Whether a guid sent by the client survives the insert.
    pub fn keeps_client_guid(&self) -> bool {
        matches!(
            self,
            DocumentKind::Cache | DocumentKind::Customer | DocumentKind::RuntimeIncident | DocumentKind::RuntimeAlert
        )
    }

    /// Field holding the creation date of this kind.
    pub fn creation_field(&self) -> &'static str {
        match self {
            DocumentKind::Cluster | DocumentKind::Customer => "subscription_date",
            DocumentKind::Repository | DocumentKind::RegistryCronJob => "creationDate",
            DocumentKind::RuntimeIncident => "creationTimestamp",
            DocumentKind::RuntimeAlert => "timestamp",
            _ => CREATION_TIME_FIELD,
        }
    }

    fn init_new(&self, doc: &mut Map<String, Value>, now: DateTime<Utc>) {
        match self {
            DocumentKind::RuntimeIncident => {
                doc.insert("creationTimestamp".to_string(), Value::String(format_time(now)));
                doc.insert("creationDayDate".to_string(), Value::String(day_date(now)));
            }
            DocumentKind::RuntimeAlert => {
                doc.insert("timestamp".to_string(), Value::String(format_time(now)));
            }
            _ => {
                doc.insert(self.creation_field().to_string(), Value::String(format_time(now)));
            }
        }
        match self {
            DocumentKind::Cluster | DocumentKind::Repository | DocumentKind::RegistryCronJob => {
                let has_attributes = doc.get(ATTRIBUTES_FIELD).map(Value::is_object).unwrap_or(false);
                if !has_attributes {
                    doc.insert(ATTRIBUTES_FIELD.to_string(), Value::Object(Map::new()));
                }
            }
            DocumentKind::CustomerConfig => {
                let cluster = doc
                    .get("scope")
                    .and_then(|s| s.get(ATTRIBUTES_FIELD))
                    .and_then(|a| a.get("cluster"))
                    .and_then(Value::as_str)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string);
                if let Some(cluster) = cluster {
                    doc.insert(NAME_FIELD.to_string(), Value::String(cluster));
                }
            }
            _ => {}
        }
    }
}

/// Turns a client payload into a stored document: initialises creation
/// fields, assigns the guid (also stored as `_id`), stamps `updatedTime` and
/// sets the owner list. A non-object payload is returned untouched.
pub fn new_document(kind: DocumentKind, content: Value, tenant: &str) -> Value {
    let Value::Object(mut doc) = content else {
        return content;
    };
    let now = Utc::now();
    kind.init_new(&mut doc, now);

    let client_guid = doc
        .get(GUID_FIELD)
        .and_then(Value::as_str)
        .filter(|g| !g.is_empty())
        .map(str::to_string);
    let guid = match client_guid {
        Some(guid) if kind.keeps_client_guid() => guid,
        _ => Uuid::new_v4().to_string(),
    };
    doc.insert(GUID_FIELD.to_string(), Value::String(guid.clone()));
    doc.insert(ID_FIELD.to_string(), Value::String(guid));
    doc.insert(UPDATED_TIME_FIELD.to_string(), Value::String(format_time(now)));

    let owners = if tenant.is_empty() {
        Vec::new()
    } else {
        vec![Value::String(tenant.to_string())]
    };
    doc.insert(CUSTOMERS_FIELD.to_string(), Value::Array(owners));
    Value::Object(doc)
}

/// Removes store-internal fields before a document leaves the service.
pub fn strip_internal(mut doc: Value) -> Value {
    if let Value::Object(map) = &mut doc {
        map.remove(ID_FIELD);
        map.remove(CUSTOMERS_FIELD);
    }
    doc
}

pub fn guid_of(doc: &Value) -> Option<&str> {
    doc.get(GUID_FIELD).and_then(Value::as_str).filter(|g| !g.is_empty())
}

pub fn name_of(doc: &Value) -> Option<&str> {
    doc.get(NAME_FIELD).and_then(Value::as_str)
}

/// Stored form of service-assigned timestamps.
pub fn format_time(time: DateTime<Utc>) -> String {
    format_date(&time)
}

pub fn now() -> String {
    format_time(Utc::now())
}

/// Midnight UTC of the given instant.
pub fn day_date(time: DateTime<Utc>) -> String {
    let midnight = time
        .with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time);
    format_time(midnight)
}
