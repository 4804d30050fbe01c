use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::{Operation, ValidationContext, Validator};
use crate::consts::EXPIRY_TIME_FIELD;
use crate::document::format_time;
use crate::error::ApiError;

/// Bounds `expiryTime` of cached documents. A new document without an
/// expiry gets `now + default`; no expiry may lie beyond `now + max`.
pub struct CacheTtl {
    default: Duration,
    max: Duration,
}

impl CacheTtl {
    /// A zero `max` means the default is also the maximum.
    pub fn new(default: Duration, max: Duration) -> Self {
        let max = if max <= Duration::zero() { default } else { max };
        Self { default, max }
    }

    pub fn days(days: i64) -> Self {
        Self::new(Duration::days(days), Duration::zero())
    }

    fn clamp(&self, doc: &mut Value, operation: Operation, now: DateTime<Utc>) {
        let Some(object) = doc.as_object_mut() else {
            return;
        };
        let requested = object
            .get(EXPIRY_TIME_FIELD)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc));
        let latest = now + self.max;
        let expiry = match (requested, operation) {
            (Some(t), _) if t <= latest => return,
            (Some(_), _) => latest,
            (None, Operation::Create) => now + self.default,
            // an update without an expiry keeps the stored one
            (None, Operation::Update) => return,
        };
        object.insert(EXPIRY_TIME_FIELD.to_string(), Value::String(format_time(expiry)));
    }
}

#[async_trait]
impl Validator for CacheTtl {
    fn name(&self) -> &'static str {
        "cache_ttl"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        let now = Utc::now();
        for doc in docs.iter_mut() {
            self.clamp(doc, ctx.operation, now);
        }
        Ok(docs)
    }
}
