use async_trait::async_trait;
use serde_json::Value;

use crate::consts::{CLOUD_CREDENTIALS_COLLECTION, CLOUD_CREDENTIALS_PATH, NAME_FIELD};
use crate::document::DocumentKind;
use crate::error::ApiError;
use crate::routes::RouteOptions;
use crate::schema::SchemaInfo;
use crate::validator::{string_field, ValidationContext, Validator};

const REQUIRED_STRINGS: &[&str] = &["provider", "accountID", NAME_FIELD];
const ENABLED_FIELD: &str = "enabled";

pub fn options() -> RouteOptions {
    RouteOptions::new(CLOUD_CREDENTIALS_PATH, CLOUD_CREDENTIALS_COLLECTION, DocumentKind::Standard)
        .with_schema(SchemaInfo::new().with_array_paths(&["credentials.regions", "credentials.services"]))
        .with_post_unique_name(true)
        .with_put_guid(true)
        .with_post_validator(CloudAccountFields)
}

/// Rejects accounts without a provider, account id, name or an explicit
/// `enabled` flag.
pub struct CloudAccountFields;

#[async_trait]
impl Validator for CloudAccountFields {
    fn name(&self) -> &'static str {
        "cloud_account_fields"
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        for doc in &docs {
            if let Some(field) = REQUIRED_STRINGS.iter().find(|field| string_field(doc, field).is_empty()) {
                return Err(ApiError::bad_request(format!("missing {}", field)));
            }
            if !doc.get(ENABLED_FIELD).is_some_and(Value::is_boolean) {
                return Err(ApiError::bad_request(format!("missing {}", ENABLED_FIELD)));
            }
        }
        Ok(docs)
    }
}
