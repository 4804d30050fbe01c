use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{string_field, ValidationContext, Validator};
use crate::consts::{ATTRIBUTES_FIELD, NAME_FIELD, SHORT_NAME_ATTRIBUTE};
use crate::database::DbError;
use crate::document::guid_of;
use crate::error::ApiError;
use crate::filter::FilterBuilder;

const SHORT_NAME_LENGTH: usize = 5;
const SHORT_NAME_ATTEMPTS: usize = 1000;

pub struct MandatoryName;

#[async_trait]
impl Validator for MandatoryName {
    fn name(&self) -> &'static str {
        "mandatory_name"
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        if docs.iter().any(|doc| string_field(doc, NAME_FIELD).is_empty()) {
            return Err(ApiError::bad_request("missing name"));
        }
        Ok(docs)
    }
}

/// Fills `attributes.alias` with a short name unique among the tenant's
/// documents, derived from the value of `source_field`.
pub struct ShortNamePost {
    source_field: &'static str,
}

impl ShortNamePost {
    pub fn new(source_field: &'static str) -> Self {
        Self { source_field }
    }
}

#[async_trait]
impl Validator for ShortNamePost {
    fn name(&self) -> &'static str {
        "short_name_post"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        let mut assigned: HashSet<String> = HashSet::new();
        for doc in docs.iter_mut() {
            let base = string_field(doc, self.source_field);
            let Some(object) = doc.as_object_mut() else {
                continue;
            };
            let Some(attributes) = attributes_mut(object) else {
                continue;
            };
            let has_alias = attributes
                .get(SHORT_NAME_ATTRIBUTE)
                .and_then(Value::as_str)
                .map(|alias| !alias.is_empty())
                .unwrap_or(false);
            if has_alias {
                continue;
            }
            let alias = unique_short_name(ctx, &base, &assigned).await?;
            assigned.insert(alias.clone());
            attributes.insert(SHORT_NAME_ATTRIBUTE.to_string(), Value::String(alias));
        }
        Ok(docs)
    }
}

/// Keeps the stored alias when an update rewrites `attributes` without one.
pub struct ShortNamePut;

#[async_trait]
impl Validator for ShortNamePut {
    fn name(&self) -> &'static str {
        "short_name_put"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        for doc in docs.iter_mut() {
            let guid = guid_of(doc).unwrap_or_default().to_string();
            let Some(attributes) = doc.get_mut(ATTRIBUTES_FIELD).and_then(Value::as_object_mut) else {
                continue;
            };
            if attributes.is_empty() || attributes.contains_key(SHORT_NAME_ATTRIBUTE) {
                continue;
            }
            let old = ctx
                .access
                .get_doc_by_guid(&ctx.scope(), &guid)
                .await?
                .ok_or_else(|| ApiError::not_found("document not found"))?;
            if let Some(alias) = old.get(ATTRIBUTES_FIELD).and_then(|a| a.get(SHORT_NAME_ATTRIBUTE)) {
                attributes.insert(SHORT_NAME_ATTRIBUTE.to_string(), alias.clone());
            }
        }
        Ok(docs)
    }
}

fn attributes_mut(object: &mut Map<String, Value>) -> Option<&mut Map<String, Value>> {
    if !object.get(ATTRIBUTES_FIELD).map(Value::is_object).unwrap_or(false) {
        object.insert(ATTRIBUTES_FIELD.to_string(), Value::Object(Map::new()));
    }
    object.get_mut(ATTRIBUTES_FIELD).and_then(Value::as_object_mut)
}

/// Uppercase alphanumeric prefix of `value`.
fn short_name_base(value: &str) -> String {
    let base: String = value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(SHORT_NAME_LENGTH)
        .collect::<String>()
        .to_ascii_uppercase();
    if base.is_empty() {
        "X".to_string()
    } else {
        base
    }
}

/// First free candidate among `BASE`, `BASE1`, `BASE2`, ...
async fn unique_short_name(
    ctx: &ValidationContext<'_>,
    value: &str,
    assigned: &HashSet<String>,
) -> Result<String, DbError> {
    let base = short_name_base(value);
    let scope = ctx.scope();
    let alias_field = format!("{}.{}", ATTRIBUTES_FIELD, SHORT_NAME_ATTRIBUTE);
    for attempt in 0..SHORT_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.clone()
        } else {
            format!("{}{}", base, attempt)
        };
        if assigned.contains(&candidate) {
            continue;
        }
        let taken = ctx
            .access
            .doc_exists(&scope, FilterBuilder::new().with_value(alias_field.as_str(), candidate.as_str()))
            .await?;
        if !taken {
            return Ok(candidate);
        }
    }
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Ok(format!("{}{}", base, &suffix[..6]))
}
