use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;

use super::{string_field, Operation, ValidationContext, Validator};
use crate::consts::{GUID_FIELD, NAME_FIELD};
use crate::document::guid_of;
use crate::error::ApiError;
use crate::filter::{FilterBuilder, FindOptions};

/// Rejects documents whose `key` value already belongs to another document
/// of the tenant, or repeats inside the same request.
pub struct UniqueValues {
    key: String,
    mandatory: bool,
}

impl UniqueValues {
    pub fn new(key: impl Into<String>, mandatory: bool) -> Self {
        Self {
            key: key.into(),
            mandatory,
        }
    }

    /// Mandatory unique `name`.
    pub fn name() -> Self {
        Self::new(NAME_FIELD, true)
    }

    fn collect_values(&self, docs: &[Value]) -> Result<Vec<String>, ApiError> {
        let mut values: Vec<String> = Vec::with_capacity(docs.len());
        for doc in docs {
            let value = string_field(doc, &self.key);
            if self.mandatory && value.is_empty() {
                return Err(ApiError::bad_request(format!("missing {}", self.key)));
            }
            if values.contains(&value) {
                return Err(ApiError::bad_request(format!("duplicate {} {}", self.key, value)));
            }
            values.push(value);
        }
        Ok(values)
    }

    fn create_filter(&self, values: &[String]) -> FilterBuilder {
        match values {
            [single] => FilterBuilder::new().with_value(&self.key, single.as_str()),
            _ => FilterBuilder::new().with_in(
                &self.key,
                values.iter().map(|v| Value::String(v.clone())).collect(),
            ),
        }
    }

    /// Same value on a document other than the one being updated.
    fn update_filter(&self, docs: &[Value]) -> FilterBuilder {
        let mut alternatives: Vec<FilterBuilder> = docs
            .iter()
            .map(|doc| {
                FilterBuilder::new()
                    .with_value(&self.key, string_field(doc, &self.key))
                    .with_not_equal(GUID_FIELD, guid_of(doc).unwrap_or_default())
            })
            .collect();
        if alternatives.len() == 1 {
            return alternatives.remove(0);
        }
        FilterBuilder::new().add_or(alternatives)
    }
}

#[async_trait]
impl Validator for UniqueValues {
    fn name(&self) -> &'static str {
        "unique_values"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        if docs.is_empty() {
            return Ok(docs);
        }
        let values = self.collect_values(&docs)?;
        let filter = match ctx.operation {
            Operation::Create => self.create_filter(&values),
            Operation::Update => self.update_filter(&docs),
        };

        let mut opts = FindOptions::new();
        opts.set_filter(filter);
        opts.projection_mut().include(&[self.key.as_str()]);
        let existing = ctx.access.find_for_customer(&ctx.scope(), opts, false).await?;
        if existing.is_empty() {
            return Ok(docs);
        }

        let taken: BTreeSet<String> = existing
            .iter()
            .map(|doc| string_field(doc, &self.key))
            .filter(|value| values.contains(value))
            .collect();
        let taken: Vec<String> = taken.into_iter().collect();
        Err(ApiError::bad_request(format!(
            "{} {} already exists",
            self.key,
            taken.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::context::RequestContext;
    use crate::document::DocumentKind;
    use serde_json::json;

    #[tokio::test]
    async fn batch_and_stored_duplicates_are_rejected() {
        let access = access();
        let request = RequestContext::new("t1", false);
        let coll = collection("clusters", DocumentKind::Cluster);
        let scope = request.scope("clusters");
        access
            .insert_document(&scope, DocumentKind::Cluster, json!({"name": "a"}))
            .await
            .unwrap();

        let ctx = context(&access, &request, &coll, Operation::Create, None);
        let unique = UniqueValues::name();
        let err = unique
            .validate(&ctx, vec![json!({"name": "b"}), json!({"name": "b"})])
            .await
            .unwrap_err();
        assert_eq!(err.message(), "duplicate name b");

        let err = unique
            .validate(&ctx, vec![json!({"name": "a"}), json!({"name": "c"})])
            .await
            .unwrap_err();
        assert_eq!(err.message(), "name a already exists");

        let docs = unique.validate(&ctx, vec![json!({"name": "c"})]).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn other_tenants_do_not_collide() {
        let access = access();
        let owner = RequestContext::new("t2", false);
        access
            .insert_document(&owner.scope("clusters"), DocumentKind::Cluster, json!({"name": "a"}))
            .await
            .unwrap();

        let request = RequestContext::new("t1", false);
        let coll = collection("clusters", DocumentKind::Cluster);
        let ctx = context(&access, &request, &coll, Operation::Create, None);
        assert!(UniqueValues::name().validate(&ctx, vec![json!({"name": "a"})]).await.is_ok());
    }

    #[tokio::test]
    async fn update_ignores_the_document_itself() {
        let access = access();
        let request = RequestContext::new("t1", false);
        let scope = request.scope("workflows");
        let own = access
            .insert_document(&scope, DocumentKind::Renamable, json!({"name": "a"}))
            .await
            .unwrap();
        let other = access
            .insert_document(&scope, DocumentKind::Renamable, json!({"name": "b"}))
            .await
            .unwrap();

        let coll = collection("workflows", DocumentKind::Renamable);
        let ctx = context(&access, &request, &coll, Operation::Update, None);
        let unique = UniqueValues::name();
        let same = json!({"guid": own["guid"], "name": "a"});
        assert!(unique.validate(&ctx, vec![same]).await.is_ok());

        let rename = json!({"guid": other["guid"], "name": "a"});
        let err = unique.validate(&ctx, vec![rename]).await.unwrap_err();
        assert_eq!(err.message(), "name a already exists");
    }
}
