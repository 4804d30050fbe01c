//! Pre-insert and pre-update steps run by the generated POST and PUT
//! handlers. Each step may rewrite the documents or reject the request;
//! the first rejection stops the chain.

mod guid;
mod name;
mod ttl;
mod unique;

pub use guid::GuidExistence;
pub use name::{MandatoryName, ShortNamePost, ShortNamePut};
pub use ttl::CacheTtl;
pub use unique::UniqueValues;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::context::{CollectionContext, RequestContext};
use crate::database::{DataAccess, Scope};
use crate::error::ApiError;

/// Write being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

pub struct ValidationContext<'a> {
    pub access: &'a DataAccess,
    pub request: &'a RequestContext,
    pub collection: &'a CollectionContext,
    pub operation: Operation,
    /// Document id taken from the route, if the route has one.
    pub path_guid: Option<&'a str>,
    pub query: &'a [(String, String)],
}

impl ValidationContext<'_> {
    pub fn scope(&self) -> Scope {
        self.collection.scope(self.request)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn validate(&self, ctx: &ValidationContext<'_>, docs: Vec<Value>) -> Result<Vec<Value>, ApiError>;
}

/// Ordered validators of one verb.
#[derive(Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    pub fn extend(&mut self, validators: impl IntoIterator<Item = Arc<dyn Validator>>) {
        self.validators.extend(validators);
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    pub async fn run(&self, ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        for validator in &self.validators {
            docs = validator.validate(ctx, docs).await.map_err(|err| {
                tracing::debug!(validator = validator.name(), "validation failed: {}", err);
                err
            })?;
        }
        Ok(docs)
    }
}

/// String value at a top-level key, empty when absent.
pub(crate) fn string_field(doc: &Value, key: &str) -> String {
    doc.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::document::DocumentKind;
    use serde_json::json;

    #[tokio::test]
    async fn chain_stops_at_first_rejection() {
        let access = access();
        let request = RequestContext::new("t1", false);
        let coll = collection("clusters", DocumentKind::Cluster);
        let ctx = context(&access, &request, &coll, Operation::Create, None);

        let mut chain = ValidatorChain::new();
        chain.push(Arc::new(MandatoryName));
        chain.push(Arc::new(ShortNamePost::new("name")));
        assert_eq!(chain.names(), vec!["mandatory_name", "short_name_post"]);

        let err = chain.run(&ctx, vec![json!({"guid": "x"})]).await.unwrap_err();
        assert_eq!(err.message(), "missing name");

        let docs = chain.run(&ctx, vec![json!({"name": "prod-eu"})]).await.unwrap();
        assert_eq!(docs[0]["attributes"]["alias"], "PRODE");
    }
}
