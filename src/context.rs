//! Request-scoped values shared between middleware and handlers.

use serde_json::Value;

use crate::database::Scope;
use crate::document::{strip_internal, DocumentKind};
use crate::error::ApiError;
use crate::query::QueryParamsConfig;
use crate::schema::SchemaInfo;
use crate::validator::ValidatorChain;

/// Caller identity resolved by the tenant middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant: String,
    pub admin: bool,
}

impl RequestContext {
    pub fn new(tenant: impl Into<String>, admin: bool) -> Self {
        Self {
            tenant: tenant.into(),
            admin,
        }
    }

    pub fn scope(&self, collection: &str) -> Scope {
        Scope::new(self.tenant.clone(), collection)
    }
}

/// Turns a request body into the documents a write operates on.
pub type BodyDecoder = fn(&RequestContext, Value) -> Result<Vec<Value>, ApiError>;

/// Shapes one stored document for the response, after internal fields are
/// removed.
pub type ResponseSender = fn(Value) -> Value;

/// Everything a generated handler knows about the collection it serves.
/// Attached to each route group as an extension.
pub struct CollectionContext {
    pub path: String,
    pub collection: String,
    pub schema: SchemaInfo,
    pub kind: DocumentKind,
    /// Update whitelist; empty means every writable field.
    pub put_fields: Vec<String>,
    pub body_decoder: Option<BodyDecoder>,
    pub response_sender: Option<ResponseSender>,
    pub name_query_param: Option<String>,
    pub query_config: Option<QueryParamsConfig>,
    pub include_globals: bool,
    pub serve_names_list: bool,
    pub post_validators: ValidatorChain,
    pub put_validators: ValidatorChain,
}

impl CollectionContext {
    pub fn scope(&self, request: &RequestContext) -> Scope {
        request.scope(&self.collection)
    }

    /// Outgoing representation of a stored document.
    pub fn send(&self, doc: Value) -> Value {
        let doc = strip_internal(doc);
        match self.response_sender {
            Some(sender) => sender(doc),
            None => doc,
        }
    }

    pub fn send_all(&self, docs: Vec<Value>) -> Vec<Value> {
        docs.into_iter().map(|doc| self.send(doc)).collect()
    }
}
