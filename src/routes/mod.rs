//! Route factory: turns a declarative `RouteOptions` into the CRUD, search
//! and container routes of one collection path.

pub mod containers;
pub mod delete;
pub mod get;
pub mod post;
pub mod put;
pub mod search;
pub mod utils;

pub use containers::{ContainerExtractor, ContainerHandler, ContainerKind, ContainerTarget};

use axum::{
    routing::{delete as delete_route, get as get_route, post as post_route, put as put_route, MethodRouter},
    Extension, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::consts::POLICY_NAME_PARAM;
use crate::context::{BodyDecoder, CollectionContext, ResponseSender};
use crate::document::DocumentKind;
use crate::query::QueryParamsConfig;
use crate::schema::{ApiInfo, ApiRegistry, SchemaInfo};
use crate::state::AppState;
use crate::validator::{
    GuidExistence, MandatoryName, ShortNamePost, ShortNamePut, UniqueValues, Validator, ValidatorChain,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("collection and path must be set")]
    MissingPath,

    #[error("includeGlobals requires serveGet")]
    GlobalsWithoutGet,

    #[error("deleteByName requires serveDelete")]
    DeleteByNameWithoutDelete,

    #[error("uniqueShortName requires post and put")]
    ShortNameWithoutWrites,

    #[error("getWithGUIDOnly requires serveGet")]
    GuidOnlyWithoutGet,

    #[error("container {0} needs a path and at least one verb")]
    InvalidContainer(String),
}

/// Declarative description of the routes served for one collection path.
pub struct RouteOptions {
    path: String,
    collection: String,
    kind: DocumentKind,
    schema: SchemaInfo,

    serve_get: bool,
    serve_names_list: bool,
    get_with_guid_only: bool,
    include_globals: bool,
    serve_post: bool,
    serve_put: bool,
    serve_delete: bool,
    serve_bulk_delete: bool,
    serve_delete_by_query: bool,
    delete_by_name: bool,
    serve_v2_list: bool,

    validate_post_unique_name: bool,
    validate_post_mandatory_name: bool,
    validate_put_unique_name: bool,
    validate_put_guid: bool,
    unique_short_name: Option<&'static str>,

    name_query_param: Option<String>,
    query_config: Option<QueryParamsConfig>,
    put_fields: Vec<String>,
    post_validators: Vec<Arc<dyn Validator>>,
    put_validators: Vec<Arc<dyn Validator>>,
    body_decoder: Option<BodyDecoder>,
    response_sender: Option<ResponseSender>,
    containers: Vec<ContainerHandler>,
    custom_routes: Vec<(String, MethodRouter<AppState>)>,
}

impl RouteOptions {
    pub fn new(path: impl Into<String>, collection: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            kind,
            schema: SchemaInfo::new(),
            serve_get: true,
            serve_names_list: true,
            get_with_guid_only: false,
            include_globals: false,
            serve_post: true,
            serve_put: true,
            serve_delete: true,
            serve_bulk_delete: true,
            serve_delete_by_query: true,
            delete_by_name: false,
            serve_v2_list: false,
            validate_post_unique_name: true,
            validate_post_mandatory_name: false,
            validate_put_unique_name: false,
            validate_put_guid: true,
            unique_short_name: None,
            name_query_param: None,
            query_config: None,
            put_fields: Vec::new(),
            post_validators: Vec::new(),
            put_validators: Vec::new(),
            body_decoder: None,
            response_sender: None,
            containers: Vec::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Shared setup of policy-like collections: lookup and delete by
    /// `policyName`, global documents visible, v2 search. Renaming is
    /// checked for uniqueness when allowed.
    pub fn policy(
        path: impl Into<String>,
        collection: impl Into<String>,
        kind: DocumentKind,
        query_config: Option<QueryParamsConfig>,
        allow_rename: bool,
    ) -> Self {
        let mut options = Self::new(path, collection, kind)
            .with_name_query_param(POLICY_NAME_PARAM)
            .with_include_globals(true)
            .with_delete_by_name(true)
            .with_post_unique_name(true)
            .with_put_guid(true)
            .with_v2_list(true)
            .with_put_unique_name(allow_rename);
        options.query_config = query_config;
        options
    }

    pub fn with_schema(mut self, schema: SchemaInfo) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_get(mut self, serve: bool) -> Self {
        self.serve_get = serve;
        self
    }

    pub fn with_names_list(mut self, serve: bool) -> Self {
        self.serve_names_list = serve;
        self
    }

    /// Only `GET P/:guid`, no listing.
    pub fn with_get_by_guid_only(mut self, only: bool) -> Self {
        self.get_with_guid_only = only;
        self
    }

    pub fn with_include_globals(mut self, include: bool) -> Self {
        self.include_globals = include;
        self
    }

    pub fn with_post(mut self, serve: bool) -> Self {
        self.serve_post = serve;
        self
    }

    pub fn with_put(mut self, serve: bool) -> Self {
        self.serve_put = serve;
        self
    }

    pub fn with_delete(mut self, serve: bool) -> Self {
        self.serve_delete = serve;
        self
    }

    pub fn with_bulk_delete(mut self, serve: bool) -> Self {
        self.serve_bulk_delete = serve;
        self
    }

    pub fn with_delete_by_query(mut self, serve: bool) -> Self {
        self.serve_delete_by_query = serve;
        self
    }

    pub fn with_delete_by_name(mut self, serve: bool) -> Self {
        self.delete_by_name = serve;
        self
    }

    /// `POST P/query` and `POST P/uniqueValues`.
    pub fn with_v2_list(mut self, serve: bool) -> Self {
        self.serve_v2_list = serve;
        self
    }

    pub fn with_post_unique_name(mut self, validate: bool) -> Self {
        self.validate_post_unique_name = validate;
        self
    }

    pub fn with_post_mandatory_name(mut self, validate: bool) -> Self {
        self.validate_post_mandatory_name = validate;
        self
    }

    pub fn with_put_unique_name(mut self, validate: bool) -> Self {
        self.validate_put_unique_name = validate;
        self
    }

    pub fn with_put_guid(mut self, validate: bool) -> Self {
        self.validate_put_guid = validate;
        self
    }

    /// Derive `attributes.alias` from `source_field` on insert and keep it
    /// on update.
    pub fn with_unique_short_name(mut self, source_field: &'static str) -> Self {
        self.unique_short_name = Some(source_field);
        self
    }

    pub fn with_name_query_param(mut self, param: impl Into<String>) -> Self {
        self.name_query_param = Some(param.into());
        self
    }

    pub fn with_query_config(mut self, config: QueryParamsConfig) -> Self {
        self.query_config = Some(config);
        self
    }

    pub fn with_put_fields(mut self, fields: &[&str]) -> Self {
        self.put_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_post_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.post_validators.push(Arc::new(validator));
        self
    }

    pub fn with_put_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.put_validators.push(Arc::new(validator));
        self
    }

    pub fn with_body_decoder(mut self, decoder: BodyDecoder) -> Self {
        self.body_decoder = Some(decoder);
        self
    }

    pub fn with_response_sender(mut self, sender: ResponseSender) -> Self {
        self.response_sender = Some(sender);
        self
    }

    pub fn with_container(mut self, container: ContainerHandler) -> Self {
        self.containers.push(container);
        self
    }

    /// Extra route under the collection path, `""` for the path itself.
    /// It sees the same collection context as the generated routes.
    pub fn with_route(mut self, suffix: impl Into<String>, route: MethodRouter<AppState>) -> Self {
        self.custom_routes.push((suffix.into(), route));
        self
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if self.collection.is_empty() || self.path.is_empty() {
            return Err(RouteError::MissingPath);
        }
        if self.include_globals && !self.serve_get {
            return Err(RouteError::GlobalsWithoutGet);
        }
        if self.delete_by_name && !self.serve_delete {
            return Err(RouteError::DeleteByNameWithoutDelete);
        }
        if self.unique_short_name.is_some() && (!self.serve_post || !self.serve_put) {
            return Err(RouteError::ShortNameWithoutWrites);
        }
        if self.get_with_guid_only && !self.serve_get {
            return Err(RouteError::GuidOnlyWithoutGet);
        }
        for container in &self.containers {
            if container.path.is_empty() || (!container.serve_put && !container.serve_delete) {
                return Err(RouteError::InvalidContainer(container.path.clone()));
            }
        }
        Ok(())
    }

    fn post_chain(&mut self) -> ValidatorChain {
        let mut chain = ValidatorChain::new();
        if self.validate_post_unique_name {
            chain.push(Arc::new(UniqueValues::name()));
        }
        if self.validate_post_mandatory_name {
            chain.push(Arc::new(MandatoryName));
        }
        if let Some(source) = self.unique_short_name {
            chain.push(Arc::new(ShortNamePost::new(source)));
        }
        chain.extend(self.post_validators.drain(..));
        chain
    }

    fn put_chain(&mut self) -> ValidatorChain {
        let mut chain = ValidatorChain::new();
        if self.validate_put_guid {
            chain.push(Arc::new(GuidExistence));
        }
        if self.unique_short_name.is_some() {
            chain.push(Arc::new(ShortNamePut));
        }
        if self.validate_put_unique_name {
            chain.push(Arc::new(UniqueValues::name()));
        }
        chain.extend(self.put_validators.drain(..));
        chain
    }

    /// Validates the options, records the path in `registry` and returns
    /// the routes. Requests reaching them must already carry a
    /// `RequestContext`.
    pub fn build(mut self, registry: &mut ApiRegistry) -> Result<Router<AppState>, RouteError> {
        self.validate()?;
        registry.register(ApiInfo {
            base_path: self.path.clone(),
            db_collection: self.collection.clone(),
            schema: self.schema.clone(),
        });

        let post_validators = self.post_chain();
        let put_validators = self.put_chain();
        let context = Arc::new(CollectionContext {
            path: self.path.clone(),
            collection: self.collection.clone(),
            schema: self.schema.clone(),
            kind: self.kind,
            put_fields: std::mem::take(&mut self.put_fields),
            body_decoder: self.body_decoder,
            response_sender: self.response_sender,
            name_query_param: self.name_query_param.clone(),
            query_config: self.query_config.clone(),
            include_globals: self.include_globals,
            serve_names_list: self.serve_names_list,
            post_validators,
            put_validators,
        });

        let mut routes = RouteTable::default();
        let base = self.path.clone();
        let at = |suffix: &str| format!("{}{}", base, suffix);

        if self.serve_get {
            if !self.get_with_guid_only {
                routes.add(at(""), get_route(get::list));
            }
            routes.add(at("/:guid"), get_route(get::get_by_guid));
        }
        if self.serve_post {
            routes.add(at(""), post_route(post::create));
        }
        if self.serve_put {
            routes.add(at(""), put_route(put::update));
            routes.add(at("/:guid"), put_route(put::update_by_guid));
        }
        if self.serve_delete {
            if self.delete_by_name {
                routes.add(at(""), delete_route(delete::delete_by_name));
            }
            if self.serve_bulk_delete {
                routes.add(at("/bulk"), delete_route(delete::bulk_delete));
            }
            if self.serve_delete_by_query {
                routes.add(at("/query"), delete_route(search::delete_by_query));
            }
            routes.add(at("/:guid"), delete_route(delete::delete_by_guid));
        }
        if self.serve_v2_list {
            routes.add(at("/query"), post_route(search::query));
            routes.add(at("/uniqueValues"), post_route(search::unique_values));
        }
        if self.schema.nested_doc_path().is_some() {
            routes.add(at("/:guid/query"), post_route(search::nested_query));
        }
        for container in &self.containers {
            if let Some(route) = container.method_router() {
                routes.add(at(&container.path), route);
            }
        }
        for (suffix, route) in self.custom_routes.drain(..) {
            routes.add(at(&suffix), route);
        }

        tracing::debug!(path = %self.path, collection = %self.collection, routes = ?routes.paths(), "registered routes");
        Ok(routes.into_router().layer(Extension(context)))
    }
}

/// Method routers keyed by path, merged when a path is added twice.
#[derive(Default)]
struct RouteTable {
    routes: BTreeMap<String, MethodRouter<AppState>>,
}

impl RouteTable {
    fn add(&mut self, path: String, route: MethodRouter<AppState>) {
        let merged = match self.routes.remove(&path) {
            Some(existing) => existing.merge(route),
            None => route,
        };
        self.routes.insert(path, merged);
    }

    fn paths(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    fn into_router(self) -> Router<AppState> {
        self.routes
            .into_iter()
            .fold(Router::new(), |router, (path, route)| router.route(&path, route))
    }
}
