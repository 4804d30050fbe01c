//! Sub-resources addressing an array or a map deep inside one document.

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{delete, put, MethodRouter},
    Extension,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::utils::json_body;
use crate::consts::GUID_FIELD;
use crate::context::{CollectionContext, RequestContext};
use crate::error::ApiError;
use crate::filter::update::{set_field_command, unset_field_command};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// PUT adds values with set semantics, DELETE pulls them.
    Array,
    /// PUT sets the key to the first value, DELETE unsets it.
    Map,
}

/// What a container request addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerTarget {
    /// Dotted path of the array or map key.
    pub path: String,
    pub values: Vec<Value>,
    /// Document id when it does not come from a `:guid` route segment.
    pub guid: Option<String>,
}

/// Derives the target from the route parameters and the optional body.
pub type ContainerExtractor =
    fn(&RequestContext, &HashMap<String, String>, Option<Value>) -> Result<ContainerTarget, ApiError>;

#[derive(Clone)]
pub struct ContainerHandler {
    /// Suffix of the collection path, e.g. `/unsubscribe/:userId`.
    pub path: String,
    pub kind: ContainerKind,
    pub extractor: ContainerExtractor,
    pub serve_put: bool,
    pub serve_delete: bool,
}

impl ContainerHandler {
    pub fn new(path: impl Into<String>, kind: ContainerKind, extractor: ContainerExtractor) -> Self {
        Self {
            path: path.into(),
            kind,
            extractor,
            serve_put: true,
            serve_delete: true,
        }
    }

    pub fn put_only(mut self) -> Self {
        self.serve_delete = false;
        self
    }

    pub fn delete_only(mut self) -> Self {
        self.serve_put = false;
        self
    }

    /// Routes of the enabled verbs, `None` when neither is enabled.
    pub(crate) fn method_router(&self) -> Option<MethodRouter<AppState>> {
        let handler = Arc::new(self.clone());
        let mut router: Option<MethodRouter<AppState>> = None;
        if self.serve_put {
            let handler = handler.clone();
            router = Some(put(
                move |state: State<AppState>,
                      request: Extension<RequestContext>,
                      collection: Extension<Arc<CollectionContext>>,
                      params: Option<Path<HashMap<String, String>>>,
                      body: Bytes| async move {
                    modify(handler, true, state, request, collection, params, body).await
                },
            ));
        }
        if self.serve_delete {
            let handler = handler.clone();
            let remove = delete(
                move |state: State<AppState>,
                      request: Extension<RequestContext>,
                      collection: Extension<Arc<CollectionContext>>,
                      params: Option<Path<HashMap<String, String>>>,
                      body: Bytes| async move {
                    modify(handler, false, state, request, collection, params, body).await
                },
            );
            router = Some(match router {
                Some(router) => router.merge(remove),
                None => remove,
            });
        }
        router
    }
}

async fn modify(
    handler: Arc<ContainerHandler>,
    adding: bool,
    State(state): State<AppState>,
    Extension(request): Extension<RequestContext>,
    Extension(collection): Extension<Arc<CollectionContext>>,
    params: Option<Path<HashMap<String, String>>>,
    body: Bytes,
) -> ApiResult<Value> {
    let params = params.map(|Path(params)| params).unwrap_or_default();
    let body = json_body(&body)?;
    let target = (handler.extractor)(&request, &params, body)?;
    let guid = target
        .guid
        .clone()
        .or_else(|| params.get(GUID_FIELD).cloned())
        .filter(|guid| !guid.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing guid"))?;
    let scope = collection.scope(&request);

    let response = match (handler.kind, adding) {
        (ContainerKind::Array, true) => {
            let added = state.access.add_to_array(&scope, &guid, &target.path, target.values).await?;
            json!({ "added": added })
        }
        (ContainerKind::Array, false) => {
            let removed = state
                .access
                .pull_from_array(&scope, &guid, &target.path, target.values)
                .await?;
            json!({ "removed": removed })
        }
        (ContainerKind::Map, true) => {
            let value = target
                .values
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::bad_request("missing value"))?;
            let modified = state
                .access
                .update_one(&scope, &guid, &set_field_command(&target.path, value))
                .await?;
            json!({ "modified": modified })
        }
        (ContainerKind::Map, false) => {
            let modified = state
                .access
                .update_one(&scope, &guid, &unset_field_command(&target.path))
                .await?;
            json!({ "modified": modified })
        }
    };
    tracing::debug!(collection = %collection.collection, path = %target.path, guid = %guid, "container update");
    Ok(ApiResponse::success(response))
}
