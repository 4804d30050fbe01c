use async_trait::async_trait;
use serde_json::Value;

use super::{ValidationContext, Validator};
use crate::consts::GUID_FIELD;
use crate::document::guid_of;
use crate::error::ApiError;

/// Every document must carry a guid. A guid in the route applies to the
/// single document in the body.
pub struct GuidExistence;

#[async_trait]
impl Validator for GuidExistence {
    fn name(&self) -> &'static str {
        "guid_existence"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, mut docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        let path_guid = ctx.path_guid.filter(|g| !g.is_empty());
        if path_guid.is_some() && docs.len() != 1 {
            return Err(ApiError::bad_request("GUID in path is not allowed in bulk request"));
        }
        for doc in docs.iter_mut() {
            if let (Some(guid), Some(object)) = (path_guid, doc.as_object_mut()) {
                object.insert(GUID_FIELD.to_string(), Value::String(guid.to_string()));
            }
            if guid_of(doc).is_none() {
                return Err(ApiError::bad_request("missing guid"));
            }
        }
        Ok(docs)
    }
}
