use async_trait::async_trait;
use serde_json::Value;

use crate::consts::{ATTACK_CHAINS_COLLECTION, ATTACK_CHAINS_PATH};
use crate::document::DocumentKind;
use crate::error::ApiError;
use crate::routes::RouteOptions;
use crate::validator::{string_field, ValidationContext, Validator};

const ATTACK_CHAIN_ID_FIELD: &str = "attackChainID";

pub fn options() -> RouteOptions {
    RouteOptions::new(ATTACK_CHAINS_PATH, ATTACK_CHAINS_COLLECTION, DocumentKind::AttackChain)
        .with_names_list(false)
        .with_post_unique_name(false)
        .with_post_mandatory_name(true)
        .with_post_validator(AttackChainId)
        .with_v2_list(true)
}

pub struct AttackChainId;

#[async_trait]
impl Validator for AttackChainId {
    fn name(&self) -> &'static str {
        "attack_chain_id"
    }

    async fn validate(&self, _ctx: &ValidationContext<'_>, docs: Vec<Value>) -> Result<Vec<Value>, ApiError> {
        if docs.iter().any(|doc| string_field(doc, ATTACK_CHAIN_ID_FIELD).is_empty()) {
            return Err(ApiError::bad_request("Attack Chain must contain AttackChainID"));
        }
        Ok(docs)
    }
}
