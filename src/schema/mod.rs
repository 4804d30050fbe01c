use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::consts::CREATION_TIME_FIELD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Date,
    String,
}

/// Result of resolving a field path against the schema's array paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArrayDetails {
    pub is_array: bool,
    pub array_path: String,
    pub sub_path: String,
}

/// Per-collection metadata consulted by the query translator and read paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields_type: BTreeMap<String, FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_exclude_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_doc_path: Option<String>,
}

impl SchemaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_array_paths(mut self, paths: &[&str]) -> Self {
        self.array_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_field_type(mut self, field: &str, field_type: FieldType) -> Self {
        self.fields_type.insert(field.to_string(), field_type);
        self
    }

    pub fn with_timestamp_field(mut self, field: &str) -> Self {
        self.timestamp_field_name = Some(field.to_string());
        self
    }

    pub fn with_must_exclude_fields(mut self, fields: &[&str]) -> Self {
        self.must_exclude_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_nested_doc_path(mut self, path: &str) -> Self {
        self.nested_doc_path = Some(path.to_string());
        self
    }

    /// Finds the registered array containing `path`, matching on whole segments.
    pub fn array_details(&self, path: &str) -> ArrayDetails {
        for array_path in &self.array_paths {
            if path == array_path {
                return ArrayDetails {
                    is_array: true,
                    array_path: array_path.clone(),
                    sub_path: String::new(),
                };
            }
            if let Some(sub) = path.strip_prefix(array_path.as_str()).and_then(|r| r.strip_prefix('.')) {
                return ArrayDetails {
                    is_array: true,
                    array_path: array_path.clone(),
                    sub_path: sub.to_string(),
                };
            }
        }
        ArrayDetails::default()
    }

    pub fn is_array_path(&self, path: &str) -> bool {
        self.array_details(path).is_array
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields_type.get(field).copied()
    }

    pub fn timestamp_field(&self) -> &str {
        self.timestamp_field_name.as_deref().unwrap_or(CREATION_TIME_FIELD)
    }

    pub fn must_exclude_fields(&self) -> &[String] {
        &self.must_exclude_fields
    }

    pub fn nested_doc_path(&self) -> Option<&str> {
        self.nested_doc_path.as_deref()
    }
}

/// Registration record of one public path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInfo {
    pub base_path: String,
    pub db_collection: String,
    pub schema: SchemaInfo,
}

/// Path to collection registry. Populated while routes are registered and
/// read-only once the server is serving.
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    infos: HashMap<String, ApiInfo>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: ApiInfo) {
        let key = Self::key(&info.base_path);
        if self.infos.insert(key.clone(), info).is_some() {
            tracing::warn!("api info for path {} registered twice, keeping the latest", key);
        }
    }

    /// Lookup accepts paths with or without the leading slash.
    pub fn get(&self, path: &str) -> Option<&ApiInfo> {
        self.infos.get(&Self::key(path))
    }

    /// Registered path names, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.infos.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Every distinct collection with at least one registered path.
    pub fn collections(&self) -> Vec<String> {
        let mut collections: Vec<String> = self.infos.values().map(|i| i.db_collection.clone()).collect();
        collections.sort();
        collections.dedup();
        collections
    }

    fn key(path: &str) -> String {
        path.trim_start_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_details_match_whole_segments() {
        let schema = SchemaInfo::new().with_array_paths(&["users", "orders"]);

        let exact = schema.array_details("users");
        assert!(exact.is_array);
        assert_eq!(exact.array_path, "users");
        assert_eq!(exact.sub_path, "");

        let nested = schema.array_details("users.id");
        assert!(nested.is_array);
        assert_eq!(nested.sub_path, "id");

        assert!(!schema.array_details("products").is_array);
        assert!(!schema.array_details("usersCount").is_array);
    }

    #[test]
    fn timestamp_defaults_to_creation_time() {
        assert_eq!(SchemaInfo::new().timestamp_field(), "creationTime");
        assert_eq!(
            SchemaInfo::new().with_timestamp_field("timestamp").timestamp_field(),
            "timestamp"
        );
    }

    #[test]
    fn registry_lookup_ignores_leading_slash() {
        let mut registry = ApiRegistry::new();
        registry.register(ApiInfo {
            base_path: "/cluster".to_string(),
            db_collection: "clusters".to_string(),
            schema: SchemaInfo::new(),
        });
        assert!(registry.get("cluster").is_some());
        assert!(registry.get("/cluster").is_some());
        assert_eq!(registry.paths(), vec!["cluster".to_string()]);
    }
}
