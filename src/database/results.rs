use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Total {
    pub value: u64,
    pub relation: String,
}

/// Page of a paginated search together with the size of the full result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: Total,
    pub response: Vec<Value>,
}

impl SearchResult {
    pub fn new(count: u64, response: Vec<Value>) -> Self {
        Self {
            total: Total {
                value: count,
                relation: "eq".to_string(),
            },
            response,
        }
    }

    pub fn map_response(mut self, f: impl Fn(Value) -> Value) -> Self {
        self.response = self.response.into_iter().map(f).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCount {
    pub field: String,
    pub count: i64,
}

/// Distinct values per requested field, keyed by the field specifier as sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueValuesResponse {
    pub fields: BTreeMap<String, Vec<String>>,
    pub fields_count: BTreeMap<String, Vec<FieldCount>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub total: usize,
    pub limit: usize,
    /// Zero once the last page has been served.
    pub next_skip: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggResult {
    pub metadata: Metadata,
    pub results: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_wire_shapes() {
        let search = SearchResult::new(3, vec![json!({"guid": "a"})]);
        assert_eq!(
            serde_json::to_value(&search).unwrap(),
            json!({"total": {"value": 3, "relation": "eq"}, "response": [{"guid": "a"}]})
        );

        let mut unique = UniqueValuesResponse::default();
        unique.fields.insert("name".to_string(), vec!["a".to_string()]);
        unique
            .fields_count
            .insert("name".to_string(), vec![FieldCount { field: "a".to_string(), count: 2 }]);
        assert_eq!(
            serde_json::to_value(&unique).unwrap(),
            json!({"fields": {"name": ["a"]}, "fieldsCount": {"name": [{"field": "a", "count": 2}]}})
        );

        let agg = AggResult {
            metadata: Metadata { total: 5, limit: 2, next_skip: 2 },
            results: vec![],
        };
        assert_eq!(
            serde_json::to_value(&agg).unwrap(),
            json!({"metadata": {"total": 5, "limit": 2, "nextSkip": 2}, "results": []})
        );
    }
}
