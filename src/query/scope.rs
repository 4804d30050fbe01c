//! Filters built from plain URL query parameters on `GET <path>`.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::consts::{CUSTOMER_GUID, FROM_DATE_PARAM, LIMIT_PARAM, PROJECTION_PARAM, SKIP_PARAM, TO_DATE_PARAM};
use crate::filter::scalar::parse_bool;
use crate::filter::FilterBuilder;

/// How the parameters under one prefix map onto document fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryConfig {
    pub field_name: String,
    /// Prefix inside the array element when `is_array` is set.
    pub path_in_array: String,
    pub is_array: bool,
    /// Try bool, then int, before falling back to a string.
    pub parse_value: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParamsConfig {
    pub params: BTreeMap<String, QueryConfig>,
    /// Prefix assumed for parameters without a dot.
    pub default_context: String,
}

impl QueryParamsConfig {
    /// `key=value` queries `attributes.key`.
    pub fn attributes() -> Self {
        let mut params = BTreeMap::new();
        params.insert(
            "attributes".to_string(),
            QueryConfig {
                field_name: "attributes".to_string(),
                ..Default::default()
            },
        );
        Self {
            params,
            default_context: "attributes".to_string(),
        }
    }

    /// `key=value` queries the top-level `key`.
    pub fn flat() -> Self {
        let mut params = BTreeMap::new();
        params.insert(String::new(), QueryConfig::default());
        Self {
            params,
            default_context: String::new(),
        }
    }
}

fn is_search_param(name: &str) -> bool {
    !matches!(
        name,
        CUSTOMER_GUID | LIMIT_PARAM | SKIP_PARAM | FROM_DATE_PARAM | TO_DATE_PARAM | PROJECTION_PARAM
    )
}

/// Builds a filter from query parameters, or `None` when no parameter
/// applies. Repeated parameters become alternatives.
pub fn query_params_to_filter(params: &[(String, String)], config: &QueryParamsConfig) -> Option<FilterBuilder> {
    let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, value) in params {
        if !is_search_param(name) || value.is_empty() {
            continue;
        }
        let value = urlencoding_decode(value);
        grouped.entry(name.as_str()).or_default().push(value);
    }

    let mut builders: BTreeMap<String, (QueryConfig, FilterBuilder)> = BTreeMap::new();
    for (name, values) in grouped {
        let parts: Vec<&str> = name.split('.').collect();
        let (field, key) = match parts.len() {
            1 => (config.default_context.clone(), parts[0].to_string()),
            _ => (parts[0].to_string(), parts[1..].join(".")),
        };
        let query_config = config.params.get(&field).cloned().unwrap_or_else(|| QueryConfig {
            field_name: field.clone(),
            parse_value: true,
            ..Default::default()
        });
        let key = if query_config.is_array {
            if query_config.path_in_array.is_empty() {
                key
            } else {
                format!("{}.{}", query_config.path_in_array, key)
            }
        } else if !query_config.field_name.is_empty() {
            format!("{}.{}", query_config.field_name, key)
        } else {
            key
        };

        let (_, builder) = builders
            .entry(query_config.field_name.clone())
            .or_insert_with(|| (query_config.clone(), FilterBuilder::new()));
        let current = std::mem::take(builder);
        *builder = if values.len() == 1 {
            add_value(current, &query_config, &key, &values[0])
        } else {
            let alternatives = values
                .iter()
                .fold(FilterBuilder::new(), |fb, v| add_value(fb, &query_config, &key, v));
            current.with_filter(alternatives.warp_or())
        };
    }

    let mut all = FilterBuilder::new();
    for (_, (query_config, builder)) in builders {
        let mut builder = builder.wrap_dup_keys_with_or();
        if query_config.is_array {
            builder = builder.warp_element_match().warp_with_field(query_config.field_name);
        }
        all = all.with_filter(builder);
    }
    if all.is_empty() {
        return None;
    }
    Some(all)
}

fn add_value(builder: FilterBuilder, config: &QueryConfig, key: &str, value: &str) -> FilterBuilder {
    if !config.parse_value {
        return builder.with_value(key, value);
    }
    if let Some(b) = parse_bool(value) {
        return builder.with_equal(key, b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return builder.with_equal(key, i);
    }
    builder.with_value(key, Value::String(value.to_string()))
}

/// Values arrive decoded once by the router; a second pass catches
/// double-encoded clients.
fn urlencoding_decode(value: &str) -> String {
    let query = format!("v={}", value.replace('&', "%26"));
    url::form_urlencoded::parse(query.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn default_context_targets_attributes() {
        let filter = query_params_to_filter(&params(&[("alias", "AB"), ("limit", "5")]), &QueryParamsConfig::attributes())
            .unwrap();
        assert_eq!(filter.build(), json!({"attributes.alias": "AB"}));
    }

    #[test]
    fn flat_config_parses_values() {
        let filter = query_params_to_filter(
            &params(&[("clusterName", "c1"), ("include", "true"), ("depth", "3")]),
            &QueryParamsConfig::flat(),
        )
        .unwrap();
        assert_eq!(
            filter.build(),
            json!({"clusterName": "c1", "depth": "3", "include": "true"})
        );
    }

    #[test]
    fn unknown_prefixes_parse_values() {
        let filter = query_params_to_filter(
            &params(&[("scope.enabled", "true"), ("scope.depth", "3")]),
            &QueryParamsConfig::flat(),
        )
        .unwrap();
        assert_eq!(
            filter.build(),
            json!({"scope.depth": {"$eq": 3}, "scope.enabled": {"$eq": true}})
        );
    }

    #[test]
    fn repeated_params_fold_into_or() {
        let filter = query_params_to_filter(
            &params(&[("scope.cluster", "a"), ("scope.cluster", "b")]),
            &QueryParamsConfig::flat(),
        )
        .unwrap();
        assert_eq!(
            filter.build(),
            json!({"$or": [{"scope.cluster": "a"}, {"scope.cluster": "b"}]})
        );
    }

    #[test]
    fn array_fields_use_element_match() {
        let mut config = QueryParamsConfig::flat();
        config.params.insert(
            "users".to_string(),
            QueryConfig {
                field_name: "users".to_string(),
                is_array: true,
                ..Default::default()
            },
        );
        let filter = query_params_to_filter(&params(&[("users.id", "u1")]), &config).unwrap();
        assert_eq!(filter.build(), json!({"users": {"$elemMatch": {"id": "u1"}}}));
    }

    #[test]
    fn only_reserved_params_give_none() {
        let found = query_params_to_filter(
            &params(&[("customerGUID", "t1"), ("skip", "0"), ("projection", "name")]),
            &QueryParamsConfig::attributes(),
        );
        assert!(found.is_none());
    }

    #[test]
    fn double_encoded_values_are_unescaped() {
        let filter = query_params_to_filter(&params(&[("name", "a%20b")]), &QueryParamsConfig::flat()).unwrap();
        assert_eq!(filter.build(), json!({"name": "a b"}));
    }
}
