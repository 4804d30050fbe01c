use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::QueryError;
use crate::consts::{GUID_FIELD, ID_FIELD};
use crate::filter::scalar::format_date;
use crate::filter::{FilterBuilder, FindOptions, ScalarValue, SortDirection};
use crate::schema::{FieldType, SchemaInfo};

const VALUE_SEPARATOR: char = ',';
const ESCAPE_CHAR: char = '\\';
const OPERATOR_SEPARATOR: char = '|';
const SUB_QUERY_SEPARATOR: char = '&';
const SORT_TYPE_SEPARATOR: char = ':';
const IGNORE_CASE_OPTION: &str = "ignorecase";

/// Body of `POST <path>/query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2ListRequest {
    #[serde(default)]
    pub order_by: String,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub page_num: Option<i64>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields_list: Vec<String>,
    #[serde(default)]
    pub inner_filters: Vec<BTreeMap<String, String>>,
}

/// Body of `POST <path>/uniqueValues`. The keys of `fields` are the group
/// fields; their values are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueValuesRequest {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub inner_filters: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub page_num: Option<i64>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

/// Absent, negative or oversized page sizes become `max`; zero is kept.
fn page_size(requested: Option<i64>, max: usize) -> usize {
    match requested {
        Some(size) if size >= 0 && (size as u64) <= max as u64 => size as usize,
        _ => max,
    }
}

fn page_num(requested: Option<i64>) -> usize {
    requested.filter(|n| *n > 0).map(|n| n as usize).unwrap_or(0)
}

pub fn v2_list_find_options(
    request: &V2ListRequest,
    schema: &SchemaInfo,
    max_page_size: usize,
) -> Result<FindOptions, QueryError> {
    let mut opts = FindOptions::new();
    opts.set_pagination(page_num(request.page_num), page_size(request.page_size, max_page_size));

    let ts_field = schema.timestamp_field();
    let order_by = if request.order_by.is_empty() {
        format!("{}:desc", ts_field)
    } else {
        request.order_by.clone()
    };
    for sort_field in order_by.split(VALUE_SEPARATOR) {
        let name_and_type: Vec<&str> = sort_field.split(SORT_TYPE_SEPARATOR).collect();
        let [name, direction] = name_and_type[..] else {
            return Err(QueryError::InvalidSortField(sort_field.to_string()));
        };
        let direction =
            SortDirection::parse(direction).ok_or_else(|| QueryError::InvalidSortType(direction.to_string()))?;
        opts.sort_mut().add(name, direction);
    }

    if request.fields_list.is_empty() {
        opts.projection_mut().exclude(schema.must_exclude_fields());
    } else {
        opts.projection_mut().include(&request.fields_list);
    }

    let window = time_window(ts_field, request.since.as_ref(), request.until.as_ref(), schema)?;
    let filter = window.with_filter(inner_filters(&request.inner_filters, schema)?);
    opts.set_filter(filter);
    Ok(opts)
}

pub fn unique_values_find_options(
    request: &UniqueValuesRequest,
    schema: &SchemaInfo,
    max_page_size: usize,
) -> Result<FindOptions, QueryError> {
    if request.fields.is_empty() {
        return Err(QueryError::FieldsRequired);
    }
    let mut opts = FindOptions::new();
    let per_page = match page_size(request.page_size, max_page_size) {
        0 => max_page_size,
        size => size,
    };
    opts.set_pagination(page_num(request.page_num), per_page);
    let fields: Vec<&String> = request.fields.keys().collect();
    opts.add_group(&fields);

    let ts_field = schema.timestamp_field();
    let window = time_window(ts_field, request.since.as_ref(), request.until.as_ref(), schema)?;
    opts.set_filter(window.with_filter(inner_filters(&request.inner_filters, schema)?));
    Ok(opts)
}

fn time_window(
    ts_field: &str,
    since: Option<&DateTime<Utc>>,
    until: Option<&DateTime<Utc>>,
    schema: &SchemaInfo,
) -> Result<FilterBuilder, QueryError> {
    let mut filter = FilterBuilder::new();
    if let Some(until) = until {
        let raw = format_date(until);
        filter = filter.with_lower_than_equal(ts_field, typed_value(schema, ts_field, &raw)?);
    }
    if let Some(since) = since {
        let raw = format_date(since);
        filter = filter.with_greater_than_equal(ts_field, typed_value(schema, ts_field, &raw)?);
    }
    Ok(filter)
}

/// One inner filter is merged as is; several become alternatives.
fn inner_filters(requests: &[BTreeMap<String, String>], schema: &SchemaInfo) -> Result<FilterBuilder, QueryError> {
    let mut filters = Vec::new();
    for inner in requests {
        if let Some(filter) = build_inner_filter(inner, "", schema)? {
            filters.push(filter);
        }
    }
    Ok(match filters.len() {
        0 => FilterBuilder::new(),
        1 => filters.remove(0),
        _ => FilterBuilder::new().add_or(filters),
    })
}

/// Translates one inner filter. `root` is the array path when called for
/// the conditions of an element match.
pub fn build_inner_filter(
    inner: &BTreeMap<String, String>,
    root: &str,
    schema: &SchemaInfo,
) -> Result<Option<FilterBuilder>, QueryError> {
    let mut builder = FilterBuilder::new();
    let mut elem_matches: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for (key, value) in inner {
        if value.is_empty() {
            continue;
        }
        let key_and_operator: Vec<&str> = key.split(OPERATOR_SEPARATOR).collect();
        if key_and_operator.len() > 1 && key_and_operator[1] == "elemMatch" {
            let field = with_root(root, key_and_operator[0]);
            let details = schema.array_details(&field);
            if !details.is_array {
                return Err(QueryError::ElementMatchOnScalar);
            }
            elem_matches
                .entry(details.array_path)
                .or_default()
                .insert(details.sub_path, value.clone());
            continue;
        }

        let mut alternatives = Vec::new();
        for part in split_ignore_escaped(value) {
            alternatives.push(term_filter(key, &part, root, schema)?);
        }
        builder = match alternatives.len() {
            0 => builder,
            1 => builder.with_filter(alternatives.remove(0)),
            _ => builder.add_or(alternatives),
        };
    }

    for (array, conditions) in elem_matches {
        let inner = build_inner_filter(&conditions, &array, schema)
            .map_err(|err| QueryError::InvalidElementMatch(Box::new(err)))?
            .unwrap_or_default();
        builder = builder.with_filter(inner.warp_element_match().warp_with_field(array));
    }

    if builder.is_empty() {
        return Ok(None);
    }
    Ok(Some(builder))
}

/// Filter for one `value|operator&option` term.
fn term_filter(key: &str, term: &str, root: &str, schema: &SchemaInfo) -> Result<FilterBuilder, QueryError> {
    let value_and_operation: Vec<&str> = term.split(OPERATOR_SEPARATOR).collect();
    let value = value_and_operation[0].replace(ESCAPE_CHAR, "");
    let (operator, option) = match value_and_operation[..] {
        [_, operation] => match operation.split_once(SUB_QUERY_SEPARATOR) {
            Some((operator, option)) => (operator, option),
            None => (operation, ""),
        },
        _ => ("match", ""),
    };
    let typed_key = with_root(root, key);

    let filter = FilterBuilder::new();
    Ok(match operator {
        "exists" => filter.add_exists(key, true),
        "missing" => filter.add_exists(key, false),
        "match" | "equal" => {
            if root.is_empty() && (key == GUID_FIELD || key == ID_FIELD) {
                filter.with_id(value)
            } else {
                filter.with_value(key, typed_value(schema, &typed_key, &value)?)
            }
        }
        "greater" => filter.with_greater_than_equal(key, typed_value(schema, &typed_key, &value)?),
        "lower" => filter.with_lower_than_equal(key, typed_value(schema, &typed_key, &value)?),
        "like" => filter.with_regex(key, regex::escape(&value), option == IGNORE_CASE_OPTION),
        "regex" => filter.with_regex(key, value, option == IGNORE_CASE_OPTION),
        "range" => {
            let bounds: Vec<&str> = value.split(SUB_QUERY_SEPARATOR).collect();
            let [low, high] = bounds[..] else {
                return Err(QueryError::MissingRangeSeparator(value.clone()));
            };
            if low.is_empty() || high.is_empty() {
                return Err(QueryError::InvalidRangeValue(value.clone()));
            }
            let low = typed_scalar(schema, &typed_key, low)?;
            let high = typed_scalar(schema, &typed_key, high)?;
            if !low.same_kind(&high) {
                return Err(QueryError::RangeTypeMismatch(low.kind(), high.kind()));
            }
            filter.with_range(key, low, high)
        }
        other => return Err(QueryError::UnsupportedOperator(other.to_string())),
    })
}

fn with_root(root: &str, key: &str) -> String {
    if root.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", root, key)
    }
}

/// Coerces a raw value following the field's declared type.
pub fn typed_value(schema: &SchemaInfo, field: &str, raw: &str) -> Result<Value, QueryError> {
    typed_scalar(schema, field, raw).map(Value::from)
}

fn typed_scalar(schema: &SchemaInfo, field: &str, raw: &str) -> Result<ScalarValue, QueryError> {
    match schema.field_type(field) {
        Some(FieldType::String) => Ok(ScalarValue::String(raw.to_string())),
        Some(FieldType::Date) => ScalarValue::parse_date(raw).ok_or_else(|| QueryError::InvalidTime {
            field: field.to_string(),
            value: raw.to_string(),
        }),
        None => Ok(ScalarValue::infer(raw)),
    }
}

/// Splits on commas that are not preceded by the escape character. The
/// escape characters stay in place.
fn split_ignore_escaped(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in value.chars() {
        if c == VALUE_SEPARATOR && !escaped {
            parts.push(std::mem::take(&mut current));
            continue;
        }
        escaped = c == ESCAPE_CHAR;
        current.push(c);
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaInfo {
        SchemaInfo::new()
            .with_array_paths(&["relatedObjects"])
            .with_field_type("creationTime", FieldType::Date)
            .with_field_type("updatedTime", FieldType::Date)
            .with_field_type("name", FieldType::String)
            .with_must_exclude_fields(&["secret"])
    }

    fn inner(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn filter_of(pairs: &[(&str, &str)]) -> Result<Value, QueryError> {
        let request = V2ListRequest {
            inner_filters: vec![inner(pairs)],
            ..Default::default()
        };
        Ok(v2_list_find_options(&request, &schema(), 150)?.filter().build())
    }

    #[test]
    fn defaults_sort_by_timestamp_and_exclude_hidden_fields() {
        let opts = v2_list_find_options(&V2ListRequest::default(), &schema(), 150).unwrap();
        assert_eq!(opts.sort().fields(), &[("creationTime".to_string(), SortDirection::Desc)]);
        assert_eq!(opts.projection().excluded(), &["secret".to_string()]);
        assert_eq!(opts.limit(), Some(150));
        assert_eq!(opts.skip(), 0);
    }

    #[test]
    fn page_size_is_clamped_and_zero_counts_only() {
        let request = V2ListRequest {
            page_size: Some(1000),
            page_num: Some(2),
            ..Default::default()
        };
        let opts = v2_list_find_options(&request, &schema(), 150).unwrap();
        assert_eq!(opts.limit(), Some(150));
        assert_eq!(opts.skip(), 300);

        let request = V2ListRequest {
            page_size: Some(0),
            ..Default::default()
        };
        assert_eq!(v2_list_find_options(&request, &schema(), 150).unwrap().limit(), Some(0));
    }

    #[test]
    fn order_by_errors() {
        let request = V2ListRequest {
            order_by: "name".to_string(),
            ..Default::default()
        };
        let err = v2_list_find_options(&request, &schema(), 150).unwrap_err();
        assert_eq!(err.to_string(), "invalid sort field name");

        let request = V2ListRequest {
            order_by: "name:up".to_string(),
            ..Default::default()
        };
        let err = v2_list_find_options(&request, &schema(), 150).unwrap_err();
        assert_eq!(err.to_string(), "invalid sort type up");
    }

    #[test]
    fn field_list_projects_explicitly() {
        let request = V2ListRequest {
            fields_list: vec!["name".to_string(), "secret".to_string()],
            ..Default::default()
        };
        let opts = v2_list_find_options(&request, &schema(), 150).unwrap();
        assert_eq!(opts.projection().included(), &["name".to_string(), "secret".to_string()]);
        assert!(opts.projection().excluded().is_empty());
    }

    #[test]
    fn match_and_comma_alternatives() {
        assert_eq!(filter_of(&[("name", "a")]).unwrap(), json!({"name": "a"}));
        assert_eq!(filter_of(&[("count", "7")]).unwrap(), json!({"count": 7}));
        assert_eq!(filter_of(&[("guid", "g1|equal")]).unwrap(), json!({"_id": "g1"}));
        assert_eq!(
            filter_of(&[("name", "a,b\\,c")]).unwrap(),
            json!({"$or": [{"name": "a"}, {"name": "b,c"}]})
        );
    }

    #[test]
    fn non_finite_words_are_matched_as_text() {
        assert_eq!(filter_of(&[("label", "nan")]).unwrap(), json!({"label": "nan"}));
        assert_eq!(
            filter_of(&[("label", "inf,infinity")]).unwrap(),
            json!({"$or": [{"label": "inf"}, {"label": "infinity"}]})
        );
        assert_eq!(filter_of(&[("score", "2.5")]).unwrap(), json!({"score": 2.5}));
    }

    #[test]
    fn comparison_and_presence_operators() {
        assert_eq!(filter_of(&[("count", "3|greater")]).unwrap(), json!({"count": {"$gte": 3}}));
        assert_eq!(filter_of(&[("count", "3|lower")]).unwrap(), json!({"count": {"$lte": 3}}));
        assert_eq!(
            filter_of(&[("alias", "|exists")]).unwrap(),
            json!({"alias": {"$exists": true, "$ne": null}})
        );
        assert_eq!(
            filter_of(&[("alias", "|missing")]).unwrap(),
            json!({"$or": [{"alias": {"$exists": false}}, {"alias": null}]})
        );
    }

    #[test]
    fn like_quotes_and_regex_does_not() {
        assert_eq!(
            filter_of(&[("name", "BeZ|like&ignorecase")]).unwrap(),
            json!({"name": {"$regex": "BeZ", "$options": "i"}})
        );
        assert_eq!(
            filter_of(&[("name", "a.b|like")]).unwrap(),
            json!({"name": {"$regex": "a\\.b"}})
        );
        assert_eq!(
            filter_of(&[("name", "^a.*|regex")]).unwrap(),
            json!({"name": {"$regex": "^a.*"}})
        );
    }

    #[test]
    fn range_bounds_are_typed() {
        assert_eq!(
            filter_of(&[("updatedTime", "2024-01-01T00:00:00Z&2024-02-01T00:00:00Z|range")]).unwrap(),
            json!({"updatedTime": {"$gte": "2024-01-01T00:00:00.000000000Z", "$lte": "2024-02-01T00:00:00.000000000Z"}})
        );
        assert_eq!(
            filter_of(&[("count", "1&5|range")]).unwrap(),
            json!({"count": {"$gte": 1, "$lte": 5}})
        );
    }

    #[test]
    fn range_errors() {
        assert_eq!(
            filter_of(&[("count", "1|range")]).unwrap_err().to_string(),
            "value missing range separator 1"
        );
        assert_eq!(
            filter_of(&[("count", "&5|range")]).unwrap_err().to_string(),
            "invalid range value &5"
        );
        assert_eq!(
            filter_of(&[("count", "1&x|range")]).unwrap_err().to_string(),
            "invalid range must use same value types found integer string"
        );
        assert_eq!(
            filter_of(&[("creationTime", "yesterday|greater")]).unwrap_err().to_string(),
            "failed to parse field creationTime with value yesterday into Time type"
        );
        assert_eq!(
            filter_of(&[("name", "a|near")]).unwrap_err().to_string(),
            "unsupported operator near"
        );
    }

    #[test]
    fn element_match_groups_conditions_per_array() {
        assert_eq!(
            filter_of(&[
                ("relatedObjects.cveID|elemMatch", "cve1"),
                ("relatedObjects.severity|elemMatch", "critical"),
            ])
            .unwrap(),
            json!({"relatedObjects": {"$elemMatch": {"cveID": "cve1", "severity": "critical"}}})
        );
        assert_eq!(
            filter_of(&[("name|elemMatch", "x")]).unwrap_err(),
            QueryError::ElementMatchOnScalar
        );
        let err = filter_of(&[("relatedObjects.id|elemMatch", "x|near")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid element match filters unsupported operator near");
    }

    #[test]
    fn several_inner_filters_become_alternatives() {
        let request = V2ListRequest {
            inner_filters: vec![inner(&[("name", "a")]), inner(&[("name", "")]), inner(&[("name", "b")])],
            ..Default::default()
        };
        let opts = v2_list_find_options(&request, &schema(), 150).unwrap();
        assert_eq!(opts.filter().build(), json!({"$or": [{"name": "a"}, {"name": "b"}]}));
    }

    #[test]
    fn time_window_uses_timestamp_field() {
        let request = V2ListRequest {
            since: Some("2024-01-01T00:00:00Z".parse().unwrap()),
            until: Some("2024-02-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        let opts = v2_list_find_options(&request, &schema(), 150).unwrap();
        assert_eq!(
            opts.filter().build(),
            json!({"$and": [
                {"creationTime": {"$lte": "2024-02-01T00:00:00.000000000Z"}},
                {"creationTime": {"$gte": "2024-01-01T00:00:00.000000000Z"}}
            ]})
        );
    }

    #[test]
    fn unique_values_require_fields() {
        let err = unique_values_find_options(&UniqueValuesRequest::default(), &schema(), 150).unwrap_err();
        assert_eq!(err, QueryError::FieldsRequired);

        let request = UniqueValuesRequest {
            fields: inner(&[("name", ""), ("relatedObjects.severity|relatedObjects.component", "")]),
            page_size: Some(10),
            ..Default::default()
        };
        let opts = unique_values_find_options(&request, &schema(), 150).unwrap();
        assert_eq!(opts.group().len(), 2);
        assert_eq!(opts.limit(), Some(10));
    }
}
