use serde_json::Value;

use super::compare::values_equal;
use super::matcher::{element_satisfies, match_candidates, matches};
use super::path;
use super::EngineError;

/// Applies an update command in place. `filter` is the predicate that selected
/// the document and resolves positional `$` segments. Returns whether the
/// document changed.
pub fn apply_update(doc: &mut Value, update: &Value, filter: &Value) -> Result<bool, EngineError> {
    let Value::Object(operations) = update else {
        return Err(EngineError::InvalidUpdate("update must be an object".to_string()));
    };
    let before = doc.clone();

    for (op, fields) in operations {
        let Value::Object(fields) = fields else {
            return Err(EngineError::InvalidUpdate(format!("{} requires an object", op)));
        };
        for (field, value) in fields {
            let field = resolve_positional(doc, field, filter)?;
            match op.as_str() {
                "$set" => {
                    if !path::set(doc, &field, value.clone()) {
                        return Err(EngineError::InvalidUpdate(format!("cannot set field {}", field)));
                    }
                }
                "$unset" => {
                    path::remove(doc, &field);
                }
                "$addToSet" => add_to_set(doc, &field, value)?,
                "$push" => push(doc, &field, value)?,
                "$pull" => pull(doc, &field, value)?,
                _ => return Err(EngineError::UnsupportedOperator(op.clone())),
            }
        }
    }

    Ok(*doc != before)
}

fn array_at<'a>(doc: &'a mut Value, field: &str) -> Result<&'a mut Vec<Value>, EngineError> {
    if path::get(doc, field).is_none() && !path::set(doc, field, Value::Array(Vec::new())) {
        return Err(EngineError::InvalidUpdate(format!("cannot create array at {}", field)));
    }
    match path::get_mut(doc, field) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(EngineError::InvalidUpdate(format!("field {} is not an array", field))),
    }
}

fn each_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(map) if map.len() == 1 && map.contains_key("$each") => map
            .get("$each")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        other => vec![other.clone()],
    }
}

fn add_to_set(doc: &mut Value, field: &str, value: &Value) -> Result<(), EngineError> {
    let items = array_at(doc, field)?;
    for candidate in each_values(value) {
        if !items.iter().any(|existing| values_equal(existing, &candidate)) {
            items.push(candidate);
        }
    }
    Ok(())
}

fn push(doc: &mut Value, field: &str, value: &Value) -> Result<(), EngineError> {
    let items = array_at(doc, field)?;
    items.extend(each_values(value));
    Ok(())
}

fn pull(doc: &mut Value, field: &str, condition: &Value) -> Result<(), EngineError> {
    let Some(Value::Array(items)) = path::get_mut(doc, field) else {
        return Ok(());
    };
    let mut kept = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if !element_satisfies(&item, condition)? {
            kept.push(item);
        }
    }
    *items = kept;
    Ok(())
}

/// Replaces a `$` segment with the index of the first array element that
/// satisfies the part of `filter` addressing that array.
fn resolve_positional(doc: &Value, field: &str, filter: &Value) -> Result<String, EngineError> {
    let segments: Vec<&str> = field.split('.').collect();
    let Some(pos) = segments.iter().position(|s| *s == "$") else {
        return Ok(field.to_string());
    };
    let array_path = segments[..pos].join(".");
    let Some(Value::Array(items)) = path::get(doc, &array_path) else {
        return Err(EngineError::PositionalNoMatch(field.to_string()));
    };

    let conditions = array_conditions(filter, &array_path);
    for (idx, item) in items.iter().enumerate() {
        let mut all = !conditions.is_empty();
        for (sub_path, condition) in &conditions {
            let hit = match sub_path {
                Some(sub) => match_candidates(&path::resolve(item, sub), condition)?,
                None => match condition.get("$elemMatch") {
                    Some(inner) if item.is_object() => matches(item, inner)?,
                    _ => match_candidates(&[item], condition)?,
                },
            };
            if !hit {
                all = false;
                break;
            }
        }
        if all {
            let mut resolved: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
            resolved[pos] = idx.to_string();
            return Ok(resolved.join("."));
        }
    }
    Err(EngineError::PositionalNoMatch(field.to_string()))
}

/// Collects `(sub_path, condition)` pairs from the top-level conjunction of
/// `filter` that address `array_path` or a field below it.
fn array_conditions(filter: &Value, array_path: &str) -> Vec<(Option<String>, Value)> {
    let mut out = Vec::new();
    collect_array_conditions(filter, array_path, &mut out);
    out
}

fn collect_array_conditions(filter: &Value, array_path: &str, out: &mut Vec<(Option<String>, Value)>) {
    let Some(map) = filter.as_object() else {
        return;
    };
    for (key, condition) in map {
        if key == "$and" {
            for sub in condition.as_array().into_iter().flatten() {
                collect_array_conditions(sub, array_path, out);
            }
        } else if key == array_path {
            out.push((None, condition.clone()));
        } else if let Some(sub) = key.strip_prefix(array_path).and_then(|r| r.strip_prefix('.')) {
            out.push((Some(sub.to_string()), condition.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_unset() {
        let mut doc = json!({"a": 1, "b": {"c": 2}});
        let changed = apply_update(&mut doc, &json!({"$set": {"b.d": 3}, "$unset": {"a": ""}}), &json!({})).unwrap();
        assert!(changed);
        assert_eq!(doc, json!({"b": {"c": 2, "d": 3}}));
    }

    #[test]
    fn add_to_set_skips_existing() {
        let mut doc = json!({"tags": ["a"]});
        apply_update(&mut doc, &json!({"$addToSet": {"tags": {"$each": ["a", "b"]}}}), &json!({})).unwrap();
        assert_eq!(doc, json!({"tags": ["a", "b"]}));
        let changed = apply_update(&mut doc, &json!({"$addToSet": {"tags": "b"}}), &json!({})).unwrap();
        assert!(!changed);
    }

    #[test]
    fn pull_with_in() {
        let mut doc = json!({"users": [{"t": "x"}, {"t": "y"}, "z"]});
        apply_update(&mut doc, &json!({"$pull": {"users": {"$in": [{"t": "x"}, "z"]}}}), &json!({})).unwrap();
        assert_eq!(doc, json!({"users": [{"t": "y"}]}));
    }

    #[test]
    fn positional_set_uses_filter() {
        let mut doc = json!({"vulnerabilities": [{"name": "cve-1"}, {"name": "cve-2"}]});
        let filter = json!({"vulnerabilities.name": {"$in": ["cve-2"]}});
        apply_update(&mut doc, &json!({"$set": {"vulnerabilities.$.severityScore": 7}}), &filter).unwrap();
        assert_eq!(
            doc,
            json!({"vulnerabilities": [{"name": "cve-1"}, {"name": "cve-2", "severityScore": 7}]})
        );
    }
}
