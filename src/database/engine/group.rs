use serde_json::{Map, Value};

use super::compare::total_cmp;
use super::matcher::matches;
use super::path;
use super::EngineError;

/// Separator of composite grouping fields and of their joined values.
pub const COMPOSITE_SEPARATOR: char = '|';

/// One distinct value (or tuple) with the number of rows carrying it.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCount {
    pub key: Value,
    pub count: i64,
}

/// Replaces the array at `array_path` by each of its elements in turn.
pub fn unwind(docs: &[Value], array_path: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for doc in docs {
        let Some(Value::Array(items)) = path::get(doc, array_path) else {
            continue;
        };
        for item in items {
            let mut row = doc.clone();
            path::set(&mut row, array_path, item.clone());
            out.push(row);
        }
    }
    out
}

/// Rewrites a predicate so it applies to rows produced by `unwind`:
/// `{array: {$elemMatch: {k: v}}}` becomes `{array.k: v}`.
pub fn match_filters_for_unwind(array_path: &str, filter: &Value) -> Value {
    let Value::Object(clauses) = filter else {
        return filter.clone();
    };
    let mut out = Map::new();
    let mut extra: Vec<Value> = Vec::new();
    for (key, condition) in clauses {
        if key != array_path {
            insert_or_defer(&mut out, &mut extra, key.clone(), condition.clone());
            continue;
        }
        let Value::Object(ops) = condition else {
            insert_or_defer(&mut out, &mut extra, key.clone(), condition.clone());
            continue;
        };
        for (op, inner) in ops {
            if op == "$elemMatch" {
                for (sub_key, sub_cond) in inner.as_object().into_iter().flatten() {
                    if sub_key.starts_with('$') {
                        insert_or_defer(&mut out, &mut extra, sub_key.clone(), prefix_keys(array_path, sub_cond));
                    } else {
                        insert_or_defer(&mut out, &mut extra, format!("{}.{}", array_path, sub_key), sub_cond.clone());
                    }
                }
            } else {
                insert_or_defer(&mut out, &mut extra, format!("{}.{}", array_path, op), inner.clone());
            }
        }
    }
    if extra.is_empty() {
        return Value::Object(out);
    }
    let mut and = vec![Value::Object(out)];
    and.extend(extra);
    let mut wrapped = Map::new();
    wrapped.insert("$and".to_string(), Value::Array(and));
    Value::Object(wrapped)
}

fn insert_or_defer(out: &mut Map<String, Value>, extra: &mut Vec<Value>, key: String, value: Value) {
    if out.contains_key(&key) {
        let mut single = Map::new();
        single.insert(key, value);
        extra.push(Value::Object(single));
    } else {
        out.insert(key, value);
    }
}

fn prefix_keys(array_path: &str, value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (format!("{}.{}", array_path, k), v.clone()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|i| prefix_keys(array_path, i)).collect()),
        other => other.clone(),
    }
}

/// Groups rows by the value at each of `fields` (a tuple when more than one),
/// counts them, orders by key ascending and applies the skip/limit window.
pub fn group_count(rows: &[Value], fields: &[&str], skip: usize, limit: Option<usize>) -> Vec<GroupCount> {
    let mut groups: Vec<GroupCount> = Vec::new();
    for row in rows {
        let key = if fields.len() == 1 {
            group_value(row, fields[0])
        } else {
            Value::Array(fields.iter().map(|f| group_value(row, f)).collect())
        };
        match groups.binary_search_by(|g| total_cmp(&g.key, &key)) {
            Ok(idx) => groups[idx].count += 1,
            Err(idx) => groups.insert(idx, GroupCount { key, count: 1 }),
        }
    }
    let iter = groups.into_iter().skip(skip);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

fn group_value(row: &Value, field: &str) -> Value {
    path::resolve(row, field).into_iter().next().cloned().unwrap_or(Value::Null)
}

/// Keeps the rows that satisfy `filter`.
pub fn filter_rows(rows: Vec<Value>, filter: &Value) -> Result<Vec<Value>, EngineError> {
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        if matches(&row, filter)? {
            kept.push(row);
        }
    }
    Ok(kept)
}

/// String rendering of a grouped key; tuples are pipe-joined.
pub fn key_to_string(key: &Value) -> String {
    match key {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(key_to_string)
            .collect::<Vec<_>>()
            .join(&COMPOSITE_SEPARATOR.to_string()),
        Value::Object(_) => key.to_string(),
    }
}
