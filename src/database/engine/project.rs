use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::compare::total_cmp;
use super::path;
use crate::consts::{GUID_FIELD, ID_FIELD};
use crate::filter::{ProjectionBuilder, SortBuilder, SortDirection};

/// Shapes a document per the projection. Include projections always keep the
/// identifier fields unless the id is excluded explicitly.
pub fn project(doc: &Value, projection: &ProjectionBuilder) -> Value {
    if projection.is_empty() {
        return doc.clone();
    }

    if !projection.included().is_empty() {
        let mut out = Value::Object(Map::new());
        if !projection.excludes_id() {
            for id_field in [ID_FIELD, GUID_FIELD] {
                if let Some(value) = path::get(doc, id_field) {
                    path::set(&mut out, id_field, value.clone());
                }
            }
        }
        for field in projection.included() {
            copy_path(doc, &mut out, field);
        }
        return out;
    }

    let mut out = doc.clone();
    for field in projection.excluded() {
        remove_everywhere(&mut out, field);
    }
    if projection.excludes_id() {
        path::remove(&mut out, ID_FIELD);
    }
    out
}

/// Copies `field` into `out`, mapping over arrays met along the way.
fn copy_path(src: &Value, out: &mut Value, field: &str) {
    let (head, rest) = match field.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (field, None),
    };
    let Some(value) = src.get(head) else { return };
    let Value::Object(out_map) = out else { return };

    match (rest, value) {
        (None, _) => {
            out_map.insert(head.to_string(), value.clone());
        }
        (Some(rest), Value::Object(_)) => {
            let slot = out_map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            copy_path(value, slot, rest);
        }
        (Some(rest), Value::Array(items)) => {
            let existing = out_map.remove(head);
            let mut projected: Vec<Value> = match existing {
                Some(Value::Array(prev)) if prev.len() == items.len() => prev,
                _ => items.iter().map(|_| Value::Object(Map::new())).collect(),
            };
            for (item, slot) in items.iter().zip(projected.iter_mut()) {
                if item.is_object() {
                    copy_path(item, slot, rest);
                }
            }
            out_map.insert(head.to_string(), Value::Array(projected));
        }
        _ => {}
    }
}

fn remove_everywhere(doc: &mut Value, field: &str) {
    let (head, rest) = match field.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (field, None),
    };
    match doc {
        Value::Object(map) => match rest {
            None => {
                map.remove(head);
            }
            Some(rest) => {
                if let Some(child) = map.get_mut(head) {
                    remove_everywhere(child, rest);
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                remove_everywhere(item, field);
            }
        }
        _ => {}
    }
}

static NULL: Value = Value::Null;

/// Sort key of one document: first value the path resolves to.
fn sort_key<'a>(doc: &'a Value, field: &str) -> &'a Value {
    path::resolve(doc, field).into_iter().next().unwrap_or(&NULL)
}

pub fn compare_docs(a: &Value, b: &Value, sort: &SortBuilder) -> Ordering {
    for (field, direction) in sort.fields() {
        let ordering = total_cmp(sort_key(a, field), sort_key(b, field));
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

pub fn sort_docs(docs: &mut [Value], sort: &SortBuilder) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| compare_docs(a, b, sort));
}
