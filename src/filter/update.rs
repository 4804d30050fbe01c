use serde_json::{json, Map, Value};

use super::error::FilterError;

/// Builds a `$set` command from a partial document. Nested objects are
/// flattened to dotted paths; arrays are set whole. Excluded keys are dropped
/// first, then only keys starting with one of `include_fields` survive (when
/// any are given).
pub fn get_update_doc_command<S: AsRef<str>>(
    doc: &Value,
    include_fields: &[S],
    exclude_fields: &[S],
) -> Result<Value, FilterError> {
    let object = doc.as_object().ok_or(FilterError::InvalidDocument)?;

    let mut flat = Map::new();
    flatten_into(&mut flat, "", object);

    for field in exclude_fields {
        flat.remove(field.as_ref());
    }
    if !include_fields.is_empty() {
        flat.retain(|key, _| include_fields.iter().any(|f| key.starts_with(f.as_ref())));
    }
    if flat.is_empty() {
        return Err(FilterError::NoFieldsToUpdate);
    }
    Ok(json!({ "$set": flat }))
}

fn flatten_into(out: &mut Map<String, Value>, prefix: &str, object: &Map<String, Value>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, &path, inner),
            _ => {
                out.insert(path, value.clone());
            }
        }
    }
}

pub fn add_to_set_command(field: &str, mut values: Vec<Value>) -> Value {
    let value = if values.len() == 1 {
        values.remove(0)
    } else {
        json!({ "$each": values })
    };
    json!({ "$addToSet": { field: value } })
}

pub fn pull_command(field: &str, values: Vec<Value>) -> Value {
    json!({ "$pull": { field: { "$in": values } } })
}

pub fn set_field_command(field: &str, value: Value) -> Value {
    json!({ "$set": { field: value } })
}

pub fn unset_field_command(field: &str) -> Value {
    json!({ "$unset": { field: "" } })
}
