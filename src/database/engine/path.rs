use serde_json::{Map, Value};

/// Resolves a dotted path the way a document store does for queries: arrays
/// met on the way are traversed element-wise, and numeric segments also
/// index into them. Terminal arrays are returned as-is.
pub fn resolve<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    resolve_into(doc, &segments, &mut out);
    out
}

fn resolve_into<'a>(current: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(current);
        return;
    };
    match current {
        Value::Object(map) => {
            if let Some(next) = map.get(*head) {
                resolve_into(next, rest, out);
            }
        }
        Value::Array(items) => {
            if let Ok(idx) = head.parse::<usize>() {
                if let Some(next) = items.get(idx) {
                    resolve_into(next, rest, out);
                }
            }
            for item in items {
                if item.is_object() {
                    resolve_into(item, segments, out);
                }
            }
        }
        _ => {}
    }
}

/// Strict lookup: objects by key, arrays only by numeric index.
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn get_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets `value` at `path`, creating intermediate objects. Returns false when
/// an existing scalar blocks the path.
pub fn set(doc: &mut Value, path: &str, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };
    let mut current = doc;
    for segment in parents {
        current = match current {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return false,
            },
            _ => return false,
        };
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
    }
    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

pub fn remove(doc: &mut Value, path: &str) -> Option<Value> {
    let (parent_path, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    };
    let parent = match parent_path {
        Some(p) => get_mut(doc, p)?,
        None => doc,
    };
    match parent {
        Value::Object(map) => map.remove(last),
        // unsetting an array slot leaves a null in place
        Value::Array(items) => {
            let slot = items.get_mut(last.parse::<usize>().ok()?)?;
            Some(std::mem::replace(slot, Value::Null))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_traverses_arrays() {
        let doc = json!({"related": [{"id": "a"}, {"id": "b"}, {"other": 1}]});
        let found: Vec<&Value> = resolve(&doc, "related.id");
        assert_eq!(found, vec![&json!("a"), &json!("b")]);
        assert_eq!(resolve(&doc, "related.1.id"), vec![&json!("b")]);
        assert!(resolve(&doc, "missing.id").is_empty());
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({"a": 1});
        assert!(set(&mut doc, "b.c.d", json!(true)));
        assert_eq!(doc, json!({"a": 1, "b": {"c": {"d": true}}}));
        assert!(!set(&mut doc, "a.x", json!(1)));
    }

    #[test]
    fn remove_returns_old_value() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(remove(&mut doc, "a.b"), Some(json!(1)));
        assert_eq!(doc, json!({"a": {"c": 2}}));
        assert_eq!(remove(&mut doc, "a.zzz"), None);
    }
}
