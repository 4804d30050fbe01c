use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{CollectionContext, RequestContext};
use crate::error::ApiError;

/// Decoded `key=value` pairs of a raw query string, in order.
pub fn query_pairs(raw: Option<String>) -> Vec<(String, String)> {
    raw.map(|raw| {
        url::form_urlencoded::parse(raw.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    })
    .unwrap_or_default()
}

/// Whether the parameter is present, even without a value.
pub fn has_param(pairs: &[(String, String)], name: &str) -> bool {
    pairs.iter().any(|(key, _)| key == name)
}

/// First non-empty value of the parameter.
pub fn query_value<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.as_str())
}

/// Every non-empty value of a repeated parameter.
pub fn query_values(pairs: &[(String, String)], name: &str) -> Vec<String> {
    pairs
        .iter()
        .filter(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.clone())
        .collect()
}

/// Parsed JSON body, `None` when the body is blank.
pub fn json_body(body: &Bytes) -> Result<Option<Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::invalid_json(format!("failed to decode request body: {}", e)))
}

/// Typed request body; a blank body is the type's default.
pub fn typed_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    match json_body(body)? {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| ApiError::invalid_json(format!("failed to decode request body: {}", e)))
        }
        None => Ok(T::default()),
    }
}

/// Documents carried by a write request: a single object or an array of
/// objects, unless the collection decodes bodies itself.
pub fn decode_documents(
    request: &RequestContext,
    collection: &CollectionContext,
    body: Value,
) -> Result<Vec<Value>, ApiError> {
    if let Some(decoder) = collection.body_decoder {
        return decoder(request, body);
    }
    match body {
        Value::Object(_) => Ok(vec![body]),
        Value::Array(items) => {
            if items.iter().any(|item| !item.is_object()) {
                return Err(ApiError::bad_request("documents must be JSON objects"));
            }
            Ok(items)
        }
        _ => Err(ApiError::bad_request("request body must be a JSON object or array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_pairs_decode_and_keep_repeats() {
        let pairs = query_pairs(Some("guid=a&guid=b&list&name=x%20y".to_string()));
        assert_eq!(query_values(&pairs, "guid"), vec!["a", "b"]);
        assert!(has_param(&pairs, "list"));
        assert_eq!(query_value(&pairs, "list"), None);
        assert_eq!(query_value(&pairs, "name"), Some("x y"));
        assert!(query_pairs(None).is_empty());
    }

    #[test]
    fn blank_body_is_absent() {
        assert_eq!(json_body(&Bytes::from_static(b"  \n")).unwrap(), None);
        assert_eq!(json_body(&Bytes::from_static(b"[1]")).unwrap(), Some(json!([1])));
        let err = json_body(&Bytes::from_static(b"{oops")).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
