use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;

/// Parses RFC 3339 timestamps so stored dates compare chronologically even
/// when their textual precision differs.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    // cheap pre-check before attempting a full parse
    if s.len() < 20 || s.as_bytes().get(4) != Some(&b'-') {
        return None;
    }
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

/// Equality with numeric and date normalisation.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::String(x), Value::String(y)) => {
            if x == y {
                return true;
            }
            match (as_date(a), as_date(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map(|o| values_equal(v, o)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Ordering between values of the same kind; `None` when not comparable.
pub fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (as_date(a), as_date(b)) {
            (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order used for sorting and grouping: null < numbers < strings <
/// objects < arrays < booleans.
pub fn total_cmp(a: &Value, b: &Value) -> Ordering {
    if let Some(ordering) = compare_same_kind(a, b) {
        return ordering;
    }
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ordering = total_cmp(l, r);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y) {
                let ordering = lk.cmp(rk).then_with(|| total_cmp(lv, rv));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::scalar::format_date;
    use serde_json::json;

    #[test]
    fn numbers_compare_across_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert_eq!(compare_same_kind(&json!(2), &json!(10)), Some(Ordering::Less));
    }

    #[test]
    fn dates_compare_chronologically() {
        let a = json!("2023-01-01T10:00:00.5Z");
        let b = json!("2023-01-01T10:00:00.123456789Z");
        assert_eq!(compare_same_kind(&a, &b), Some(Ordering::Greater));
        assert!(values_equal(&json!("2023-01-01T10:00:00Z"), &json!("2023-01-01T12:00:00+02:00")));
    }

    #[test]
    fn stored_dates_order_like_their_text() {
        let times = ["2024-01-01T00:00:00.5Z", "2024-01-01T00:00:00Z", "2024-01-01T00:00:00.2Z"];
        let mut stored: Vec<Value> = times
            .iter()
            .map(|t| json!(format_date(&DateTime::parse_from_rfc3339(t).unwrap().with_timezone(&Utc))))
            .collect();
        let mut by_text = stored.clone();
        by_text.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        stored.sort_by(total_cmp);
        assert_eq!(stored, by_text);
        assert_eq!(stored[0], "2024-01-01T00:00:00.000000000Z");

        // a lower bound between two stored values splits them the same way
        let since = json!("2024-01-01T00:00:00.200000000Z");
        let kept: Vec<&Value> = stored
            .iter()
            .filter(|v| compare_same_kind(v, &since) != Some(Ordering::Less))
            .collect();
        assert!(kept.iter().all(|v| v.as_str() >= since.as_str()));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn mixed_kinds_are_not_comparable() {
        assert_eq!(compare_same_kind(&json!("1"), &json!(1)), None);
        assert_eq!(total_cmp(&Value::Null, &json!(1)), Ordering::Less);
        assert_eq!(total_cmp(&json!("a"), &json!(1)), Ordering::Greater);
    }
}
