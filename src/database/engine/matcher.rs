use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::compare::{compare_same_kind, values_equal};
use super::path::resolve;
use super::EngineError;

/// Evaluates a predicate document against a stored document.
pub fn matches(doc: &Value, filter: &Value) -> Result<bool, EngineError> {
    let Value::Object(clauses) = filter else {
        return Err(EngineError::InvalidFilter(format!("filter must be an object, got {}", filter)));
    };
    for (key, condition) in clauses {
        if !match_clause(doc, key, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn match_clause(doc: &Value, key: &str, condition: &Value) -> Result<bool, EngineError> {
    match key {
        "$and" => {
            for sub in as_clause_list(key, condition)? {
                if !matches(doc, sub)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "$or" => {
            for sub in as_clause_list(key, condition)? {
                if matches(doc, sub)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        "$nor" => {
            for sub in as_clause_list(key, condition)? {
                if matches(doc, sub)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "$not" => Ok(!matches(doc, condition)?),
        _ if key.starts_with('$') => Err(EngineError::UnsupportedOperator(key.to_string())),
        _ => {
            let candidates = resolve(doc, key);
            match_candidates(&candidates, condition)
        }
    }
}

fn as_clause_list<'a>(key: &str, condition: &'a Value) -> Result<&'a Vec<Value>, EngineError> {
    condition
        .as_array()
        .ok_or_else(|| EngineError::InvalidFilter(format!("{} requires an array", key)))
}

fn is_operator_doc(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => Some(map),
        _ => None,
    }
}

/// Applies a field condition to every value the path resolved to.
pub fn match_candidates(candidates: &[&Value], condition: &Value) -> Result<bool, EngineError> {
    match is_operator_doc(condition) {
        Some(operators) => {
            for (op, operand) in operators {
                if !apply_operator(candidates, op, operand, operators)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        None => Ok(equals_any(candidates, condition)),
    }
}

fn equals_any(candidates: &[&Value], expected: &Value) -> bool {
    if expected.is_null() && candidates.is_empty() {
        return true;
    }
    candidates.iter().any(|candidate| {
        values_equal(candidate, expected)
            || candidate
                .as_array()
                .map(|items| items.iter().any(|item| values_equal(item, expected)))
                .unwrap_or(false)
    })
}

/// Candidates plus the elements of any array candidate.
fn expanded<'a>(candidates: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        out.push(*candidate);
        if let Value::Array(items) = candidate {
            out.extend(items.iter());
        }
    }
    out
}

fn compare_any(candidates: &[&Value], operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    expanded(candidates)
        .into_iter()
        .filter(|c| !c.is_array())
        .any(|c| compare_same_kind(c, operand).map(accept).unwrap_or(false))
}

fn apply_operator(
    candidates: &[&Value],
    op: &str,
    operand: &Value,
    siblings: &Map<String, Value>,
) -> Result<bool, EngineError> {
    match op {
        "$eq" => Ok(equals_any(candidates, operand)),
        "$ne" => Ok(!equals_any(candidates, operand)),
        "$gt" => Ok(compare_any(candidates, operand, |o| o == Ordering::Greater)),
        "$gte" => Ok(compare_any(candidates, operand, |o| o != Ordering::Less)),
        "$lt" => Ok(compare_any(candidates, operand, |o| o == Ordering::Less)),
        "$lte" => Ok(compare_any(candidates, operand, |o| o != Ordering::Greater)),
        "$in" => {
            let options = operand
                .as_array()
                .ok_or_else(|| EngineError::InvalidFilter("$in requires an array".to_string()))?;
            Ok(options.iter().any(|option| equals_any(candidates, option)))
        }
        "$nin" => {
            let options = operand
                .as_array()
                .ok_or_else(|| EngineError::InvalidFilter("$nin requires an array".to_string()))?;
            Ok(!options.iter().any(|option| equals_any(candidates, option)))
        }
        "$exists" => {
            let wanted = operand.as_bool().unwrap_or(true);
            Ok(candidates.is_empty() != wanted)
        }
        "$regex" => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| EngineError::InvalidFilter("$regex requires a string".to_string()))?;
            let options = siblings.get("$options").and_then(Value::as_str).unwrap_or("");
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(options.contains('i'))
                .multi_line(options.contains('m'))
                .dot_matches_new_line(options.contains('s'))
                .build()
                .map_err(|e| EngineError::InvalidFilter(format!("invalid regex {}: {}", pattern, e)))?;
            Ok(expanded(candidates)
                .into_iter()
                .any(|c| c.as_str().map(|s| regex.is_match(s)).unwrap_or(false)))
        }
        // consumed by $regex
        "$options" => Ok(true),
        "$elemMatch" => {
            for candidate in candidates {
                let Value::Array(items) = candidate else { continue };
                for item in items {
                    if element_matches(item, operand)? {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        }
        "$size" => {
            let wanted = operand.as_u64().unwrap_or(u64::MAX);
            Ok(candidates
                .iter()
                .any(|c| c.as_array().map(|a| a.len() as u64 == wanted).unwrap_or(false)))
        }
        "$not" => Ok(!match_candidates(candidates, operand)?),
        _ => Err(EngineError::UnsupportedOperator(op.to_string())),
    }
}

fn element_matches(item: &Value, condition: &Value) -> Result<bool, EngineError> {
    if is_operator_doc(condition).is_some() {
        return match_candidates(&[item], condition);
    }
    match item {
        Value::Object(_) => matches(item, condition),
        _ => Ok(false),
    }
}

/// Used by `$pull`: does an array element satisfy the pull condition.
pub fn element_satisfies(item: &Value, condition: &Value) -> Result<bool, EngineError> {
    if is_operator_doc(condition).is_some() {
        return match_candidates(&[item], condition);
    }
    if condition.is_object() && item.is_object() {
        return matches(item, condition);
    }
    Ok(values_equal(item, condition))
}
