//! Compiles Mongo-shaped predicates into SQL/JSON path boolean expressions
//! evaluated with `jsonb_path_match(doc, path, vars)`.
//!
//! Field paths compile to lax-mode accessors, so arrays met along a path are
//! unwrapped the same way the in-process matcher expands them. Operand values
//! travel in the `vars` object; only regex patterns are inlined because
//! `like_regex` requires a literal.

use serde_json::{Map, Value};

use crate::database::engine::EngineError;

/// Outcome of compiling a predicate. Constant results let callers skip the
/// query (`Never`) or the WHERE clause (`Always`).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Never,
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub predicate: Predicate,
    pub vars: Value,
}

pub fn compile(filter: &Value) -> Result<CompiledFilter, EngineError> {
    let mut compiler = Compiler::default();
    let predicate = compiler.document(filter, "$")?;
    Ok(CompiledFilter {
        predicate,
        vars: Value::Object(compiler.vars),
    })
}

#[derive(Default)]
struct Compiler {
    vars: Map<String, Value>,
}

impl Compiler {
    fn var(&mut self, value: &Value) -> String {
        let name = format!("v{}", self.vars.len());
        self.vars.insert(name.clone(), value.clone());
        format!("${}", name)
    }

    fn document(&mut self, filter: &Value, root: &str) -> Result<Predicate, EngineError> {
        let Value::Object(clauses) = filter else {
            return Err(EngineError::InvalidFilter(format!("filter must be an object, got {}", filter)));
        };
        let mut parts = Vec::with_capacity(clauses.len());
        for (key, condition) in clauses {
            parts.push(self.clause(key, condition, root)?);
        }
        Ok(and(parts))
    }

    fn clause_list(&mut self, key: &str, condition: &Value, root: &str) -> Result<Vec<Predicate>, EngineError> {
        let items = condition
            .as_array()
            .ok_or_else(|| EngineError::InvalidFilter(format!("{} requires an array", key)))?;
        items.iter().map(|sub| self.document(sub, root)).collect()
    }

    fn clause(&mut self, key: &str, condition: &Value, root: &str) -> Result<Predicate, EngineError> {
        match key {
            "$and" => Ok(and(self.clause_list(key, condition, root)?)),
            "$or" => Ok(or(self.clause_list(key, condition, root)?)),
            "$nor" => Ok(not(or(self.clause_list(key, condition, root)?))),
            "$not" => Ok(not(self.document(condition, root)?)),
            _ if key.starts_with('$') => Err(EngineError::UnsupportedOperator(key.to_string())),
            _ => {
                let accessor = format!("{}{}", root, accessor(key));
                self.condition(&accessor, condition)
            }
        }
    }

    fn condition(&mut self, acc: &str, condition: &Value) -> Result<Predicate, EngineError> {
        match operator_doc(condition) {
            Some(operators) => {
                let mut parts = Vec::with_capacity(operators.len());
                for (op, operand) in operators {
                    parts.push(self.operator(acc, op, operand, operators)?);
                }
                Ok(and(parts))
            }
            None => self.equality(acc, condition),
        }
    }

    fn equality(&mut self, acc: &str, value: &Value) -> Result<Predicate, EngineError> {
        match value {
            Value::Null => {
                let var = self.var(value);
                Ok(or(vec![
                    not(Predicate::Expr(format!("exists({})", acc))),
                    Predicate::Expr(format!("exists({} ? (@ == {}))", acc, var)),
                ]))
            }
            Value::Array(_) | Value::Object(_) => Err(EngineError::InvalidFilter(format!(
                "equality on composite value {} is not supported by this store",
                value
            ))),
            _ => {
                let var = self.var(value);
                Ok(Predicate::Expr(format!("exists({} ? (@ == {}))", acc, var)))
            }
        }
    }

    fn compare(&mut self, acc: &str, op: &str, value: &Value) -> Predicate {
        let var = self.var(value);
        Predicate::Expr(format!("exists({} ? (@ {} {}))", acc, op, var))
    }

    fn operator(
        &mut self,
        acc: &str,
        op: &str,
        operand: &Value,
        siblings: &Map<String, Value>,
    ) -> Result<Predicate, EngineError> {
        match op {
            "$eq" => self.equality(acc, operand),
            "$ne" => Ok(not(self.equality(acc, operand)?)),
            "$gt" => Ok(self.compare(acc, ">", operand)),
            "$gte" => Ok(self.compare(acc, ">=", operand)),
            "$lt" => Ok(self.compare(acc, "<", operand)),
            "$lte" => Ok(self.compare(acc, "<=", operand)),
            "$in" | "$nin" => {
                let options = operand
                    .as_array()
                    .ok_or_else(|| EngineError::InvalidFilter(format!("{} requires an array", op)))?;
                let mut parts = Vec::with_capacity(options.len());
                for option in options {
                    parts.push(self.equality(acc, option)?);
                }
                let any = or(parts);
                Ok(if op == "$in" { any } else { not(any) })
            }
            "$exists" => {
                let present = Predicate::Expr(format!("exists({})", acc));
                Ok(if operand.as_bool().unwrap_or(true) { present } else { not(present) })
            }
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| EngineError::InvalidFilter("$regex requires a string".to_string()))?;
                let flags: String = siblings
                    .get("$options")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .chars()
                    .filter(|c| matches!(c, 'i' | 'm' | 's'))
                    .collect();
                let mut expr = format!("@ like_regex {}", string_literal(pattern));
                if !flags.is_empty() {
                    expr.push_str(&format!(" flag {}", string_literal(&flags)));
                }
                Ok(Predicate::Expr(format!("exists({} ? ({}))", acc, expr)))
            }
            "$options" => Ok(Predicate::Always),
            "$elemMatch" => {
                let inner = if operator_doc(operand).is_some() {
                    self.condition("@", operand)?
                } else {
                    self.document(operand, "@")?
                };
                Ok(match inner {
                    Predicate::Never => Predicate::Never,
                    Predicate::Always => Predicate::Expr(format!("exists({}[*])", acc)),
                    Predicate::Expr(e) => Predicate::Expr(format!("exists({}[*] ? ({}))", acc, e)),
                })
            }
            "$size" => {
                let var = self.var(operand);
                Ok(Predicate::Expr(format!(
                    "({acc}.type() == \"array\" && {acc}.size() == {var})",
                    acc = acc,
                    var = var
                )))
            }
            "$not" => Ok(not(self.condition(acc, operand)?)),
            _ => Err(EngineError::UnsupportedOperator(op.to_string())),
        }
    }
}

fn operator_doc(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => Some(map),
        _ => None,
    }
}

/// `a.b` becomes `."a"."b"`.
fn accessor(field: &str) -> String {
    field
        .split('.')
        .map(|segment| format!(".{}", string_literal(segment)))
        .collect()
}

/// JSON string escaping is accepted by the jsonpath lexer.
fn string_literal(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn and(parts: Vec<Predicate>) -> Predicate {
    let mut exprs = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Predicate::Never => return Predicate::Never,
            Predicate::Always => {}
            Predicate::Expr(e) => exprs.push(e),
        }
    }
    join(exprs, " && ", Predicate::Always)
}

fn or(parts: Vec<Predicate>) -> Predicate {
    let mut exprs = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Predicate::Always => return Predicate::Always,
            Predicate::Never => {}
            Predicate::Expr(e) => exprs.push(e),
        }
    }
    join(exprs, " || ", Predicate::Never)
}

fn join(mut exprs: Vec<String>, separator: &str, empty: Predicate) -> Predicate {
    match exprs.len() {
        0 => empty,
        1 => Predicate::Expr(exprs.remove(0)),
        _ => Predicate::Expr(format!("({})", exprs.join(separator))),
    }
}

fn not(part: Predicate) -> Predicate {
    match part {
        Predicate::Always => Predicate::Never,
        Predicate::Never => Predicate::Always,
        Predicate::Expr(e) => Predicate::Expr(format!("!({})", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expr(filter: Value) -> (String, Value) {
        let compiled = compile(&filter).unwrap();
        match compiled.predicate {
            Predicate::Expr(e) => (e, compiled.vars),
            other => panic!("expected expression, got {:?}", other),
        }
    }

    #[test]
    fn equality_binds_values() {
        let (e, vars) = expr(json!({"customers": "t1", "name": "a"}));
        assert_eq!(
            e,
            r#"(exists($."customers" ? (@ == $v0)) && exists($."name" ? (@ == $v1)))"#
        );
        assert_eq!(vars, json!({"v0": "t1", "v1": "a"}));
    }

    #[test]
    fn empty_filter_is_always_and_empty_in_is_never() {
        assert_eq!(compile(&json!({})).unwrap().predicate, Predicate::Always);
        assert_eq!(compile(&json!({"a": {"$in": []}})).unwrap().predicate, Predicate::Never);
        assert_eq!(compile(&json!({"a": {"$nin": []}})).unwrap().predicate, Predicate::Always);
    }

    #[test]
    fn not_equal_and_missing() {
        let (e, _) = expr(json!({"a": {"$exists": true, "$ne": null}}));
        assert_eq!(
            e,
            r#"(exists($."a") && !((!(exists($."a")) || exists($."a" ? (@ == $v0)))))"#
        );
    }

    #[test]
    fn element_match_scopes_to_one_element() {
        let (e, vars) = expr(json!({"relatedObjects": {"$elemMatch": {"cveID": "cve1", "severity": "critical"}}}));
        assert_eq!(
            e,
            r#"exists($."relatedObjects"[*] ? ((exists(@."cveID" ? (@ == $v0)) && exists(@."severity" ? (@ == $v1)))))"#
        );
        assert_eq!(vars, json!({"v0": "cve1", "v1": "critical"}));
    }

    #[test]
    fn regex_is_inlined_with_flags() {
        let (e, vars) = expr(json!({"name": {"$regex": "be\"z", "$options": "i"}}));
        assert_eq!(e, r#"exists($."name" ? (@ like_regex "be\"z" flag "i"))"#);
        assert_eq!(vars, json!({}));
    }

    #[test]
    fn time_window_binds_fixed_width_bound() {
        use crate::query::{v2_list_find_options, V2ListRequest};
        use crate::schema::SchemaInfo;

        let request = V2ListRequest {
            since: Some("2024-01-01T02:00:00.2+02:00".parse().unwrap()),
            ..Default::default()
        };
        let schema = SchemaInfo::new().with_timestamp_field("updatedTime");
        let opts = v2_list_find_options(&request, &schema, 150).unwrap();
        let (e, vars) = expr(opts.filter().build());
        assert_eq!(e, r#"exists($."updatedTime" ? (@ >= $v0))"#);
        assert_eq!(vars, json!({"v0": "2024-01-01T00:00:00.200000000Z"}));
    }

    #[test]
    fn unsupported_operator_fails() {
        assert!(compile(&json!({"a": {"$near": 1}})).is_err());
        assert!(compile(&json!({"$where": "1"})).is_err());
    }
}
