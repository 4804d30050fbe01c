use serde_json::{json, Map, Value};

use crate::consts::{CUSTOMERS_COLLECTION, CUSTOMERS_FIELD, ID_FIELD, NAME_FIELD};

/// Fluent builder for Mongo-shaped document predicates.
///
/// Entries keep their insertion order. Repeated keys are legal while building;
/// `build()` folds them into a conjunction unless `wrap_dup_keys_with_or` was
/// applied first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterBuilder {
    entries: Vec<(String, Value)>,
    customer_is_id: bool,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    fn push(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    /// On the tenant registry the id doubles as the tenant key, so a later id
    /// clause replaces the tenant clause instead of narrowing it.
    fn push_id(mut self, value: Value) -> Self {
        if self.customer_is_id {
            if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == ID_FIELD) {
                entry.1 = value;
                return self;
            }
        }
        self.push(ID_FIELD, value)
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.push_id(Value::String(id.into()))
    }

    pub fn with_ids<S: AsRef<str>>(self, ids: &[S]) -> Self {
        let ids: Vec<&str> = ids.iter().map(|s| s.as_ref()).collect();
        self.push_id(json!({ "$in": ids }))
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.push(NAME_FIELD, Value::String(name.into()))
    }

    pub fn with_global(self) -> Self {
        self.push(CUSTOMERS_FIELD, Value::String(String::new()))
    }

    /// Scope to one tenant. On the tenant registry the tenant is the document id.
    pub fn with_customer(mut self, collection: &str, tenant: &str) -> Self {
        if collection == CUSTOMERS_COLLECTION {
            self.customer_is_id = true;
            return self.with_id(tenant);
        }
        self.push(CUSTOMERS_FIELD, Value::String(tenant.to_string()))
    }

    pub fn with_customer_and_global(self, tenant: &str) -> Self {
        self.push(CUSTOMERS_FIELD, json!({ "$in": [tenant, ""] }))
    }

    pub fn with_customers<S: AsRef<str>>(self, tenants: &[S]) -> Self {
        let tenants: Vec<&str> = tenants.iter().map(|s| s.as_ref()).collect();
        self.push(CUSTOMERS_FIELD, json!({ "$in": tenants }))
    }

    pub fn with_value(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value.into())
    }

    pub fn with_equal(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, json!({ "$eq": value.into() }))
    }

    pub fn with_not_equal(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, json!({ "$ne": value.into() }))
    }

    pub fn with_in(self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.push(key, json!({ "$in": values }))
    }

    pub fn with_not_in(self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.push(key, json!({ "$nin": values }))
    }

    pub fn with_greater_than_equal(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, json!({ "$gte": value.into() }))
    }

    pub fn with_lower_than_equal(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, json!({ "$lte": value.into() }))
    }

    pub fn with_range(self, key: impl Into<String>, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.push(key, json!({ "$gte": min.into(), "$lte": max.into() }))
    }

    pub fn with_regex(self, key: impl Into<String>, pattern: impl Into<String>, ignore_case: bool) -> Self {
        let mut regex = Map::new();
        regex.insert("$regex".to_string(), Value::String(pattern.into()));
        if ignore_case {
            regex.insert("$options".to_string(), Value::String("i".to_string()));
        }
        self.push(key, Value::Object(regex))
    }

    /// `true` requires a present, non-null value; `false` accepts absent or null.
    pub fn add_exists(self, key: impl Into<String>, exists: bool) -> Self {
        let key = key.into();
        if exists {
            return self.push(key, json!({ "$exists": true, "$ne": null }));
        }
        let missing = vec![
            single(key.clone(), json!({ "$exists": false })),
            single(key, Value::Null),
        ];
        self.push("$or", Value::Array(missing))
    }

    pub fn add_or(self, filters: Vec<FilterBuilder>) -> Self {
        let clauses: Vec<Value> = filters.iter().map(FilterBuilder::build).collect();
        self.push("$or", Value::Array(clauses))
    }

    /// Replaces the current entries with a conjunction of `filters`.
    pub fn add_and(mut self, filters: Vec<FilterBuilder>) -> Self {
        let clauses: Vec<Value> = filters.iter().map(FilterBuilder::build).collect();
        self.entries = vec![("$and".to_string(), Value::Array(clauses))];
        self
    }

    pub fn warp_element_match(mut self) -> Self {
        let inner = self.build();
        self.entries = vec![("$elemMatch".to_string(), inner)];
        self
    }

    /// Every entry becomes its own alternative.
    pub fn warp_or(mut self) -> Self {
        let alternatives: Vec<Value> = self
            .entries
            .drain(..)
            .map(|(k, v)| single(k, v))
            .collect();
        self.entries = vec![("$or".to_string(), Value::Array(alternatives))];
        self
    }

    pub fn warp_not(mut self) -> Self {
        let inner = self.build();
        self.entries = vec![("$not".to_string(), inner)];
        self
    }

    pub fn warp_with_field(mut self, field: impl Into<String>) -> Self {
        let inner = self.build();
        self.entries = vec![(field.into(), inner)];
        self
    }

    /// Folds repeated field keys into a disjunction of their clauses.
    pub fn wrap_dup_keys_with_or(mut self) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut groups: Vec<Vec<Value>> = Vec::new();
        let mut operators: Vec<(String, Value)> = Vec::new();

        for (key, value) in self.entries.drain(..) {
            if key.starts_with('$') {
                operators.push((key, value));
                continue;
            }
            match order.iter().position(|k| *k == key) {
                Some(idx) => groups[idx].push(value),
                None => {
                    order.push(key);
                    groups.push(vec![value]);
                }
            }
        }

        for (key, mut values) in order.into_iter().zip(groups) {
            if values.len() == 1 {
                if let Some(value) = values.pop() {
                    self.entries.push((key, value));
                }
                continue;
            }
            let alternatives = values.into_iter().map(|v| single(key.clone(), v)).collect();
            self.entries.push(("$or".to_string(), Value::Array(alternatives)));
        }
        self.entries.extend(operators);
        self
    }

    /// Appends every entry of `other`.
    pub fn with_filter(mut self, other: FilterBuilder) -> Self {
        self.entries.extend(other.entries);
        self.customer_is_id |= other.customer_is_id;
        self
    }

    /// Serializes into a predicate document. Keys that still repeat are
    /// combined under `$and`.
    pub fn build(&self) -> Value {
        let mut map = Map::new();
        let mut repeated: Vec<Value> = Vec::new();
        for (key, value) in &self.entries {
            if map.contains_key(key) {
                repeated.push(single(key.clone(), value.clone()));
            } else {
                map.insert(key.clone(), value.clone());
            }
        }
        if repeated.is_empty() {
            return Value::Object(map);
        }
        let mut clauses = vec![Value::Object(map)];
        clauses.extend(repeated);
        json!({ "$and": clauses })
    }
}

fn single(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}
