use serde_json::{Map, Value};

use crate::consts::ID_FIELD;

/// Include or exclude projection. Includes win when both are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionBuilder {
    include: Vec<String>,
    exclude: Vec<String>,
    exclude_id: bool,
}

impl ProjectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<S: AsRef<str>>(&mut self, fields: &[S]) -> &mut Self {
        self.include.extend(fields.iter().map(|f| f.as_ref().to_string()));
        self
    }

    pub fn exclude<S: AsRef<str>>(&mut self, fields: &[S]) -> &mut Self {
        self.exclude.extend(fields.iter().map(|f| f.as_ref().to_string()));
        self
    }

    pub fn exclude_id(&mut self) -> &mut Self {
        self.exclude_id = true;
        self
    }

    pub fn included(&self) -> &[String] {
        &self.include
    }

    pub fn excluded(&self) -> &[String] {
        &self.exclude
    }

    pub fn excludes_id(&self) -> bool {
        self.exclude_id
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty() && !self.exclude_id
    }

    /// Mongo-style projection document.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if !self.include.is_empty() {
            for field in &self.include {
                map.insert(field.clone(), Value::from(1));
            }
        } else {
            for field in &self.exclude {
                map.insert(field.clone(), Value::from(0));
            }
        }
        if self.exclude_id {
            map.insert(ID_FIELD.to_string(), Value::from(0));
        }
        Value::Object(map)
    }
}
