use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortBuilder {
    fields: Vec<(String, SortDirection)>,
}

impl SortBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ascending(&mut self, fields: &[&str]) -> &mut Self {
        for field in fields {
            self.fields.push((field.to_string(), SortDirection::Asc));
        }
        self
    }

    pub fn add_descending(&mut self, fields: &[&str]) -> &mut Self {
        for field in fields {
            self.fields.push((field.to_string(), SortDirection::Desc));
        }
        self
    }

    pub fn add(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.fields.push((field.into(), direction));
        self
    }

    pub fn fields(&self) -> &[(String, SortDirection)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
