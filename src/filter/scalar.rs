use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// A query value after schema-driven coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

impl ScalarValue {
    /// Integer (with `0x`/`0o`/`0b` prefixes), then finite float, then bool,
    /// else string.
    pub fn infer(raw: &str) -> Self {
        if let Some(i) = parse_int_auto_base(raw) {
            return ScalarValue::Integer(i);
        }
        if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
            return ScalarValue::Float(f);
        }
        if let Some(b) = parse_bool(raw) {
            return ScalarValue::Boolean(b);
        }
        ScalarValue::String(raw.to_string())
    }

    pub fn parse_date(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|d| ScalarValue::Date(d.with_timezone(&Utc)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScalarValue::String(_) => "string",
            ScalarValue::Integer(_) => "integer",
            ScalarValue::Float(_) => "float",
            ScalarValue::Boolean(_) => "boolean",
            ScalarValue::Date(_) => "date",
        }
    }

    pub fn same_kind(&self, other: &ScalarValue) -> bool {
        self.kind() == other.kind()
    }

    pub fn to_value(&self) -> Value {
        match self {
            ScalarValue::String(s) => Value::String(s.clone()),
            ScalarValue::Integer(i) => Value::from(*i),
            ScalarValue::Float(f) => Value::from(*f),
            ScalarValue::Boolean(b) => Value::Bool(*b),
            ScalarValue::Date(d) => Value::String(format_date(d)),
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(value: ScalarValue) -> Self {
        value.to_value()
    }
}

/// Canonical stored form of dates: RFC 3339 in UTC with all nine fraction
/// digits. Every formatted date has the same width, so comparing the
/// strings orders them in time.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Integer parse where the base comes from the literal's prefix. A bare
/// leading zero means octal.
pub fn parse_int_auto_base(raw: &str) -> Option<i64> {
    let (negative, body) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    if body.is_empty() {
        return None;
    }

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest.to_string())
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest.to_string())
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, lower[1..].to_string())
    } else {
        (10, lower)
    };

    // underscores are only legal between digits when a base prefix is used
    let digits = if radix != 10 { digits.replace('_', "") } else { digits };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i128::from_str_radix(&digits, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}
