use thiserror::Error;

/// Rejections of a list, unique-values or scope request. All are client errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("unsupported operator {0}")]
    UnsupportedOperator(String),

    #[error("value missing range separator {0}")]
    MissingRangeSeparator(String),

    #[error("invalid range value {0}")]
    InvalidRangeValue(String),

    #[error("invalid range must use same value types found {0} {1}")]
    RangeTypeMismatch(&'static str, &'static str),

    #[error("failed to parse field {field} with value {value} into Time type")]
    InvalidTime { field: String, value: String },

    #[error("element match operator is only supported for array fields")]
    ElementMatchOnScalar,

    #[error("invalid element match filters {0}")]
    InvalidElementMatch(Box<QueryError>),

    #[error("invalid sort field {0}")]
    InvalidSortField(String),

    #[error("invalid sort type {0}")]
    InvalidSortType(String),

    #[error("fields are required")]
    FieldsRequired,
}
