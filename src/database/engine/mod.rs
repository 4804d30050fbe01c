//! In-process evaluation of predicate, update and projection documents.
//!
//! The memory store runs entirely on this engine; the Postgres store uses it
//! for read-modify-write updates and for the aggregations that are computed
//! after rows are fetched.

pub mod compare;
pub mod group;
pub mod matcher;
pub mod path;
pub mod project;
pub mod update;

use thiserror::Error;

pub use group::{GroupCount, COMPOSITE_SEPARATOR};
pub use matcher::matches;
pub use project::{project, sort_docs};
pub use update::apply_update;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("unsupported operator {0}")]
    UnsupportedOperator(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("positional operator did not find a match for {0}")]
    PositionalNoMatch(String),
}
