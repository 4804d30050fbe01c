//! Translation of client query envelopes into `FindOptions`.

pub mod error;
pub mod scope;
pub mod v2;

pub use error::QueryError;
pub use scope::{query_params_to_filter, QueryConfig, QueryParamsConfig};
pub use v2::{unique_values_find_options, v2_list_find_options, UniqueValuesRequest, V2ListRequest};

/// Largest page a list or unique-values request may ask for.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 150;
