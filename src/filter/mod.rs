pub mod builder;
pub mod error;
pub mod find_options;
pub mod projection;
pub mod scalar;
pub mod sort;
pub mod update;

pub use builder::FilterBuilder;
pub use error::FilterError;
pub use find_options::FindOptions;
pub use projection::ProjectionBuilder;
pub use scalar::ScalarValue;
pub use sort::{SortBuilder, SortDirection};
