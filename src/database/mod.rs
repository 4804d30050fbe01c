pub mod access;
pub mod engine;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod results;
pub mod store;

pub use access::{DataAccess, DbError, Scope};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use results::{AggResult, SearchResult, UniqueValuesResponse};
pub use store::{DocumentStore, IndexSpec, StoreQuery, UpdateResult};
