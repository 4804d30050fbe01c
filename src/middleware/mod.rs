pub mod admin;
pub mod response;
pub mod tenant;

pub use admin::admin_middleware;
pub use response::{ApiResponse, ApiResult};
pub use tenant::tenant_middleware;
