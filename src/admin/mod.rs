//! Cross-tenant operations under `/admin`. Every route here runs behind the
//! tenant and admin middleware.

pub mod collections;
pub mod customers;
pub mod severity;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/activeCustomers", get(customers::active_customers))
        .route(
            "/admin/customers",
            get(customers::find_customers).delete(customers::delete_customers),
        )
        .route(
            "/admin/updateVulnerabilityExceptionsSeverity",
            put(severity::update_vulnerability_exceptions),
        )
        .route(
            "/admin/updatePostureExceptionsSeverity",
            put(severity::update_posture_exceptions),
        )
        .route(
            "/admin/:path/query",
            post(collections::query).delete(collections::delete_by_query),
        )
        .route("/admin/:path/uniqueValues", post(collections::unique_values))
}
