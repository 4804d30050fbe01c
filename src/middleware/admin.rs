use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::context::RequestContext;
use crate::state::AppState;

/// Lets a request through when the cookie granted admin access or the tenant
/// is listed in `security.admin_users`. Runs after `tenant_middleware`.
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    let allowed = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| is_admin(context, &state.config.security.admin_users))
        .unwrap_or(false);
    if !allowed {
        tracing::warn!(path = %request.uri().path(), "admin route rejected");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized - not an admin user"})),
        ));
    }
    Ok(next.run(request).await)
}

pub fn is_admin(context: &RequestContext, admin_users: &[String]) -> bool {
    context.admin || admin_users.iter().any(|user| *user == context.tenant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_flag_or_listed_tenant() {
        let admins = vec!["root-tenant".to_string()];
        assert!(is_admin(&RequestContext::new("t1", true), &admins));
        assert!(is_admin(&RequestContext::new("root-tenant", false), &admins));
        assert!(!is_admin(&RequestContext::new("t1", false), &admins));
    }
}
