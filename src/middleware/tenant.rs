use axum::{
    extract::Request,
    http::{header::COOKIE, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::consts::{ADMIN_ACCESS, CUSTOMER_GUID};
use crate::context::RequestContext;

/// Resolves the calling tenant from the `customerGUID` cookie, falling back
/// to the `customerGUID` query parameter, and injects a `RequestContext`.
pub async fn tenant_middleware(mut request: Request, next: Next) -> Result<Response, impl IntoResponse> {
    let from_cookie = context_from_cookies(request.headers());
    let context = match from_cookie {
        Some(context) => context,
        None => {
            let tenant = request
                .uri()
                .query()
                .and_then(tenant_from_query)
                .ok_or_else(|| {
                    tracing::debug!(path = %request.uri().path(), "request without tenant");
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})))
                })?;
            RequestContext::new(tenant, false)
        }
    };

    tracing::debug!(tenant = %context.tenant, admin = context.admin, "resolved tenant");
    request.extensions_mut().insert(context);
    Ok::<_, (StatusCode, Json<serde_json::Value>)>(next.run(request).await)
}

/// The `customerGUID` cookie holds the URL-encoded value `tenant[;flag...]`.
/// The first part names the tenant; an `adminAccess` flag among the later
/// parts grants admin access.
fn context_from_cookies(headers: &HeaderMap) -> Option<RequestContext> {
    let value = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == CUSTOMER_GUID)
        .map(|(_, value)| unescape(value.trim_matches('"')))?;

    let mut parts = value.split(';');
    let tenant = parts.next().filter(|tenant| !tenant.is_empty())?;
    let admin = parts.any(|part| part == ADMIN_ACCESS);
    Some(RequestContext::new(tenant, admin))
}

/// Query-style unescaping of one cookie value (`%XX` and `+`).
fn unescape(value: &str) -> String {
    let escaped = value.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

fn tenant_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == CUSTOMER_GUID && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}
