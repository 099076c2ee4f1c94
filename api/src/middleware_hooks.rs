//! Request and response middleware.
//!
//! `authenticate` turns a bearer token or session cookie into a verified
//! [`Principal`] in the request extensions; `authorize_roles` gates a route
//! tree on that principal's role. Ownership checks stay in the handlers,
//! after the target row is loaded.

use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use authz::{Principal, Role, RoutePolicy};

use crate::{error::ApiError, AppState};

/// Name of the session cookie set on login and register
pub const TOKEN_COOKIE: &str = "token";

/// Extract the token from an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Pull one cookie's value out of the `Cookie` header
fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Token lookup order: Authorization header first, session cookie second
pub(crate) fn request_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| parse_cookie(headers, TOKEN_COOKIE))
}

/// Verify the request's token and attach the account to the request.
///
/// Both the [`Principal`] consumed by authorization checks and the full
/// [`user::UserRecord`] are inserted into the extensions, so handlers such
/// as `/auth/me` need no second lookup.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request_token(request.headers()).ok_or_else(ApiError::unauthenticated)?;

    let principal_id = state
        .tokens
        .verify(&token)
        .map_err(|_| ApiError::unauthenticated())?;

    // A token can outlive its account; treat a missing subject as a bad token
    let account = state
        .users
        .find_by_id(&principal_id)
        .await?
        .ok_or_else(ApiError::unauthenticated)?;

    let role = Role::from_str(&account.role)?;
    let principal = Principal::new(account.id.clone(), role);

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(account);

    Ok(next.run(request).await)
}

/// Role gate for a protected route tree. Expects [`authenticate`] to have
/// run already; a missing principal reads as an unauthenticated request.
pub async fn authorize_roles(
    policy: RoutePolicy,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(ApiError::unauthenticated)?;

    policy.check(&principal)?;

    Ok(next.run(request).await)
}

/// Attach baseline security headers to every response
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());

    response
}

/// Session cookie carrying a freshly issued token
pub fn token_cookie(token: &str, max_age_days: i64, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; Max-Age={}; HttpOnly; SameSite=Strict; Path=/",
        TOKEN_COOKIE,
        token,
        max_age_days * 24 * 60 * 60
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap()
}

/// Expired replacement cookie sent on logout
pub fn clear_token_cookie(secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{}=none; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/",
        TOKEN_COOKIE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));

        let headers = headers_with(header::AUTHORIZATION, "Token abc");
        assert_eq!(bearer_token(&headers), None);

        let headers = headers_with(header::AUTHORIZATION, "Bearer ");
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_parsing() {
        let headers = headers_with(header::COOKIE, "theme=dark; token=abc.def; lang=en");
        assert_eq!(
            parse_cookie(&headers, TOKEN_COOKIE),
            Some("abc.def".to_string())
        );
        assert_eq!(parse_cookie(&headers, "theme"), Some("dark".to_string()));
        assert_eq!(parse_cookie(&headers, "session"), None);
    }

    #[test]
    fn test_authorization_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        headers.insert(header::COOKIE, "token=from-cookie".parse().unwrap());

        assert_eq!(request_token(&headers), Some("from-header".to_string()));
    }

    #[test]
    fn test_cookie_fallback_when_header_absent() {
        let headers = headers_with(header::COOKIE, "token=from-cookie");
        assert_eq!(request_token(&headers), Some("from-cookie".to_string()));
    }

    #[test]
    fn test_token_cookie_format() {
        let value = token_cookie("abc.def", 30, false);
        let cookie = value.to_str().unwrap();
        assert!(cookie.starts_with("token=abc.def;"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(!cookie.contains("Secure"));

        let value = token_cookie("abc.def", 30, true);
        assert!(value.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_in_the_past() {
        let value = clear_token_cookie(false);
        let cookie = value.to_str().unwrap();
        assert!(cookie.starts_with("token=none;"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }
}
