//! Token authentication middleware.
//!
//! Accepts `Authorization: Token <key>` and `Authorization: Bearer <key>`.
//! A request without the header passes through anonymously; a request
//! carrying an unknown token is rejected even on public routes.

use axum::http::{header, HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::accounts;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::models::TokenScope;

/// Extract the token from the `Authorization` header.
///
/// `Ok(None)` when the header is absent, `Err` when it is present but
/// not in a recognised form.
pub fn token_from_headers(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ApiError::InvalidToken)?;
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") =>
        {
            Ok(Some(token.to_string()))
        }
        _ => Err(ApiError::InvalidToken),
    }
}

/// Resolve a presented API token to its user.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn resolve_token(req: Request<axum::body::Body>, next: Next) -> Response {
    match resolve_token_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn resolve_token_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    if let Some(token) = token_from_headers(req.headers())? {
        let conn = ctx.core.open_db()?;
        let user = accounts::user_for_token(&conn, &token, TokenScope::Api)?
            .ok_or(ApiError::InvalidToken)?;
        req.extensions_mut().insert(AuthUser(user));
    }

    Ok(next.run(req).await)
}

/// Require an authenticated user (set by `resolve_token`).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    if req.extensions().get::<AuthUser>().is_none() {
        return ApiError::Unauthorized.into_response();
    }
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn accepts_token_and_bearer_schemes() {
        assert_eq!(token_from_headers(&headers("Token abc")).unwrap().as_deref(), Some("abc"));
        assert_eq!(token_from_headers(&headers("Bearer abc")).unwrap().as_deref(), Some("abc"));
        assert_eq!(token_from_headers(&headers("token abc")).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert!(token_from_headers(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(token_from_headers(&headers("Token")).is_err());
        assert!(token_from_headers(&headers("Basic abc")).is_err());
        assert!(token_from_headers(&headers("Token a b")).is_err());
    }
}
