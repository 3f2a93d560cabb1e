//! Admin sign-in.
//!
//! A successful login issues an admin-scope token and stores it in the
//! `curesio_admin` cookie. Every protected page resolves that cookie to an
//! active staff account or redirects to the login form.

use std::collections::HashMap;

use axum::extract::Form;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;

use super::{html, AdminError, AdminUser};
use crate::accounts::{self, AccountError};
use crate::api::ApiContext;
use crate::models::{TokenScope, User};

pub const SESSION_COOKIE: &str = "curesio_admin";
pub const LOGIN_URL: &str = "/admin/login";

const STAFF_LOGIN_FAILED: &str = "Please enter the correct email and password for a staff \
     account. Note that both fields may be case-sensitive.";

/// Value of the session cookie, if the request carries one.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/admin")
}

fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/admin; Max-Age=0")
}

fn with_cookie(mut response: Response, cookie: String) -> Response {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid session cookie value: {e}"),
    }
    response
}

async fn staff_for_token(ctx: &ApiContext, token: String) -> Result<Option<User>, AdminError> {
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || -> Result<Option<User>, AdminError> {
        let conn = core.open_db()?;
        let user = accounts::user_for_token(&conn, &token, TokenScope::Admin)?;
        Ok(user.filter(|u| u.is_staff))
    })
    .await
    .map_err(|e| AdminError::Internal(format!("blocking task failed: {e}")))?
}

/// Resolve the session cookie to a staff account; otherwise send the
/// browser to the login form.
pub async fn require_staff_session(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<ApiContext>().cloned() else {
        return AdminError::Internal("missing API context".into()).into_response();
    };
    let Some(token) = session_token(req.headers()) else {
        return Redirect::to(LOGIN_URL).into_response();
    };
    match staff_for_token(&ctx, token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AdminUser(user));
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Ok(None) => with_cookie(Redirect::to(LOGIN_URL).into_response(), expired_cookie()),
        Err(e) => e.into_response(),
    }
}

fn render_login(email: &str, error: Option<&str>) -> Html<String> {
    Html(html::page("Log in", None, &html::login_form(email, error)))
}

pub async fn login_page() -> Html<String> {
    render_login("", None)
}

pub async fn login(
    Extension(ctx): Extension<ApiContext>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let email = form.get("email").cloned().unwrap_or_default();
    let password = form.get("password").cloned().unwrap_or_default();
    if email.trim().is_empty() || password.is_empty() {
        return render_login(&email, Some(STAFF_LOGIN_FAILED)).into_response();
    }

    let core = ctx.core.clone();
    let typed = email.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<Option<String>, AdminError> {
        let conn = core.open_db()?;
        let user = match accounts::authenticate(&conn, core.hasher(), &typed, &password) {
            Ok(user) => user,
            Err(AccountError::BadCredentials | AccountError::Inactive) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !user.is_staff {
            return Ok(None);
        }
        let token = accounts::issue_token(&conn, user.id, TokenScope::Admin)?;
        tracing::info!(user_id = user.id, "Admin signed in");
        Ok(Some(token))
    })
    .await
    .map_err(|e| AdminError::Internal(format!("blocking task failed: {e}")))
    .and_then(|r| r);

    match result {
        Ok(Some(token)) => with_cookie(
            Redirect::to("/admin").into_response(),
            session_cookie(&token),
        ),
        Ok(None) => {
            tracing::warn!("Admin sign-in refused");
            (StatusCode::OK, render_login(&email, Some(STAFF_LOGIN_FAILED))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn logout(Extension(ctx): Extension<ApiContext>, headers: HeaderMap) -> Response {
    let Some(token) = session_token(&headers) else {
        return with_cookie(Redirect::to(LOGIN_URL).into_response(), expired_cookie());
    };
    let core = ctx.core.clone();
    let revoked = tokio::task::spawn_blocking(move || -> Result<bool, AdminError> {
        let conn = core.open_db()?;
        Ok(accounts::revoke_token(&conn, &token, TokenScope::Admin)?)
    })
    .await
    .map_err(|e| AdminError::Internal(format!("blocking task failed: {e}")))
    .and_then(|r| r);
    if let Err(e) = revoked {
        return e.into_response();
    }
    with_cookie(Redirect::to(LOGIN_URL).into_response(), expired_cookie())
}
