//! Patient account endpoints.
//!
//! - `POST /api/user/signup`
//! - `POST /api/user/token`
//! - `GET|PUT|PATCH /api/user/me`

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use super::blocking;
use crate::accounts::{self, AccountView, SignupRequest, SignupView, TokenRequest, UpdateVia, UserPatch};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::models::TokenScope;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// `POST /api/user/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupView>), ApiError> {
    let Json(req) = payload?;
    let user = blocking(move || {
        let mut conn = ctx.core.open_db()?;
        Ok(accounts::create_user(&mut conn, ctx.core.hasher(), &req)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(SignupView::from(&user))))
}

/// Shared by the user and doctor token endpoints.
pub(crate) async fn issue_api_token(
    ctx: ApiContext,
    req: TokenRequest,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = blocking(move || {
        let conn = ctx.core.open_db()?;
        let (_, token) = accounts::login(&conn, ctx.core.hasher(), &req, TokenScope::Api)?;
        Ok(token)
    })
    .await?;
    Ok(Json(TokenResponse { token }))
}

/// `POST /api/user/token`
pub async fn token(
    State(ctx): State<ApiContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload?;
    issue_api_token(ctx, req).await
}

/// `GET /api/user/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<AccountView>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::account_view(&conn, &user)?))
}

fn update(
    ctx: &ApiContext,
    user: &crate::models::User,
    patch: &UserPatch,
    partial: bool,
) -> Result<AccountView, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let updated = accounts::update_user(&mut conn, user, patch, partial, UpdateVia::User)?;
    Ok(accounts::account_view(&conn, &updated)?)
}

/// `PUT /api/user/me`; username is required.
pub async fn replace_me(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<AccountView>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(update(&ctx, &user, &patch, false)?))
}

/// `PATCH /api/user/me`
pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<AccountView>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(update(&ctx, &user, &patch, true)?))
}
