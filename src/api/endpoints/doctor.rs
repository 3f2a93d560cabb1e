//! Doctor account endpoints.
//!
//! Doctors register with a nested profile and doctor profile and stay
//! inactive until staff activate them in the admin console.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::blocking;
use super::user::{issue_api_token, TokenResponse};
use crate::accounts::{
    self, DoctorAccountView, DoctorSignupRequest, DoctorSignupView, TokenRequest, UpdateVia, UserPatch,
};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::catalog;
use crate::models::{Speciality, User};

/// `POST /api/doctor/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DoctorSignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DoctorSignupView>), ApiError> {
    let Json(req) = payload?;
    let view = blocking(move || {
        let mut conn = ctx.core.open_db()?;
        Ok(accounts::create_doctor(&mut conn, ctx.core.hasher(), &req)?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `POST /api/doctor/token`
pub async fn token(
    State(ctx): State<ApiContext>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload?;
    issue_api_token(ctx, req).await
}

/// `GET /api/doctor/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<DoctorAccountView>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::doctor_account_view(&conn, &user)?))
}

fn update(
    ctx: &ApiContext,
    user: &User,
    patch: &UserPatch,
    partial: bool,
) -> Result<DoctorAccountView, ApiError> {
    let mut conn = ctx.core.open_db()?;
    let updated = accounts::update_user(&mut conn, user, patch, partial, UpdateVia::Doctor)?;
    Ok(accounts::doctor_account_view(&conn, &updated)?)
}

/// `PUT /api/doctor/me`
pub async fn replace_me(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<DoctorAccountView>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(update(&ctx, &user, &patch, false)?))
}

/// `PATCH /api/doctor/me`
pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    payload: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<DoctorAccountView>, ApiError> {
    let Json(patch) = payload?;
    Ok(Json(update(&ctx, &user, &patch, true)?))
}

/// `GET /api/doctor/specialities`
pub async fn specialities(State(ctx): State<ApiContext>) -> Result<Json<Vec<Speciality>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(catalog::list_specialities(&conn)?))
}
