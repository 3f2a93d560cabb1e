//! Procedure catalog endpoints.
//!
//! Reads are open to everyone; writes require a staff account
//! (anonymous → 401, authenticated non-staff → 403).

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::catalog::{self, ProcedureInput};
use crate::models::Procedure;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

fn require_staff(auth: Option<Extension<AuthUser>>) -> Result<(), ApiError> {
    match auth {
        Some(Extension(user)) => user.require_staff(),
        None => Err(ApiError::Unauthorized),
    }
}

fn procedure_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Not found.".into()))
}

/// `GET /api/staff/procedure`, ordered by name descending.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Procedure>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
    Ok(Json(catalog::list_procedures(&conn, search)?))
}

/// `POST /api/staff/procedure`
pub async fn create(
    State(ctx): State<ApiContext>,
    auth: Option<Extension<AuthUser>>,
    payload: Result<Json<ProcedureInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Procedure>), ApiError> {
    require_staff(auth)?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(catalog::create_procedure(&conn, &input)?)))
}

/// `GET /api/staff/procedure/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Procedure>, ApiError> {
    let id = procedure_id(path)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(catalog::get_procedure(&conn, id)?))
}

fn write(
    ctx: &ApiContext,
    auth: Option<Extension<AuthUser>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProcedureInput>, JsonRejection>,
    partial: bool,
) -> Result<Json<Procedure>, ApiError> {
    require_staff(auth)?;
    let id = procedure_id(path)?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(catalog::update_procedure(&conn, id, &input, partial)?))
}

/// `PUT /api/staff/procedure/:id`
pub async fn replace(
    State(ctx): State<ApiContext>,
    auth: Option<Extension<AuthUser>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProcedureInput>, JsonRejection>,
) -> Result<Json<Procedure>, ApiError> {
    write(&ctx, auth, path, payload, false)
}

/// `PATCH /api/staff/procedure/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    auth: Option<Extension<AuthUser>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProcedureInput>, JsonRejection>,
) -> Result<Json<Procedure>, ApiError> {
    write(&ctx, auth, path, payload, true)
}

/// `DELETE /api/staff/procedure/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    auth: Option<Extension<AuthUser>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    require_staff(auth)?;
    let id = procedure_id(path)?;
    let conn = ctx.core.open_db()?;
    catalog::delete_procedure(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}
