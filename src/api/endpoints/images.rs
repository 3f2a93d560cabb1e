//! Profile image endpoints, shared by `/api/user/upload-image` and
//! `/api/doctor/upload-image`.
//!
//! `POST` accepts `multipart/form-data` with an `image` file field, or a
//! JSON body `{"image": null}` to clear the current image.

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use super::blocking;
use crate::accounts::{self, ImageView};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::media::{ImageUpload, MediaError};
use crate::validation::nullable;

pub const IMAGE_FIELD: &str = "image";
const NOT_A_FILE: &str =
    "The submitted data was not a file. Check the encoding type on the form.";

#[derive(Deserialize)]
struct ImageJson {
    #[serde(default, deserialize_with = "nullable")]
    image: Option<Option<serde_json::Value>>,
}

/// `GET .../upload-image`
pub async fn current(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ImageView>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::image_view(&conn, user.id())?))
}

/// `POST .../upload-image`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    req: Request,
) -> Result<Json<ImageView>, ApiError> {
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let upload = if is_multipart {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let max_bytes = ctx.core.media().max_image_bytes();
        Some(read_image_field(&mut multipart, max_bytes).await?)
    } else {
        let Json(body) = Json::<ImageJson>::from_request(req, &()).await?;
        match body.image {
            None => return Err(ApiError::field(IMAGE_FIELD, MediaError::Missing.to_string())),
            Some(None) => None,
            Some(Some(_)) => return Err(ApiError::field(IMAGE_FIELD, NOT_A_FILE)),
        }
    };

    let user_id = user.id();
    let view = blocking(move || {
        let conn = ctx.core.open_db()?;
        Ok(accounts::set_profile_image(&conn, ctx.core.media(), user_id, upload)?)
    })
    .await?;
    Ok(Json(view))
}

/// Bodies cut off by the request limit report the same message as an
/// oversize file that made it through.
fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::field(IMAGE_FIELD, MediaError::TooLarge { max_bytes }.to_string())
    } else {
        err.into()
    }
}

/// Pull the `image` file out of a multipart body.
async fn read_image_field(multipart: &mut Multipart, max_bytes: usize) -> Result<ImageUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            return Err(ApiError::field(IMAGE_FIELD, NOT_A_FILE));
        };
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, max_bytes))?;
        if filename.is_empty() && bytes.is_empty() {
            break;
        }
        return Ok(ImageUpload {
            filename: Some(filename),
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::field(IMAGE_FIELD, MediaError::Missing.to_string()))
}
