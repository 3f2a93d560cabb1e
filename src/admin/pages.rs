//! Console page handlers: index, change list, add/edit form, delete.
//!
//! Record ids travel as strings so `/admin/<model>/new` shares the edit
//! route; anything that is neither `new` nor a number is a 404.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Form, Path, Query};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;

use super::forms::{FormField, FormValues};
use super::models::{self, AdminModel, AdminResult};
use super::{html, AdminError, AdminUser};
use crate::api::ApiContext;
use crate::core_state::CoreState;
use crate::validation::FieldErrors;

const NEW: &str = "new";

/// Run database work on the blocking pool.
async fn blocking<T, F>(core: Arc<CoreState>, work: F) -> AdminResult<T>
where
    F: FnOnce(&CoreState) -> AdminResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&core))
        .await
        .map_err(|e| AdminError::Internal(format!("blocking task failed: {e}")))?
}

fn model(slug: &str) -> AdminResult<&'static dyn AdminModel> {
    models::find(slug).ok_or(AdminError::NotFound)
}

/// `None` for the add form.
fn record_id(raw: &str) -> AdminResult<Option<i64>> {
    if raw == NEW {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| AdminError::NotFound)
}

fn action_url(model: &dyn AdminModel, id: Option<i64>) -> String {
    match id {
        Some(id) => format!("/admin/{}/{id}", model.slug()),
        None => format!("/admin/{}/{NEW}", model.slug()),
    }
}

fn form_page(
    user: &AdminUser,
    model: &dyn AdminModel,
    id: Option<i64>,
    label: Option<&str>,
    fields: &[FormField],
    values: &FormValues,
    errors: &FieldErrors,
) -> Html<String> {
    let title = match (id, label) {
        (Some(_), Some(label)) => format!("Change {}: {label}", model.singular()),
        _ => format!("Add {}", model.singular()),
    };
    let delete_url = id.map(|id| format!("/admin/{}/{id}/delete", model.slug()));
    let body = html::form(
        &action_url(model, id),
        fields,
        values,
        errors,
        delete_url.as_deref(),
    );
    Html(html::page(&title, Some(&user.0.email), &body))
}

pub async fn index(Extension(user): Extension<AdminUser>) -> Html<String> {
    Html(html::page(
        "Site administration",
        Some(&user.0.email),
        &html::index(models::registry()),
    ))
}

pub async fn change_list(
    Extension(ctx): Extension<ApiContext>,
    Extension(user): Extension<AdminUser>,
    Path(slug): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> AdminResult<Html<String>> {
    let model = model(&slug)?;
    let query = params
        .get("q")
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    let search = query.clone();
    let rows = blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        model.rows(&conn, search.as_deref())
    })
    .await?;
    Ok(Html(html::page(
        model.title(),
        Some(&user.0.email),
        &html::change_list(model, &rows, query.as_deref()),
    )))
}

pub async fn edit(
    Extension(ctx): Extension<ApiContext>,
    Extension(user): Extension<AdminUser>,
    Path((slug, raw_id)): Path<(String, String)>,
) -> AdminResult<Html<String>> {
    let model = model(&slug)?;
    let id = record_id(&raw_id)?;
    if id.is_none() && !model.can_create() {
        return Err(AdminError::NotAllowed);
    }

    let (fields, label, values) = blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        let fields = model.fields(&conn, id.is_none())?;
        match id {
            None => Ok((fields, None, model.defaults())),
            Some(id) => {
                let (label, values) = model.load(&conn, id)?.ok_or(AdminError::NotFound)?;
                Ok((fields, Some(label), values))
            }
        }
    })
    .await?;

    Ok(form_page(
        &user,
        model,
        id,
        label.as_deref(),
        &fields,
        &values,
        &FieldErrors::new(),
    ))
}

enum Saved {
    Done(i64),
    /// Validation failed; re-render with the submitted values.
    Rejected {
        fields: Vec<FormField>,
        label: Option<String>,
        errors: FieldErrors,
    },
}

pub async fn save(
    Extension(ctx): Extension<ApiContext>,
    Extension(user): Extension<AdminUser>,
    Path((slug, raw_id)): Path<(String, String)>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AdminResult<Response> {
    let model = model(&slug)?;
    let id = record_id(&raw_id)?;
    if id.is_none() && !model.can_create() {
        return Err(AdminError::NotAllowed);
    }
    let values = FormValues::from_pairs(pairs);

    let submitted = values.clone();
    let outcome = blocking(ctx.core.clone(), move |core| {
        let mut conn = core.open_db()?;
        let (result, label) = match id {
            None => (model.create(core, &mut conn, &submitted), None),
            Some(id) => {
                let (label, _) = model.load(&conn, id)?.ok_or(AdminError::NotFound)?;
                (
                    model.update(core, &mut conn, id, &submitted).map(|()| id),
                    Some(label),
                )
            }
        };
        match result {
            Ok(id) => Ok(Saved::Done(id)),
            Err(AdminError::Invalid(errors)) => Ok(Saved::Rejected {
                fields: model.fields(&conn, id.is_none())?,
                label,
                errors,
            }),
            Err(e) => Err(e),
        }
    })
    .await?;

    match outcome {
        Saved::Done(saved) => {
            tracing::info!(
                model = model.slug(),
                id = saved,
                staff_id = user.0.id,
                "Admin record saved"
            );
            Ok(Redirect::to(&format!("/admin/{}", model.slug())).into_response())
        }
        Saved::Rejected {
            fields,
            label,
            errors,
        } => Ok(form_page(&user, model, id, label.as_deref(), &fields, &values, &errors).into_response()),
    }
}

pub async fn confirm_delete(
    Extension(ctx): Extension<ApiContext>,
    Extension(user): Extension<AdminUser>,
    Path((slug, raw_id)): Path<(String, String)>,
) -> AdminResult<Html<String>> {
    let model = model(&slug)?;
    let id = record_id(&raw_id)?.ok_or(AdminError::NotFound)?;
    let label = blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        Ok(model.load(&conn, id)?.map(|(label, _)| label))
    })
    .await?
    .ok_or(AdminError::NotFound)?;
    Ok(Html(html::page(
        &format!("Delete {}", model.singular()),
        Some(&user.0.email),
        &html::delete_confirmation(model, id, &label),
    )))
}

pub async fn delete(
    Extension(ctx): Extension<ApiContext>,
    Extension(user): Extension<AdminUser>,
    Path((slug, raw_id)): Path<(String, String)>,
) -> AdminResult<Response> {
    let model = model(&slug)?;
    let id = record_id(&raw_id)?.ok_or(AdminError::NotFound)?;
    let deleted = blocking(ctx.core.clone(), move |core| {
        let conn = core.open_db()?;
        model.delete(core, &conn, id)
    })
    .await?;
    if !deleted {
        return Err(AdminError::NotFound);
    }
    tracing::info!(model = model.slug(), id, staff_id = user.0.id, "Admin record deleted");
    Ok(Redirect::to(&format!("/admin/{}", model.slug())).into_response())
}
