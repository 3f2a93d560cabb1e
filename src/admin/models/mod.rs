//! Model registrations for the admin console.
//!
//! Each registered model knows how to list itself, describe its form,
//! load a record into form values and write submitted values back.

mod accounts;
mod catalog;
mod hospital;

use rusqlite::Connection;

use super::forms::{Choices, FormField, FormValues};
use super::AdminError;
use crate::core_state::CoreState;
use crate::db::{self, DatabaseError};
use crate::models::Language;
use crate::validation::{FieldErrors, NON_FIELD};

pub type AdminResult<T> = Result<T, AdminError>;

/// One line of a change list. `cells[0]` links to the edit page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i64,
    pub cells: Vec<String>,
}

pub trait AdminModel: Send + Sync {
    /// URL segment: `/admin/<slug>`.
    fn slug(&self) -> &'static str;
    /// Plural display name.
    fn title(&self) -> &'static str;
    fn singular(&self) -> &'static str;
    fn columns(&self) -> &'static [&'static str];

    /// Models provisioned alongside another record (profiles) cannot be
    /// added on their own.
    fn can_create(&self) -> bool {
        true
    }

    fn fields(&self, conn: &Connection, creating: bool) -> AdminResult<Vec<FormField>>;

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>>;

    /// Display label and current values, `None` when the id is unknown.
    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>>;

    /// Initial values for the add form.
    fn defaults(&self) -> FormValues {
        FormValues::new()
    }

    fn create(&self, core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64>;

    fn update(
        &self,
        core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()>;

    fn delete(&self, core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool>;
}

static MODELS: &[&dyn AdminModel] = &[
    &accounts::UserAdmin,
    &accounts::ProfileAdmin,
    &accounts::SpecialityAdmin,
    &accounts::DoctorProfileAdmin,
    &catalog::ProcedureAdmin,
    &hospital::HospitalAdmin,
    &hospital::AccreditationAdmin,
    &hospital::ServiceAdmin,
    &hospital::HospitalDoctorAdmin,
    &hospital::HospitalProcedureAdmin,
    &hospital::HospitalLanguageAdmin,
];

/// Every registered model, in index order.
pub fn registry() -> &'static [&'static dyn AdminModel] {
    MODELS
}

pub fn find(slug: &str) -> Option<&'static dyn AdminModel> {
    MODELS.iter().copied().find(|m| m.slug() == slug)
}

// ── shared helpers ───────────────────────────────────────────

/// Map a uniqueness failure to a form error for `label` records.
pub(super) fn unique_error(label: &str) -> impl Fn(DatabaseError) -> AdminError + '_ {
    move |err| match err.unique_column() {
        // Composite keys report their first column, which is always a
        // foreign key; the pair as a whole is what clashes.
        Some(column) if column.ends_with("_id") => AdminError::Invalid(FieldErrors::single(
            NON_FIELD,
            format!("{label} with these values already exists."),
        )),
        Some(column) => AdminError::Invalid(FieldErrors::single(
            column,
            format!("{label} with this {column} already exists."),
        )),
        None => err.into(),
    }
}

pub(super) fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_string()
}

pub(super) fn hospital_choices(conn: &Connection) -> AdminResult<Choices> {
    Ok(db::list_hospitals(conn, None)?
        .into_iter()
        .map(|h| (h.id.to_string(), h.name))
        .collect())
}

pub(super) fn speciality_choices(conn: &Connection) -> AdminResult<Choices> {
    Ok(db::list_specialities(conn, None)?
        .into_iter()
        .map(|s| (s.id.to_string(), s.name))
        .collect())
}

pub(super) fn language_choices() -> Choices {
    Language::ALL
        .iter()
        .map(|l| (l.as_str().to_string(), l.label().to_string()))
        .collect()
}

/// Parse a required language code.
pub(super) fn language(form: &FormValues, errors: &mut FieldErrors, name: &str) -> Option<Language> {
    let raw = form.required(errors, name)?;
    match raw.parse() {
        Ok(lang) => Some(lang),
        Err(_) => {
            errors.add(name, super::forms::INVALID_CHOICE);
            None
        }
    }
}

/// Fail with the collected errors, if any.
pub(super) fn check(errors: FieldErrors) -> AdminResult<()> {
    errors.into_result().map_err(AdminError::Invalid)
}

/// `check`, then yield the parsed value. A value missing from an error-free
/// form is a bug in the parser, not a missing record.
pub(super) fn checked<T>(errors: FieldErrors, value: Option<T>) -> AdminResult<T> {
    check(errors)?;
    value.ok_or_else(|| AdminError::Internal("form parsed without errors but a value is missing".into()))
}
