//! Procedure catalog and the read-only speciality list.
//!
//! Procedure names and specialities are stored lower-case, so "Knee
//! Replacement" and "knee replacement" are the same catalog entry.

use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::*;
use crate::validation::{self, FieldErrors};

pub const NAME_MAX_LENGTH: usize = 255;
pub const DUPLICATE_NAME: &str = "Procedure with this name already exists.";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid input: {}", .0.summary())]
    Invalid(FieldErrors),

    #[error("Procedure not found: {0}")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Client-supplied procedure fields. For a full write every required field
/// must be present; for a partial write absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcedureInput {
    pub name: Option<String>,
    pub speciality: Option<String>,
    pub days_in_hospital: Option<i64>,
    pub days_in_destination: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub overview: Option<String>,
    pub other_details: Option<String>,
}

impl ProcedureInput {
    /// Merge onto `base`, validating as we go. With `partial == false`
    /// missing required fields are errors.
    fn merge(&self, mut base: Procedure, partial: bool) -> Result<Procedure, FieldErrors> {
        let mut errors = FieldErrors::new();

        for (field, value, target) in [
            ("name", &self.name, &mut base.name),
            ("speciality", &self.speciality, &mut base.speciality),
        ] {
            match value.as_deref() {
                None if partial => {}
                value => {
                    if let Some(v) = validation::required(&mut errors, field, value) {
                        let v = v.trim().to_lowercase();
                        validation::max_length(&mut errors, field, &v, NAME_MAX_LENGTH);
                        *target = v;
                    }
                }
            }
        }

        for (field, value, target) in [
            ("days_in_hospital", self.days_in_hospital, &mut base.days_in_hospital),
            ("days_in_destination", self.days_in_destination, &mut base.days_in_destination),
            ("duration_minutes", self.duration_minutes, &mut base.duration_minutes),
        ] {
            match value {
                None if partial => {}
                None => errors.add(field, validation::REQUIRED),
                Some(v) => {
                    validation::non_negative(&mut errors, field, v);
                    *target = v;
                }
            }
        }

        if let Some(v) = &self.overview {
            base.overview = v.clone();
        } else if !partial {
            base.overview = String::new();
        }
        if let Some(v) = &self.other_details {
            base.other_details = v.clone();
        } else if !partial {
            base.other_details = String::new();
        }

        errors.into_result()?;
        Ok(base)
    }
}

fn blank_procedure() -> Procedure {
    Procedure {
        id: 0,
        name: String::new(),
        speciality: String::new(),
        days_in_hospital: 0,
        days_in_destination: 0,
        duration_minutes: 0,
        overview: String::new(),
        other_details: String::new(),
    }
}

fn duplicate_to_field(err: DatabaseError) -> CatalogError {
    if err.unique_column() == Some("name") {
        return CatalogError::Invalid(FieldErrors::single("name", DUPLICATE_NAME));
    }
    CatalogError::Database(err)
}

pub fn list_procedures(conn: &Connection, search: Option<&str>) -> Result<Vec<Procedure>, CatalogError> {
    Ok(db::list_procedures(conn, search)?)
}

pub fn get_procedure(conn: &Connection, id: i64) -> Result<Procedure, CatalogError> {
    db::get_procedure(conn, id)?.ok_or(CatalogError::NotFound(id))
}

pub fn create_procedure(conn: &Connection, input: &ProcedureInput) -> Result<Procedure, CatalogError> {
    let proc = input
        .merge(blank_procedure(), false)
        .map_err(CatalogError::Invalid)?;
    let id = db::insert_procedure(conn, &proc).map_err(duplicate_to_field)?;
    tracing::info!(procedure_id = id, name = %proc.name, "Procedure created");
    get_procedure(conn, id)
}

/// PUT (`partial == false`) or PATCH (`partial == true`).
pub fn update_procedure(
    conn: &Connection,
    id: i64,
    input: &ProcedureInput,
    partial: bool,
) -> Result<Procedure, CatalogError> {
    let current = get_procedure(conn, id)?;
    let proc = input.merge(current, partial).map_err(CatalogError::Invalid)?;
    db::update_procedure(conn, &proc).map_err(duplicate_to_field)?;
    tracing::info!(procedure_id = id, "Procedure updated");
    Ok(proc)
}

pub fn delete_procedure(conn: &Connection, id: i64) -> Result<(), CatalogError> {
    if !db::delete_procedure(conn, id)? {
        return Err(CatalogError::NotFound(id));
    }
    tracing::info!(procedure_id = id, "Procedure deleted");
    Ok(())
}

pub fn list_specialities(conn: &Connection) -> Result<Vec<Speciality>, CatalogError> {
    Ok(db::list_specialities(conn, None)?)
}
