use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{classify_write_error, DatabaseError};
use crate::models::*;

const PROCEDURE_COLUMNS: &str = "id, name, speciality, days_in_hospital, days_in_destination,
     duration_minutes, overview, other_details";

fn row_to_procedure(row: &Row<'_>) -> rusqlite::Result<Procedure> {
    Ok(Procedure {
        id: row.get(0)?,
        name: row.get(1)?,
        speciality: row.get(2)?,
        days_in_hospital: row.get(3)?,
        days_in_destination: row.get(4)?,
        duration_minutes: row.get(5)?,
        overview: row.get(6)?,
        other_details: row.get(7)?,
    })
}

/// Insert a procedure; the `id` field is ignored and the new id returned.
pub fn insert_procedure(conn: &Connection, proc: &Procedure) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO procedures (name, speciality, days_in_hospital, days_in_destination,
         duration_minutes, overview, other_details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            proc.name,
            proc.speciality,
            proc.days_in_hospital,
            proc.days_in_destination,
            proc.duration_minutes,
            proc.overview,
            proc.other_details,
        ],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_procedure(conn: &Connection, id: i64) -> Result<Option<Procedure>, DatabaseError> {
    let sql = format!("SELECT {PROCEDURE_COLUMNS} FROM procedures WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_procedure).optional()?)
}

/// Catalog listing, ordered by name descending.
pub fn list_procedures(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<Procedure>, DatabaseError> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let sql = format!(
        "SELECT {PROCEDURE_COLUMNS} FROM procedures
         WHERE ?1 IS NULL OR name LIKE ?1 OR speciality LIKE ?1
         ORDER BY name DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern], row_to_procedure)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_procedure(conn: &Connection, proc: &Procedure) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE procedures SET name = ?2, speciality = ?3, days_in_hospital = ?4,
             days_in_destination = ?5, duration_minutes = ?6, overview = ?7, other_details = ?8
             WHERE id = ?1",
            params![
                proc.id,
                proc.name,
                proc.speciality,
                proc.days_in_hospital,
                proc.days_in_destination,
                proc.duration_minutes,
                proc.overview,
                proc.other_details,
            ],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Procedure".into(),
            id: proc.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_procedure(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM procedures WHERE id = ?1", params![id])? > 0)
}
