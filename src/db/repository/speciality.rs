use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{classify_write_error, DatabaseError};
use crate::models::*;

pub fn insert_speciality(conn: &Connection, name: &str) -> Result<i64, DatabaseError> {
    conn.execute("INSERT INTO specialities (name) VALUES (?1)", params![name])
        .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_speciality(conn: &Connection, id: i64) -> Result<Option<Speciality>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM specialities WHERE id = ?1",
            params![id],
            |row| Ok(Speciality { id: row.get(0)?, name: row.get(1)? }),
        )
        .optional()?)
}

pub fn list_specialities(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<Speciality>, DatabaseError> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let mut stmt = conn.prepare(
        "SELECT id, name FROM specialities WHERE ?1 IS NULL OR name LIKE ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map(params![pattern], |row| {
        Ok(Speciality { id: row.get(0)?, name: row.get(1)? })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn rename_speciality(conn: &Connection, id: i64, name: &str) -> Result<(), DatabaseError> {
    let changed = conn
        .execute("UPDATE specialities SET name = ?2 WHERE id = ?1", params![id, name])
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Speciality".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_speciality(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM specialities WHERE id = ?1", params![id])? > 0)
}

/// The subset of `ids` with no speciality row, in input order.
pub fn missing_specialities(conn: &Connection, ids: &[i64]) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT EXISTS(SELECT 1 FROM specialities WHERE id = ?1)")?;
    let mut missing = Vec::new();
    for id in ids {
        let exists: bool = stmt.query_row(params![id], |row| row.get(0))?;
        if !exists && !missing.contains(id) {
            missing.push(*id);
        }
    }
    Ok(missing)
}
