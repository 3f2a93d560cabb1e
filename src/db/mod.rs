pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Unique constraint violated on {table}.{column}")]
    UniqueViolation { table: String, column: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// Column name when this is a uniqueness failure.
    pub fn unique_column(&self) -> Option<&str> {
        match self {
            DatabaseError::UniqueViolation { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// Classify a write error, splitting SQLite constraint failures out of the
/// generic `Sqlite` bucket so callers can turn them into field errors.
///
/// SQLite reports uniqueness failures as
/// `UNIQUE constraint failed: users.email` (or several comma-separated
/// columns for composite keys; the first one is kept).
pub fn classify_write_error(err: rusqlite::Error) -> DatabaseError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            if let Some(rest) = message.strip_prefix("UNIQUE constraint failed: ") {
                let first = rest.split(',').next().unwrap_or(rest).trim();
                let (table, column) = first.split_once('.').unwrap_or(("", first));
                return DatabaseError::UniqueViolation {
                    table: table.to_string(),
                    column: column.to_string(),
                };
            }
            return DatabaseError::ConstraintViolation(message.clone());
        }
    }
    DatabaseError::Sqlite(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn unique_failure_is_classified_with_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .map_err(classify_write_error)
            .unwrap_err();
        assert_eq!(err.unique_column(), Some("name"));
    }

    #[test]
    fn check_failure_is_generic_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (n INTEGER CHECK (n >= 0));").unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES (-1)", [])
            .map_err(classify_write_error)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
