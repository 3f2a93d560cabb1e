use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{classify_write_error, DatabaseError};
use crate::models::*;

const USER_COLUMNS: &str = "id, email, username, password, is_active, is_staff, is_superuser,
     is_doctor, created_date, last_login";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        is_active: row.get(4)?,
        is_staff: row.get(5)?,
        is_superuser: row.get(6)?,
        is_doctor: row.get(7)?,
        created_date: row.get(8)?,
        last_login: row.get(9)?,
    })
}

/// Insert an account row and return its id.
pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (email, username, password, is_active, is_staff, is_superuser,
         is_doctor, created_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.email,
            user.username,
            user.password,
            user.is_active,
            user.is_staff,
            user.is_superuser,
            user.is_doctor,
            Utc::now(),
        ],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_user).optional()?)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    Ok(conn.query_row(&sql, params![email], row_to_user).optional()?)
}

/// Users ordered by id; `search` matches email or username substrings.
pub fn list_users(conn: &Connection, search: Option<&str>) -> Result<Vec<User>, DatabaseError> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE ?1 IS NULL OR email LIKE ?1 OR username LIKE ?1
         ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern], row_to_user)?;
    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Whether `field` (`email` or `username`) is taken by another account.
pub fn is_taken(
    conn: &Connection,
    field: &str,
    value: &str,
    excluding: Option<i64>,
) -> Result<bool, DatabaseError> {
    let column = match field {
        "email" => "email",
        "username" => "username",
        other => {
            return Err(DatabaseError::InvalidEnum {
                field: "unique user column".into(),
                value: other.into(),
            })
        }
    };
    let sql = format!("SELECT EXISTS(SELECT 1 FROM users WHERE {column} = ?1 AND id != ?2)");
    let taken: bool = conn.query_row(&sql, params![value, excluding.unwrap_or(-1)], |row| row.get(0))?;
    Ok(taken)
}

/// Persist editable account columns. Email, password and dates are not
/// touched here.
pub fn update_user_account(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE users SET username = ?2, is_active = ?3, is_staff = ?4, is_superuser = ?5,
             is_doctor = ?6 WHERE id = ?1",
            params![
                user.id,
                user.username,
                user.is_active,
                user.is_staff,
                user.is_superuser,
                user.is_doctor,
            ],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "User".into(),
            id: user.id.to_string(),
        });
    }
    Ok(())
}

pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET password = ?2 WHERE id = ?1",
        params![id, password_hash],
    )?;
    Ok(())
}

pub fn update_email(conn: &Connection, id: i64, email: &str) -> Result<(), DatabaseError> {
    conn.execute("UPDATE users SET email = ?2 WHERE id = ?1", params![id, email])
        .map_err(classify_write_error)?;
    Ok(())
}

pub fn touch_last_login(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        params![id, Utc::now()],
    )?;
    Ok(())
}

/// Delete an account; profile, doctor profile and tokens cascade.
pub fn delete_user(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let n = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(n > 0)
}
