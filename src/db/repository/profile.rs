use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

const PROFILE_COLUMNS: &str = "p.user_id, p.first_name, p.last_name, p.phone, p.date_of_birth,
     p.city, p.country, p.postal_code, p.address, p.primary_language, p.secondary_language,
     p.tertiary_language, p.image";

fn language(row: &Row<'_>, idx: usize) -> rusqlite::Result<Language> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: DatabaseError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        phone: row.get(3)?,
        date_of_birth: row.get(4)?,
        city: row.get(5)?,
        country: row.get(6)?,
        postal_code: row.get(7)?,
        address: row.get(8)?,
        primary_language: language(row, 9)?,
        secondary_language: language(row, 10)?,
        tertiary_language: language(row, 11)?,
        image: row.get(12)?,
    })
}

/// Create the blank profile for `user_id` unless one exists.
pub fn ensure_profile(conn: &Connection, user_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO user_profiles (user_id) VALUES (?1)",
        params![user_id],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, user_id: i64) -> Result<Option<UserProfile>, DatabaseError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles p WHERE p.user_id = ?1");
    Ok(conn.query_row(&sql, params![user_id], row_to_profile).optional()?)
}

pub fn update_profile(conn: &Connection, profile: &UserProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE user_profiles SET first_name = ?2, last_name = ?3, phone = ?4,
         date_of_birth = ?5, city = ?6, country = ?7, postal_code = ?8, address = ?9,
         primary_language = ?10, secondary_language = ?11, tertiary_language = ?12
         WHERE user_id = ?1",
        params![
            profile.user_id,
            profile.first_name,
            profile.last_name,
            profile.phone,
            profile.date_of_birth,
            profile.city,
            profile.country,
            profile.postal_code,
            profile.address,
            profile.primary_language.as_str(),
            profile.secondary_language.as_str(),
            profile.tertiary_language.as_str(),
        ],
    )?;
    Ok(())
}

/// Delete the profile row. The owning user is left in place.
pub fn delete_profile(conn: &Connection, user_id: i64) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM user_profiles WHERE user_id = ?1", params![user_id])?;
    Ok(deleted > 0)
}

pub fn set_profile_image(
    conn: &Connection,
    user_id: i64,
    image: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE user_profiles SET image = ?2 WHERE user_id = ?1",
        params![user_id, image],
    )?;
    Ok(())
}

/// Profiles with their owner's email, ordered by user id. `search` matches
/// names, city, country, languages or the owner's email.
pub fn list_profiles(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<(String, UserProfile)>, DatabaseError> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let sql = format!(
        "SELECT {PROFILE_COLUMNS}, u.email FROM user_profiles p
         JOIN users u ON u.id = p.user_id
         WHERE ?1 IS NULL OR u.email LIKE ?1 OR p.first_name LIKE ?1 OR p.last_name LIKE ?1
            OR p.city LIKE ?1 OR p.country LIKE ?1 OR p.primary_language LIKE ?1
            OR p.secondary_language LIKE ?1 OR p.tertiary_language LIKE ?1
         ORDER BY p.user_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern], |row| {
        Ok((row.get::<_, String>(13)?, row_to_profile(row)?))
    })?;
    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row?);
    }
    Ok(profiles)
}
