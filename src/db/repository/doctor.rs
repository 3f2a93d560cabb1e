use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;

/// Create the blank doctor profile for `user_id` unless one exists.
pub fn ensure_doctor_profile(conn: &Connection, user_id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO doctor_profiles (user_id) VALUES (?1)",
        params![user_id],
    )?;
    Ok(())
}

/// Load a doctor profile together with its four speciality slots.
pub fn get_doctor_profile(
    conn: &Connection,
    user_id: i64,
) -> Result<Option<DoctorProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT user_id, experience, qualification, highlights
             FROM doctor_profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(DoctorProfile {
                    user_id: row.get(0)?,
                    experience: row.get(1)?,
                    qualification: row.get(2)?,
                    highlights: row.get(3)?,
                    ..DoctorProfile::default()
                })
            },
        )
        .optional()?;

    let Some(mut profile) = profile else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT slot, speciality_id FROM doctor_specialities
         WHERE doctor_id = ?1 ORDER BY slot, speciality_id",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (slot, speciality_id) = row?;
        if let Some(ids) = profile.slot_mut(slot) {
            ids.push(speciality_id);
        }
    }
    Ok(Some(profile))
}

/// Persist text fields and rewrite every speciality slot.
pub fn update_doctor_profile(conn: &Connection, profile: &DoctorProfile) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctor_profiles SET experience = ?2, qualification = ?3, highlights = ?4
         WHERE user_id = ?1",
        params![
            profile.user_id,
            profile.experience,
            profile.qualification,
            profile.highlights,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "DoctorProfile".into(),
            id: profile.user_id.to_string(),
        });
    }
    for slot in 1..=SPECIALITY_SLOTS {
        set_speciality_slot(conn, profile.user_id, slot, profile.slot(slot))?;
    }
    Ok(())
}

pub fn set_speciality_slot(
    conn: &Connection,
    user_id: i64,
    slot: u8,
    speciality_ids: &[i64],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM doctor_specialities WHERE doctor_id = ?1 AND slot = ?2",
        params![user_id, slot],
    )?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO doctor_specialities (doctor_id, slot, speciality_id)
         VALUES (?1, ?2, ?3)",
    )?;
    for id in speciality_ids {
        stmt.execute(params![user_id, slot, id])?;
    }
    Ok(())
}

/// Doctor profiles with the owner's email, ordered by user id.
pub fn list_doctor_profiles(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<(String, DoctorProfile)>, DatabaseError> {
    let pattern = search.map(|s| format!("%{}%", s.trim()));
    let mut stmt = conn.prepare(
        "SELECT d.user_id, u.email FROM doctor_profiles d
         JOIN users u ON u.id = d.user_id
         WHERE ?1 IS NULL OR u.email LIKE ?1 OR d.qualification LIKE ?1
            OR d.experience LIKE ?1 OR d.highlights LIKE ?1
         ORDER BY d.user_id",
    )?;
    let ids = stmt
        .query_map(params![pattern], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut profiles = Vec::with_capacity(ids.len());
    for (user_id, email) in ids {
        if let Some(profile) = get_doctor_profile(conn, user_id)? {
            profiles.push((email, profile));
        }
    }
    Ok(profiles)
}

/// Remove a doctor profile; speciality slots go with it.
pub fn delete_doctor_profile(conn: &Connection, user_id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM doctor_profiles WHERE user_id = ?1", params![user_id])? > 0)
}
