use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{classify_write_error, DatabaseError};
use crate::models::*;

fn not_found(entity_type: &str, id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}

fn pattern(search: Option<&str>) -> Option<String> {
    search.map(|s| format!("%{}%", s.trim()))
}

// ---------- Hospitals ----------

const HOSPITAL_COLUMNS: &str =
    "id, name, city, country, address, phone, website, description, created_date";

fn row_to_hospital(row: &Row<'_>) -> rusqlite::Result<Hospital> {
    Ok(Hospital {
        id: row.get(0)?,
        name: row.get(1)?,
        city: row.get(2)?,
        country: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        website: row.get(6)?,
        description: row.get(7)?,
        created_date: row.get(8)?,
    })
}

/// Insert a hospital; `id` and `created_date` are assigned here.
pub fn insert_hospital(conn: &Connection, h: &Hospital) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO hospitals (name, city, country, address, phone, website, description,
         created_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![h.name, h.city, h.country, h.address, h.phone, h.website, h.description, Utc::now()],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_hospital(conn: &Connection, id: i64) -> Result<Option<Hospital>, DatabaseError> {
    let sql = format!("SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], row_to_hospital).optional()?)
}

pub fn list_hospitals(conn: &Connection, search: Option<&str>) -> Result<Vec<Hospital>, DatabaseError> {
    let sql = format!(
        "SELECT {HOSPITAL_COLUMNS} FROM hospitals
         WHERE ?1 IS NULL OR name LIKE ?1 OR city LIKE ?1 OR country LIKE ?1
         ORDER BY name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern(search)], row_to_hospital)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_hospital(conn: &Connection, h: &Hospital) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE hospitals SET name = ?2, city = ?3, country = ?4, address = ?5, phone = ?6,
             website = ?7, description = ?8 WHERE id = ?1",
            params![h.id, h.name, h.city, h.country, h.address, h.phone, h.website, h.description],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(not_found("Hospital", h.id));
    }
    Ok(())
}

/// Delete a hospital; accreditations, services and associations cascade.
pub fn delete_hospital(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM hospitals WHERE id = ?1", params![id])? > 0)
}

// ---------- Accreditations ----------

fn row_to_accreditation(row: &Row<'_>) -> rusqlite::Result<Accreditation> {
    Ok(Accreditation {
        id: row.get(0)?,
        hospital_id: row.get(1)?,
        name: row.get(2)?,
        issued_by: row.get(3)?,
        valid_until: row.get(4)?,
    })
}

pub fn insert_accreditation(conn: &Connection, a: &Accreditation) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO accreditations (hospital_id, name, issued_by, valid_until)
         VALUES (?1, ?2, ?3, ?4)",
        params![a.hospital_id, a.name, a.issued_by, a.valid_until],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_accreditation(conn: &Connection, id: i64) -> Result<Option<Accreditation>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, hospital_id, name, issued_by, valid_until FROM accreditations
             WHERE id = ?1",
            params![id],
            row_to_accreditation,
        )
        .optional()?)
}

pub fn list_accreditations(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<Accreditation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.hospital_id, a.name, a.issued_by, a.valid_until
         FROM accreditations a JOIN hospitals h ON h.id = a.hospital_id
         WHERE ?1 IS NULL OR a.name LIKE ?1 OR a.issued_by LIKE ?1 OR h.name LIKE ?1
         ORDER BY a.id",
    )?;
    let rows = stmt.query_map(params![pattern(search)], row_to_accreditation)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_accreditation(conn: &Connection, a: &Accreditation) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE accreditations SET hospital_id = ?2, name = ?3, issued_by = ?4,
             valid_until = ?5 WHERE id = ?1",
            params![a.id, a.hospital_id, a.name, a.issued_by, a.valid_until],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(not_found("Accreditation", a.id));
    }
    Ok(())
}

pub fn delete_accreditation(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM accreditations WHERE id = ?1", params![id])? > 0)
}

// ---------- Services ----------

fn row_to_service(row: &Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        hospital_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn insert_service(conn: &Connection, s: &Service) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO services (hospital_id, name, description) VALUES (?1, ?2, ?3)",
        params![s.hospital_id, s.name, s.description],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_service(conn: &Connection, id: i64) -> Result<Option<Service>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, hospital_id, name, description FROM services WHERE id = ?1",
            params![id],
            row_to_service,
        )
        .optional()?)
}

pub fn list_services(conn: &Connection, search: Option<&str>) -> Result<Vec<Service>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.hospital_id, s.name, s.description
         FROM services s JOIN hospitals h ON h.id = s.hospital_id
         WHERE ?1 IS NULL OR s.name LIKE ?1 OR h.name LIKE ?1
         ORDER BY s.id",
    )?;
    let rows = stmt.query_map(params![pattern(search)], row_to_service)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_service(conn: &Connection, s: &Service) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE services SET hospital_id = ?2, name = ?3, description = ?4 WHERE id = ?1",
            params![s.id, s.hospital_id, s.name, s.description],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(not_found("Service", s.id));
    }
    Ok(())
}

pub fn delete_service(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM services WHERE id = ?1", params![id])? > 0)
}

// ---------- Hospital doctors ----------

pub fn insert_hospital_doctor(conn: &Connection, link: &HospitalDoctor) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO hospital_doctors (hospital_id, doctor_id) VALUES (?1, ?2)",
        params![link.hospital_id, link.doctor_id],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_hospital_doctor(conn: &Connection, id: i64) -> Result<Option<HospitalDoctor>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, hospital_id, doctor_id FROM hospital_doctors WHERE id = ?1",
            params![id],
            |row| {
                Ok(HospitalDoctor {
                    id: row.get(0)?,
                    hospital_id: row.get(1)?,
                    doctor_id: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn list_hospital_doctors(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<HospitalDoctor>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT hd.id, hd.hospital_id, hd.doctor_id
         FROM hospital_doctors hd
         JOIN hospitals h ON h.id = hd.hospital_id
         JOIN users u ON u.id = hd.doctor_id
         WHERE ?1 IS NULL OR h.name LIKE ?1 OR u.email LIKE ?1
         ORDER BY hd.id",
    )?;
    let rows = stmt.query_map(params![pattern(search)], |row| {
        Ok(HospitalDoctor {
            id: row.get(0)?,
            hospital_id: row.get(1)?,
            doctor_id: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_hospital_doctor(conn: &Connection, link: &HospitalDoctor) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE hospital_doctors SET hospital_id = ?2, doctor_id = ?3 WHERE id = ?1",
            params![link.id, link.hospital_id, link.doctor_id],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(not_found("HospitalDoctor", link.id));
    }
    Ok(())
}

pub fn delete_hospital_doctor(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM hospital_doctors WHERE id = ?1", params![id])? > 0)
}

// ---------- Hospital procedures ----------

fn row_to_hospital_procedure(row: &Row<'_>) -> rusqlite::Result<HospitalProcedure> {
    Ok(HospitalProcedure {
        id: row.get(0)?,
        hospital_id: row.get(1)?,
        procedure_id: row.get(2)?,
        price: row.get(3)?,
    })
}

pub fn insert_hospital_procedure(
    conn: &Connection,
    link: &HospitalProcedure,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO hospital_procedures (hospital_id, procedure_id, price) VALUES (?1, ?2, ?3)",
        params![link.hospital_id, link.procedure_id, link.price],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_hospital_procedure(
    conn: &Connection,
    id: i64,
) -> Result<Option<HospitalProcedure>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, hospital_id, procedure_id, price FROM hospital_procedures WHERE id = ?1",
            params![id],
            row_to_hospital_procedure,
        )
        .optional()?)
}

pub fn list_hospital_procedures(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<HospitalProcedure>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT hp.id, hp.hospital_id, hp.procedure_id, hp.price
         FROM hospital_procedures hp
         JOIN hospitals h ON h.id = hp.hospital_id
         JOIN procedures p ON p.id = hp.procedure_id
         WHERE ?1 IS NULL OR h.name LIKE ?1 OR p.name LIKE ?1
         ORDER BY hp.id",
    )?;
    let rows = stmt.query_map(params![pattern(search)], row_to_hospital_procedure)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_hospital_procedure(
    conn: &Connection,
    link: &HospitalProcedure,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE hospital_procedures SET hospital_id = ?2, procedure_id = ?3, price = ?4
             WHERE id = ?1",
            params![link.id, link.hospital_id, link.procedure_id, link.price],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(not_found("HospitalProcedure", link.id));
    }
    Ok(())
}

pub fn delete_hospital_procedure(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM hospital_procedures WHERE id = ?1", params![id])? > 0)
}

// ---------- Hospital languages ----------

fn row_to_hospital_language(row: &Row<'_>) -> rusqlite::Result<HospitalLanguage> {
    let raw: String = row.get(2)?;
    let language = raw.parse().map_err(|e: DatabaseError| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(HospitalLanguage {
        id: row.get(0)?,
        hospital_id: row.get(1)?,
        language,
    })
}

pub fn insert_hospital_language(
    conn: &Connection,
    link: &HospitalLanguage,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO hospital_languages (hospital_id, language) VALUES (?1, ?2)",
        params![link.hospital_id, link.language.as_str()],
    )
    .map_err(classify_write_error)?;
    Ok(conn.last_insert_rowid())
}

pub fn get_hospital_language(
    conn: &Connection,
    id: i64,
) -> Result<Option<HospitalLanguage>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, hospital_id, language FROM hospital_languages WHERE id = ?1",
            params![id],
            row_to_hospital_language,
        )
        .optional()?)
}

pub fn list_hospital_languages(
    conn: &Connection,
    search: Option<&str>,
) -> Result<Vec<HospitalLanguage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT hl.id, hl.hospital_id, hl.language
         FROM hospital_languages hl JOIN hospitals h ON h.id = hl.hospital_id
         WHERE ?1 IS NULL OR h.name LIKE ?1 OR hl.language LIKE ?1
         ORDER BY hl.id",
    )?;
    let rows = stmt.query_map(params![pattern(search)], row_to_hospital_language)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn update_hospital_language(
    conn: &Connection,
    link: &HospitalLanguage,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE hospital_languages SET hospital_id = ?2, language = ?3 WHERE id = ?1",
            params![link.id, link.hospital_id, link.language.as_str()],
        )
        .map_err(classify_write_error)?;
    if changed == 0 {
        return Err(not_found("HospitalLanguage", link.id));
    }
    Ok(())
}

pub fn delete_hospital_language(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    Ok(conn.execute("DELETE FROM hospital_languages WHERE id = ?1", params![id])? > 0)
}
