use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::enums::Language;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hospital {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub country: String,
    pub address: String,
    pub phone: Option<String>,
    pub website: String,
    pub description: String,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accreditation {
    pub id: i64,
    pub hospital_id: i64,
    pub name: String,
    pub issued_by: String,
    pub valid_until: Option<NaiveDate>,
}

/// A service (department, facility) a hospital offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub id: i64,
    pub hospital_id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalDoctor {
    pub id: i64,
    pub hospital_id: i64,
    pub doctor_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalProcedure {
    pub id: i64,
    pub hospital_id: i64,
    pub procedure_id: i64,
    pub price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalLanguage {
    pub id: i64,
    pub hospital_id: i64,
    pub language: Language,
}
