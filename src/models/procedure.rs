use serde::{Deserialize, Serialize};

/// Catalog entry for a medical procedure offered through the directory.
/// `name` and `speciality` are stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: i64,
    pub name: String,
    pub speciality: String,
    pub days_in_hospital: i64,
    pub days_in_destination: i64,
    pub duration_minutes: i64,
    pub overview: String,
    pub other_details: String,
}
