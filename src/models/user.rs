use chrono::{DateTime, Utc};
use serde::Serialize;

/// Account row. Email is the login identifier; username is a unique handle.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_doctor: bool,
    pub created_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Values for inserting an account. `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_doctor: bool,
}

impl NewUser {
    pub fn patient(email: String, username: String, password: String) -> Self {
        Self {
            email,
            username,
            password,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            is_doctor: false,
        }
    }

    /// Doctors start inactive until staff review them.
    pub fn doctor(email: String, username: String, password: String) -> Self {
        Self {
            is_active: false,
            is_doctor: true,
            ..Self::patient(email, username, password)
        }
    }

    pub fn superuser(email: String, username: String, password: String) -> Self {
        Self {
            is_staff: true,
            is_superuser: true,
            ..Self::patient(email, username, password)
        }
    }
}
