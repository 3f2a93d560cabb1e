use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{invalid_choice, Language};
use crate::validation::{self, nullable, FieldErrors};

/// One-to-one extension of a user holding contact details and language
/// preferences. Keyed by the owning user's id.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub city: String,
    pub country: String,
    pub postal_code: String,
    pub address: String,
    pub primary_language: Language,
    pub secondary_language: Language,
    pub tertiary_language: Language,
    /// Path relative to the media root.
    pub image: Option<String>,
}

impl UserProfile {
    /// Blank profile as provisioned alongside a new user.
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            date_of_birth: None,
            city: String::new(),
            country: String::new(),
            postal_code: String::new(),
            address: String::new(),
            primary_language: Language::default(),
            secondary_language: Language::default(),
            tertiary_language: Language::default(),
            image: None,
        }
    }

    pub fn view(&self) -> ProfileView {
        ProfileView {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            date_of_birth: self.date_of_birth,
            city: self.city.clone(),
            country: self.country.clone(),
            postal_code: self.postal_code.clone(),
            address: self.address.clone(),
            image: self.image.as_deref().map(crate::media::media_url),
            primary_language: self.primary_language,
            secondary_language: self.secondary_language,
            tertiary_language: self.tertiary_language,
        }
    }
}

/// Profile as returned to clients; `image` is a URL.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub city: String,
    pub country: String,
    pub postal_code: String,
    pub address: String,
    pub image: Option<String>,
    pub primary_language: Language,
    pub secondary_language: Language,
    pub tertiary_language: Language,
}

/// Client-supplied profile fields. Absent fields leave the stored value
/// untouched; `phone` and `date_of_birth` may be cleared with `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<String>>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub primary_language: Option<String>,
    pub secondary_language: Option<String>,
    pub tertiary_language: Option<String>,
}

/// A patch whose values passed validation and are in stored form.
#[derive(Debug, Clone, Default)]
pub struct ValidProfilePatch {
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<Option<String>>,
    date_of_birth: Option<Option<NaiveDate>>,
    city: Option<String>,
    country: Option<String>,
    postal_code: Option<String>,
    address: Option<String>,
    primary_language: Option<Language>,
    secondary_language: Option<Language>,
    tertiary_language: Option<Language>,
}

/// Fields a doctor must fill in at signup.
pub const DOCTOR_REQUIRED_PROFILE_FIELDS: &[&str] =
    &["first_name", "last_name", "city", "country", "primary_language"];

impl ProfilePatch {
    fn text(&self, field: &str) -> Option<&str> {
        match field {
            "first_name" => self.first_name.as_deref(),
            "last_name" => self.last_name.as_deref(),
            "city" => self.city.as_deref(),
            "country" => self.country.as_deref(),
            "primary_language" => self.primary_language.as_deref(),
            _ => None,
        }
    }

    /// Validate and normalize. `required` names fields that must be present
    /// and non-blank (doctor signup); everything else is optional.
    pub fn validate(&self, required: &[&str]) -> Result<ValidProfilePatch, FieldErrors> {
        let mut errors = FieldErrors::new();

        for field in required {
            validation::required(&mut errors, field, self.text(field));
        }

        let limits = [
            ("first_name", self.first_name.as_deref(), 255),
            ("last_name", self.last_name.as_deref(), 255),
            ("city", self.city.as_deref(), 1024),
            ("postal_code", self.postal_code.as_deref(), 12),
            ("address", self.address.as_deref(), 1024),
        ];
        for (field, value, max) in limits {
            if let Some(value) = value {
                validation::max_length(&mut errors, field, value, max);
            }
        }

        let phone = match &self.phone {
            Some(Some(raw)) if raw.trim().is_empty() => Some(None),
            Some(Some(raw)) => match validation::normalize_phone(raw) {
                Some(p) => Some(Some(p)),
                None => {
                    errors.add("phone", "Enter a valid phone number.");
                    None
                }
            },
            Some(None) => Some(None),
            None => None,
        };

        let date_of_birth = match &self.date_of_birth {
            Some(Some(raw)) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(d) => Some(Some(d)),
                Err(_) => {
                    errors.add(
                        "date_of_birth",
                        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                    );
                    None
                }
            },
            Some(None) => Some(None),
            None => None,
        };

        let country = match self.country.as_deref() {
            Some(raw) if raw.trim().is_empty() => Some(String::new()),
            Some(raw) => match validation::normalize_country(raw) {
                Some(code) => Some(code),
                None => {
                    errors.add("country", invalid_choice(raw));
                    None
                }
            },
            None => None,
        };

        let mut language = |field: &str, value: &Option<String>| -> Option<Language> {
            let raw = value.as_deref()?;
            match raw.parse::<Language>() {
                Ok(lang) => Some(lang),
                Err(_) => {
                    // Already reported by `required` when blank.
                    if !errors.contains(field) {
                        errors.add(field, invalid_choice(raw));
                    }
                    None
                }
            }
        };
        let primary_language = language("primary_language", &self.primary_language);
        let secondary_language = language("secondary_language", &self.secondary_language);
        let tertiary_language = language("tertiary_language", &self.tertiary_language);

        errors.into_result()?;

        Ok(ValidProfilePatch {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone,
            date_of_birth,
            city: self.city.clone(),
            country,
            postal_code: self.postal_code.clone(),
            address: self.address.clone(),
            primary_language,
            secondary_language,
            tertiary_language,
        })
    }
}

impl ValidProfilePatch {
    /// Overwrite only the fields present in the patch.
    pub fn apply(&self, profile: &mut UserProfile) {
        fn merge<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        merge(&mut profile.first_name, &self.first_name);
        merge(&mut profile.last_name, &self.last_name);
        merge(&mut profile.phone, &self.phone);
        merge(&mut profile.date_of_birth, &self.date_of_birth);
        merge(&mut profile.city, &self.city);
        merge(&mut profile.country, &self.country);
        merge(&mut profile.postal_code, &self.postal_code);
        merge(&mut profile.address, &self.address);
        merge(&mut profile.primary_language, &self.primary_language);
        merge(&mut profile.secondary_language, &self.secondary_language);
        merge(&mut profile.tertiary_language, &self.tertiary_language);
    }
}
