//! Account lifecycle: registration, authentication, token issuance and the
//! nested user / profile / doctor-profile update.
//!
//! Every account owns exactly one profile row, created in the same
//! transaction as the user. Doctors additionally own a doctor profile.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{self, CryptoError, PasswordHasher, MIN_PASSWORD_LENGTH};
use crate::db::{self, DatabaseError};
use crate::media::{self, ImageUpload, MediaError, MediaStore};
use crate::models::*;
use crate::validation::{self, FieldErrors, NON_FIELD};

pub const EMAIL_MAX_LENGTH: usize = 255;
pub const USERNAME_MAX_LENGTH: usize = 30;

pub const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";
pub const INACTIVE_ACCOUNT: &str = "Account is inactive. Please wait for activation.";

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Invalid input: {}", .0.summary())]
    Invalid(FieldErrors),

    #[error("Unable to authenticate with provided credentials.")]
    BadCredentials,

    #[error("Account is inactive. Please wait for activation.")]
    Inactive,

    #[error("Account not found: {0}")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Password hash error: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<rusqlite::Error> for AccountError {
    fn from(err: rusqlite::Error) -> Self {
        AccountError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<MediaError> for AccountError {
    /// Client-side upload problems become `image` field errors.
    fn from(err: MediaError) -> Self {
        if err.is_client_error() {
            AccountError::Invalid(FieldErrors::single("image", err.to_string()))
        } else {
            AccountError::Media(err)
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub profile: Option<ProfilePatch>,
    pub doctor_profile: Option<DoctorProfilePatch>,
}

impl DoctorSignupRequest {
    fn credentials(&self) -> SignupRequest {
        SignupRequest {
            email: self.email.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Which `me` endpoint an update came through. Doctor-profile fields are
/// only applied through the doctor endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateVia {
    User,
    Doctor,
}

/// Update payload for `me` endpoints. `email` and `password` are accepted
/// by the deserializer but never applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub profile: Option<ProfilePatch>,
    pub doctor_profile: Option<DoctorProfilePatch>,
}

// ═══════════════════════════════════════════════════════════
// Views
// ═══════════════════════════════════════════════════════════

/// Signup response. Never includes the password.
#[derive(Debug, Clone, Serialize)]
pub struct SignupView {
    pub email: String,
    pub username: String,
    pub is_active: bool,
    pub is_doctor: bool,
    pub is_staff: bool,
}

impl From<&User> for SignupView {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
            is_active: user.is_active,
            is_doctor: user.is_doctor,
            is_staff: user.is_staff,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSignupView {
    #[serde(flatten)]
    pub account: SignupView,
    pub profile: ProfileView,
    pub doctor_profile: DoctorProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_date: DateTime<Utc>,
    pub profile: ProfileView,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorAccountView {
    #[serde(flatten)]
    pub account: AccountView,
    /// `None` for accounts that are not doctors.
    pub doctor_profile: Option<DoctorProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub id: i64,
    pub image: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════

/// Field checks shared by every kind of registration. Returns the
/// normalized `(email, username, password)` when all three are usable.
fn check_credentials(
    conn: &Connection,
    req: &SignupRequest,
    errors: &mut FieldErrors,
) -> Result<Option<(String, String, String)>, DatabaseError> {
    let email = validation::required(errors, "email", req.email.as_deref())
        .map(validation::normalize_email)
        .filter(|email| {
            if !validation::is_valid_email(email) {
                errors.add("email", "Enter a valid email address.");
                return false;
            }
            let before = errors.get("email").map_or(0, <[String]>::len);
            validation::max_length(errors, "email", email, EMAIL_MAX_LENGTH);
            errors.get("email").map_or(0, <[String]>::len) == before
        });

    let username = validation::required(errors, "username", req.username.as_deref())
        .map(|u| u.trim().to_string())
        .filter(|username| {
            let before = errors.get("username").map_or(0, <[String]>::len);
            validation::max_length(errors, "username", username, USERNAME_MAX_LENGTH);
            errors.get("username").map_or(0, <[String]>::len) == before
        });

    let password = validation::required(errors, "password", req.password.as_deref())
        .filter(|password| {
            let before = errors.get("password").map_or(0, <[String]>::len);
            validation::min_length(errors, "password", password, MIN_PASSWORD_LENGTH);
            errors.get("password").map_or(0, <[String]>::len) == before
        })
        .map(str::to_string);

    if let Some(email) = &email {
        if db::is_taken(conn, "email", email, None)? {
            errors.add("email", "user with this email already exists.");
        }
    }
    if let Some(username) = &username {
        if db::is_taken(conn, "username", username, None)? {
            errors.add("username", "user with this username already exists.");
        }
    }

    Ok(match (email, username, password) {
        (Some(e), Some(u), Some(p)) => Some((e, u, p)),
        _ => None,
    })
}

/// Turn a uniqueness failure raced past the pre-check into a field error.
fn unique_to_field(err: DatabaseError) -> AccountError {
    if let Some(column @ ("email" | "username")) = err.unique_column() {
        let message = format!("user with this {column} already exists.");
        return AccountError::Invalid(FieldErrors::single(column, message));
    }
    AccountError::Database(err)
}

fn insert_with_profile(conn: &mut Connection, new_user: &NewUser) -> Result<i64, AccountError> {
    let tx = conn.transaction()?;
    let id = db::insert_user(&tx, new_user).map_err(unique_to_field)?;
    db::ensure_profile(&tx, id)?;
    if new_user.is_doctor {
        db::ensure_doctor_profile(&tx, id)?;
    }
    tx.commit()?;
    Ok(id)
}

fn load_user(conn: &Connection, id: i64) -> Result<User, AccountError> {
    db::get_user(conn, id)?.ok_or(AccountError::NotFound(id))
}

/// Register a regular (patient) account.
pub fn create_user(
    conn: &mut Connection,
    hasher: &PasswordHasher,
    req: &SignupRequest,
) -> Result<User, AccountError> {
    let mut errors = FieldErrors::new();
    let creds = check_credentials(conn, req, &mut errors)?;
    errors.into_result().map_err(AccountError::Invalid)?;
    let Some((email, username, password)) = creds else {
        return Err(AccountError::Invalid(FieldErrors::single(NON_FIELD, "Invalid input")));
    };

    let id = insert_with_profile(conn, &NewUser::patient(email, username, hasher.hash(&password)))?;
    tracing::info!(user_id = id, "User registered");
    load_user(conn, id)
}

/// Register a staff superuser (CLI and admin console).
pub fn create_superuser(
    conn: &mut Connection,
    hasher: &PasswordHasher,
    req: &SignupRequest,
) -> Result<User, AccountError> {
    let mut errors = FieldErrors::new();
    let creds = check_credentials(conn, req, &mut errors)?;
    errors.into_result().map_err(AccountError::Invalid)?;
    let Some((email, username, password)) = creds else {
        return Err(AccountError::Invalid(FieldErrors::single(NON_FIELD, "Invalid input")));
    };

    let id = insert_with_profile(
        conn,
        &NewUser::superuser(email, username, hasher.hash(&password)),
    )?;
    tracing::info!(user_id = id, "Superuser created");
    load_user(conn, id)
}

/// Register a doctor. The account starts inactive; the nested profile is
/// required and must carry name, city, country and primary language.
pub fn create_doctor(
    conn: &mut Connection,
    hasher: &PasswordHasher,
    req: &DoctorSignupRequest,
) -> Result<DoctorSignupView, AccountError> {
    let mut errors = FieldErrors::new();
    let creds = check_credentials(conn, &req.credentials(), &mut errors)?;

    let profile_patch = match &req.profile {
        Some(patch) => match patch.validate(DOCTOR_REQUIRED_PROFILE_FIELDS) {
            Ok(valid) => Some(valid),
            Err(nested) => {
                errors.extend_prefixed("profile", nested);
                None
            }
        },
        None => {
            errors.add("profile", validation::REQUIRED);
            None
        }
    };

    if let Some(doctor_patch) = &req.doctor_profile {
        check_doctor_patch(conn, doctor_patch, &mut errors)?;
    }

    errors.into_result().map_err(AccountError::Invalid)?;
    let (Some((email, username, password)), Some(profile_patch)) = (creds, profile_patch) else {
        return Err(AccountError::Invalid(FieldErrors::single(NON_FIELD, "Invalid input")));
    };

    let new_user = NewUser::doctor(email, username, hasher.hash(&password));
    let tx = conn.transaction()?;
    let id = db::insert_user(&tx, &new_user).map_err(unique_to_field)?;
    db::ensure_profile(&tx, id)?;
    db::ensure_doctor_profile(&tx, id)?;

    let mut profile = db::get_profile(&tx, id)?.unwrap_or_else(|| UserProfile::empty(id));
    profile_patch.apply(&mut profile);
    db::update_profile(&tx, &profile)?;

    let mut doctor = db::get_doctor_profile(&tx, id)?.unwrap_or_else(|| DoctorProfile::empty(id));
    if let Some(doctor_patch) = &req.doctor_profile {
        doctor_patch.apply(&mut doctor);
        db::update_doctor_profile(&tx, &doctor)?;
    }
    tx.commit()?;

    tracing::info!(user_id = id, "Doctor registered, awaiting activation");
    let user = load_user(conn, id)?;
    Ok(DoctorSignupView {
        account: SignupView::from(&user),
        profile: profile.view(),
        doctor_profile: doctor,
    })
}

fn check_doctor_patch(
    conn: &Connection,
    patch: &DoctorProfilePatch,
    errors: &mut FieldErrors,
) -> Result<(), DatabaseError> {
    let ids: Vec<i64> = patch.referenced_specialities().into_iter().map(|(_, id)| id).collect();
    let missing = db::missing_specialities(conn, &ids)?;
    if let Err(nested) = patch.check_specialities(&missing) {
        errors.extend_prefixed("doctor_profile", nested);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Authentication & tokens
// ═══════════════════════════════════════════════════════════

/// Check credentials. Inactive accounts with a correct password are
/// reported as `Inactive` so callers can tell them apart.
pub fn authenticate(
    conn: &Connection,
    hasher: &PasswordHasher,
    email: &str,
    password: &str,
) -> Result<User, AccountError> {
    let email = validation::normalize_email(email);
    let Some(user) = db::get_user_by_email(conn, &email)? else {
        hasher.verify_absent(password);
        return Err(AccountError::BadCredentials);
    };
    if !hasher.verify(password, &user.password)? {
        return Err(AccountError::BadCredentials);
    }
    if !user.is_active {
        return Err(AccountError::Inactive);
    }
    db::touch_last_login(conn, user.id)?;
    Ok(user)
}

/// Issue a new token for `scope`. Tokens issued earlier stay valid until
/// revoked, so each client keeps its own.
pub fn issue_token(conn: &Connection, user_id: i64, scope: TokenScope) -> Result<String, AccountError> {
    let token = crypto::generate_token();
    db::store_token(conn, user_id, scope, &crypto::hash_token(&token))?;
    tracing::info!(user_id, scope = scope.as_str(), "Token issued");
    Ok(token)
}

/// Validate a token request, authenticate and issue an API token.
pub fn login(
    conn: &Connection,
    hasher: &PasswordHasher,
    req: &TokenRequest,
    scope: TokenScope,
) -> Result<(User, String), AccountError> {
    let mut errors = FieldErrors::new();
    let email = validation::required(&mut errors, "email", req.email.as_deref());
    let password = validation::required(&mut errors, "password", req.password.as_deref());
    errors.into_result().map_err(AccountError::Invalid)?;
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AccountError::BadCredentials);
    };

    let user = authenticate(conn, hasher, email, password)?;
    let token = issue_token(conn, user.id, scope)?;
    Ok((user, token))
}

/// Resolve a presented token to an active user.
pub fn user_for_token(
    conn: &Connection,
    token: &str,
    scope: TokenScope,
) -> Result<Option<User>, AccountError> {
    let Some(user_id) = db::find_token_owner(conn, &crypto::hash_token(token), scope)? else {
        return Ok(None);
    };
    Ok(db::get_user(conn, user_id)?.filter(|u| u.is_active))
}

/// Revoke one presented token. Returns whether it existed.
pub fn revoke_token(conn: &Connection, token: &str, scope: TokenScope) -> Result<bool, AccountError> {
    Ok(db::delete_token(conn, &crypto::hash_token(token), scope)?)
}

/// Revoke every token of the user, in all scopes.
pub fn revoke_all_tokens(conn: &Connection, user_id: i64) -> Result<(), AccountError> {
    let revoked = db::delete_user_tokens(conn, user_id)?;
    tracing::info!(user_id, revoked, "Tokens revoked");
    Ok(())
}

pub fn set_password(
    conn: &Connection,
    hasher: &PasswordHasher,
    user_id: i64,
    password: &str,
) -> Result<(), AccountError> {
    let mut errors = FieldErrors::new();
    validation::min_length(&mut errors, "password", password, MIN_PASSWORD_LENGTH);
    errors.into_result().map_err(AccountError::Invalid)?;
    db::update_password(conn, user_id, &hasher.hash(password))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Retrieval & update
// ═══════════════════════════════════════════════════════════

pub fn account_view(conn: &Connection, user: &User) -> Result<AccountView, AccountError> {
    let profile = db::get_profile(conn, user.id)?.unwrap_or_else(|| UserProfile::empty(user.id));
    Ok(AccountView {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        created_date: user.created_date,
        profile: profile.view(),
    })
}

pub fn doctor_account_view(conn: &Connection, user: &User) -> Result<DoctorAccountView, AccountError> {
    let doctor_profile = if user.is_doctor {
        Some(db::get_doctor_profile(conn, user.id)?.unwrap_or_else(|| DoctorProfile::empty(user.id)))
    } else {
        None
    };
    Ok(DoctorAccountView {
        account: account_view(conn, user)?,
        doctor_profile,
    })
}

/// Apply an update to the account, its profile and (for doctors updating
/// through the doctor endpoint) its doctor profile. Only fields present in
/// the payload change. With `partial == false` the username is required,
/// and a doctor's nested profile must carry the signup-required fields.
pub fn update_user(
    conn: &mut Connection,
    user: &User,
    patch: &UserPatch,
    partial: bool,
    via: UpdateVia,
) -> Result<User, AccountError> {
    let doctor_update = via == UpdateVia::Doctor && user.is_doctor;
    let mut errors = FieldErrors::new();

    let username = match patch.username.as_deref() {
        None if !partial => {
            errors.add("username", validation::REQUIRED);
            None
        }
        None => None,
        Some(raw) => validation::required(&mut errors, "username", Some(raw))
            .map(|u| u.trim().to_string())
            .filter(|u| {
                let before = errors.get("username").map_or(0, <[String]>::len);
                validation::max_length(&mut errors, "username", u, USERNAME_MAX_LENGTH);
                errors.get("username").map_or(0, <[String]>::len) == before
            }),
    };
    if let Some(username) = &username {
        if db::is_taken(conn, "username", username, Some(user.id))? {
            errors.add("username", "user with this username already exists.");
        }
    }

    let required: &[&str] = if doctor_update && !partial {
        DOCTOR_REQUIRED_PROFILE_FIELDS
    } else {
        &[]
    };
    let profile_patch = match &patch.profile {
        Some(p) => match p.validate(required) {
            Ok(valid) => Some(valid),
            Err(nested) => {
                errors.extend_prefixed("profile", nested);
                None
            }
        },
        None => None,
    };

    let doctor_patch = patch.doctor_profile.as_ref().filter(|_| doctor_update);
    if let Some(doctor_patch) = doctor_patch {
        check_doctor_patch(conn, doctor_patch, &mut errors)?;
    }

    errors.into_result().map_err(AccountError::Invalid)?;

    let tx = conn.transaction()?;
    if let Some(username) = username {
        let mut updated = user.clone();
        updated.username = username;
        db::update_user_account(&tx, &updated).map_err(unique_to_field)?;
    }

    db::ensure_profile(&tx, user.id)?;
    if let Some(valid) = profile_patch {
        let mut profile = db::get_profile(&tx, user.id)?.unwrap_or_else(|| UserProfile::empty(user.id));
        valid.apply(&mut profile);
        db::update_profile(&tx, &profile)?;
    }

    if let Some(doctor_patch) = doctor_patch {
        db::ensure_doctor_profile(&tx, user.id)?;
        let mut doctor =
            db::get_doctor_profile(&tx, user.id)?.unwrap_or_else(|| DoctorProfile::empty(user.id));
        doctor_patch.apply(&mut doctor);
        db::update_doctor_profile(&tx, &doctor)?;
    }
    tx.commit()?;

    tracing::info!(user_id = user.id, "Account updated");
    load_user(conn, user.id)
}

/// Current profile image as a URL view.
pub fn image_view(conn: &Connection, user_id: i64) -> Result<ImageView, AccountError> {
    let image = db::get_profile(conn, user_id)?.and_then(|p| p.image);
    Ok(ImageView {
        id: user_id,
        image: image.as_deref().map(media::media_url),
    })
}

/// Replace or clear the profile image. The new upload is fully validated
/// first; the previous file is deleted before the new one is written.
pub fn set_profile_image(
    conn: &Connection,
    store: &MediaStore,
    user_id: i64,
    upload: Option<ImageUpload>,
) -> Result<ImageView, AccountError> {
    let valid = upload.map(|u| store.validate(u)).transpose()?;

    db::ensure_profile(conn, user_id)?;
    if let Some(old) = db::get_profile(conn, user_id)?.and_then(|p| p.image) {
        store.delete(&old)?;
        db::set_profile_image(conn, user_id, None)?;
    }

    let stored = match valid {
        Some(image) => {
            let rel = store.store(image)?;
            if let Err(e) = db::set_profile_image(conn, user_id, Some(&rel)) {
                let _ = store.delete(&rel);
                return Err(e.into());
            }
            Some(rel)
        }
        None => None,
    };

    Ok(ImageView {
        id: user_id,
        image: stored.as_deref().map(media::media_url),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_memory_database;

    pub(crate) fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    fn signup(email: &str, username: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: Some(email.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    fn doctor_request(specialities: Vec<i64>) -> DoctorSignupRequest {
        serde_json::from_value(serde_json::json!({
            "email": "doc@curesio.com",
            "username": "drsen",
            "password": "longpassword",
            "profile": {
                "first_name": "Ravi",
                "last_name": "Sen",
                "city": "Kolkata",
                "country": "IN",
                "primary_language": "BN"
            },
            "doctor_profile": {
                "qualification": "MBBS",
                "speciality1": specialities
            }
        }))
        .unwrap()
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn create_user_provisions_profile() {
        let mut conn = open_memory_database().unwrap();
        let user = create_user(&mut conn, &hasher(), &signup("a@Curesio.COM", "alice", "password1"))
            .unwrap();
        assert_eq!(user.email, "a@curesio.com");
        assert!(user.is_active);
        assert_ne!(user.password, "password1");
        assert!(db::get_profile(&conn, user.id).unwrap().is_some());
    }

    #[test]
    fn short_password_stores_nothing() {
        let mut conn = open_memory_database().unwrap();
        let err = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "pw"))
            .unwrap_err();
        let AccountError::Invalid(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("password"));
        assert_eq!(count(&conn, "users"), 0);
        assert_eq!(count(&conn, "user_profiles"), 0);
    }

    #[test]
    fn duplicate_email_and_username_are_field_errors() {
        let mut conn = open_memory_database().unwrap();
        create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1")).unwrap();
        let err = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap_err();
        let AccountError::Invalid(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("email"));
        assert!(errors.contains("username"));
    }

    #[test]
    fn missing_and_malformed_fields_are_reported() {
        let mut conn = open_memory_database().unwrap();
        let req = SignupRequest {
            email: Some("not-an-email".into()),
            username: None,
            password: Some("".into()),
        };
        let AccountError::Invalid(errors) = create_user(&mut conn, &hasher(), &req).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("email").unwrap()[0], "Enter a valid email address.");
        assert_eq!(errors.get("username").unwrap()[0], validation::REQUIRED);
        assert_eq!(errors.get("password").unwrap()[0], validation::BLANK);
    }

    #[test]
    fn superuser_is_staff() {
        let mut conn = open_memory_database().unwrap();
        let user = create_superuser(&mut conn, &hasher(), &signup("root@curesio.com", "root", "password1"))
            .unwrap();
        assert!(user.is_staff && user.is_superuser && user.is_active);
    }

    #[test]
    fn doctor_signup_stores_nested_data_inactive() {
        let mut conn = open_memory_database().unwrap();
        let cardio = db::insert_speciality(&conn, "Cardiology").unwrap();
        let view = create_doctor(&mut conn, &hasher(), &doctor_request(vec![cardio])).unwrap();
        assert!(view.account.is_doctor);
        assert!(!view.account.is_active);
        assert_eq!(view.profile.city, "Kolkata");
        assert_eq!(view.profile.primary_language, Language::Bengali);
        assert_eq!(view.doctor_profile.qualification, "MBBS");
        assert_eq!(view.doctor_profile.speciality1, vec![cardio]);

        let user = db::get_user_by_email(&conn, "doc@curesio.com").unwrap().unwrap();
        let stored = db::get_doctor_profile(&conn, user.id).unwrap().unwrap();
        assert_eq!(stored.speciality1, vec![cardio]);
    }

    #[test]
    fn doctor_signup_requires_profile_fields() {
        let mut conn = open_memory_database().unwrap();
        let mut req = doctor_request(vec![]);
        req.profile = Some(ProfilePatch {
            first_name: Some("Ravi".into()),
            ..ProfilePatch::default()
        });
        let AccountError::Invalid(errors) = create_doctor(&mut conn, &hasher(), &req).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains("profile.city"));
        assert!(errors.contains("profile.primary_language"));
        assert_eq!(count(&conn, "users"), 0);

        req.profile = None;
        let AccountError::Invalid(errors) = create_doctor(&mut conn, &hasher(), &req).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains("profile"));
    }

    #[test]
    fn doctor_signup_rejects_unknown_speciality() {
        let mut conn = open_memory_database().unwrap();
        let AccountError::Invalid(errors) =
            create_doctor(&mut conn, &hasher(), &doctor_request(vec![77])).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains("doctor_profile.speciality1"));
    }

    #[test]
    fn repeat_logins_keep_earlier_tokens() {
        let mut conn = open_memory_database().unwrap();
        create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1")).unwrap();
        let req = TokenRequest {
            email: Some("a@curesio.com".into()),
            password: Some("password1".into()),
        };
        let (user, first) = login(&conn, &hasher(), &req, TokenScope::Api).unwrap();
        let (_, second) = login(&conn, &hasher(), &req, TokenScope::Api).unwrap();
        assert_ne!(first, second);
        for token in [&first, &second] {
            assert_eq!(
                user_for_token(&conn, token, TokenScope::Api).unwrap().unwrap().id,
                user.id
            );
        }
        assert!(user_for_token(&conn, &second, TokenScope::Admin).unwrap().is_none());
        assert!(db::get_user(&conn, user.id).unwrap().unwrap().last_login.is_some());

        assert!(revoke_token(&conn, &first, TokenScope::Api).unwrap());
        assert!(!revoke_token(&conn, &first, TokenScope::Api).unwrap());
        assert!(user_for_token(&conn, &first, TokenScope::Api).unwrap().is_none());
        assert!(user_for_token(&conn, &second, TokenScope::Api).unwrap().is_some());

        revoke_all_tokens(&conn, user.id).unwrap();
        assert_eq!(count(&conn, "auth_tokens"), 0);
    }

    #[test]
    fn login_failures() {
        let mut conn = open_memory_database().unwrap();
        create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1")).unwrap();
        let wrong = TokenRequest {
            email: Some("a@curesio.com".into()),
            password: Some("password2".into()),
        };
        assert!(matches!(
            login(&conn, &hasher(), &wrong, TokenScope::Api),
            Err(AccountError::BadCredentials)
        ));
        let unknown = TokenRequest {
            email: Some("nobody@curesio.com".into()),
            password: Some("password1".into()),
        };
        assert!(matches!(
            login(&conn, &hasher(), &unknown, TokenScope::Api),
            Err(AccountError::BadCredentials)
        ));
        assert!(matches!(
            login(&conn, &hasher(), &TokenRequest::default(), TokenScope::Api),
            Err(AccountError::Invalid(_))
        ));
        assert_eq!(count(&conn, "auth_tokens"), 0);
    }

    #[test]
    fn inactive_doctor_cannot_log_in() {
        let mut conn = open_memory_database().unwrap();
        create_doctor(&mut conn, &hasher(), &doctor_request(vec![])).unwrap();
        let req = TokenRequest {
            email: Some("doc@curesio.com".into()),
            password: Some("longpassword".into()),
        };
        assert!(matches!(
            login(&conn, &hasher(), &req, TokenScope::Api),
            Err(AccountError::Inactive)
        ));
    }

    #[test]
    fn update_merges_only_supplied_fields() {
        let mut conn = open_memory_database().unwrap();
        let user = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap();
        let first: UserPatch = serde_json::from_value(serde_json::json!({
            "profile": {"first_name": "Alice", "city": "Dhaka"}
        }))
        .unwrap();
        update_user(&mut conn, &user, &first, true, UpdateVia::User).unwrap();

        let second: UserPatch = serde_json::from_value(serde_json::json!({
            "email": "new@curesio.com",
            "password": "changed-password",
            "profile": {"city": "Mumbai"}
        }))
        .unwrap();
        let updated = update_user(&mut conn, &user, &second, true, UpdateVia::User).unwrap();
        assert_eq!(updated.email, "a@curesio.com");
        assert_eq!(updated.password, user.password);

        let profile = db::get_profile(&conn, user.id).unwrap().unwrap();
        assert_eq!(profile.first_name, "Alice");
        assert_eq!(profile.city, "Mumbai");
    }

    #[test]
    fn update_recreates_missing_profile() {
        let mut conn = open_memory_database().unwrap();
        let user = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap();
        conn.execute("DELETE FROM user_profiles", []).unwrap();
        update_user(&mut conn, &user, &UserPatch::default(), true, UpdateVia::User).unwrap();
        assert!(db::get_profile(&conn, user.id).unwrap().is_some());
    }

    #[test]
    fn full_update_requires_username_and_rejects_taken() {
        let mut conn = open_memory_database().unwrap();
        create_user(&mut conn, &hasher(), &signup("b@curesio.com", "bob", "password1")).unwrap();
        let user = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap();

        let AccountError::Invalid(errors) =
            update_user(&mut conn, &user, &UserPatch::default(), false, UpdateVia::User).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(errors.contains("username"));

        let taken = UserPatch {
            username: Some("bob".into()),
            ..UserPatch::default()
        };
        assert!(matches!(
            update_user(&mut conn, &user, &taken, true, UpdateVia::User),
            Err(AccountError::Invalid(_))
        ));

        let own = UserPatch {
            username: Some("alice".into()),
            ..UserPatch::default()
        };
        assert_eq!(update_user(&mut conn, &user, &own, false, UpdateVia::User).unwrap().username, "alice");
    }

    #[test]
    fn doctor_slots_replaced_only_when_non_empty() {
        let mut conn = open_memory_database().unwrap();
        let cardio = db::insert_speciality(&conn, "Cardiology").unwrap();
        let neuro = db::insert_speciality(&conn, "Neurology").unwrap();
        create_doctor(&mut conn, &hasher(), &doctor_request(vec![cardio])).unwrap();
        let user = db::get_user_by_email(&conn, "doc@curesio.com").unwrap().unwrap();

        let patch: UserPatch = serde_json::from_value(serde_json::json!({
            "doctor_profile": {"speciality1": [], "speciality2": [neuro], "highlights": "Pioneer"}
        }))
        .unwrap();
        update_user(&mut conn, &user, &patch, true, UpdateVia::Doctor).unwrap();

        let doctor = db::get_doctor_profile(&conn, user.id).unwrap().unwrap();
        assert_eq!(doctor.speciality1, vec![cardio]);
        assert_eq!(doctor.speciality2, vec![neuro]);
        assert_eq!(doctor.highlights, "Pioneer");
        assert_eq!(doctor.qualification, "MBBS");
    }

    #[test]
    fn doctor_fields_ignored_through_user_endpoint() {
        let mut conn = open_memory_database().unwrap();
        create_doctor(&mut conn, &hasher(), &doctor_request(Vec::new())).unwrap();
        let user = db::get_user_by_email(&conn, "doc@curesio.com").unwrap().unwrap();
        let patch: UserPatch = serde_json::from_value(serde_json::json!({
            "doctor_profile": {"qualification": "PhD"}
        }))
        .unwrap();
        update_user(&mut conn, &user, &patch, true, UpdateVia::User).unwrap();
        let doctor = db::get_doctor_profile(&conn, user.id).unwrap().unwrap();
        assert_eq!(doctor.qualification, "MBBS");
    }

    #[test]
    fn doctor_full_update_requires_profile_fields() {
        let mut conn = open_memory_database().unwrap();
        create_doctor(&mut conn, &hasher(), &doctor_request(Vec::new())).unwrap();
        let user = db::get_user_by_email(&conn, "doc@curesio.com").unwrap().unwrap();
        let patch: UserPatch = serde_json::from_value(serde_json::json!({
            "username": "drsen",
            "profile": {"first_name": "Ravi"}
        }))
        .unwrap();

        let AccountError::Invalid(errors) =
            update_user(&mut conn, &user, &patch, false, UpdateVia::Doctor).unwrap_err()
        else {
            panic!("expected validation error");
        };
        for field in ["profile.last_name", "profile.city", "profile.country", "profile.primary_language"] {
            assert!(errors.contains(field), "{field}");
        }
        assert!(!errors.contains("profile.first_name"));

        update_user(&mut conn, &user, &patch, true, UpdateVia::Doctor).unwrap();
        update_user(&mut conn, &user, &patch, false, UpdateVia::User).unwrap();
    }

    #[test]
    fn doctor_fields_ignored_for_patients() {
        let mut conn = open_memory_database().unwrap();
        let user = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap();
        let patch: UserPatch = serde_json::from_value(serde_json::json!({
            "doctor_profile": {"qualification": "MBBS"}
        }))
        .unwrap();
        update_user(&mut conn, &user, &patch, true, UpdateVia::User).unwrap();
        assert!(db::get_doctor_profile(&conn, user.id).unwrap().is_none());
        assert!(doctor_account_view(&conn, &user).unwrap().doctor_profile.is_none());
    }

    #[test]
    fn replacing_image_deletes_previous_file() {
        let mut conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), media::DEFAULT_MAX_IMAGE_BYTES);
        let user = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap();
        let upload = || ImageUpload {
            filename: Some("me.png".into()),
            bytes: media::png_fixture(),
        };

        set_profile_image(&conn, &store, user.id, Some(upload())).unwrap();
        let first = db::get_profile(&conn, user.id).unwrap().unwrap().image.unwrap();
        let view = set_profile_image(&conn, &store, user.id, Some(upload())).unwrap();
        let second = db::get_profile(&conn, user.id).unwrap().unwrap().image.unwrap();

        assert_ne!(first, second);
        assert!(!dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());
        assert_eq!(view.image, Some(media::media_url(&second)));

        let cleared = set_profile_image(&conn, &store, user.id, None).unwrap();
        assert!(cleared.image.is_none());
        assert!(!dir.path().join(&second).exists());
    }

    #[test]
    fn invalid_image_keeps_existing_file() {
        let mut conn = open_memory_database().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), media::DEFAULT_MAX_IMAGE_BYTES);
        let user = create_user(&mut conn, &hasher(), &signup("a@curesio.com", "alice", "password1"))
            .unwrap();
        set_profile_image(
            &conn,
            &store,
            user.id,
            Some(ImageUpload {
                filename: Some("me.png".into()),
                bytes: media::png_fixture(),
            }),
        )
        .unwrap();
        let kept = db::get_profile(&conn, user.id).unwrap().unwrap().image.unwrap();

        let err = set_profile_image(
            &conn,
            &store,
            user.id,
            Some(ImageUpload {
                filename: Some("me.png".into()),
                bytes: b"plain text".to_vec(),
            }),
        )
        .unwrap_err();
        let AccountError::Invalid(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("image"));
        assert!(dir.path().join(&kept).exists());
    }
}
