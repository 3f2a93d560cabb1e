use rusqlite::Connection;

use super::{
    check, checked, language_choices, speciality_choices, unique_error, yes_no, AdminModel, AdminResult, Row,
};
use crate::accounts::{self, SignupRequest, EMAIL_MAX_LENGTH, USERNAME_MAX_LENGTH};
use crate::admin::forms::{FieldKind, FormField, FormValues};
use crate::admin::AdminError;
use crate::core_state::CoreState;
use crate::crypto::MIN_PASSWORD_LENGTH;
use crate::db;
use crate::models::{ProfilePatch, UserProfile, SPECIALITY_SLOTS};
use crate::validation::{self, FieldErrors};

const PROFILE: &str = "profile";

fn key(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}.{name}"),
        None => name.to_string(),
    }
}

fn profile_fields(prefix: Option<&str>) -> Vec<FormField> {
    let language = || FieldKind::Select {
        choices: language_choices(),
        blank: false,
    };
    vec![
        FormField::text(key(prefix, "first_name"), "First name"),
        FormField::text(key(prefix, "last_name"), "Last name"),
        FormField::text(key(prefix, "phone"), "Phone").with_help("International format, e.g. +919876543210."),
        FormField::new(key(prefix, "date_of_birth"), "Date of birth", FieldKind::Date),
        FormField::text(key(prefix, "city"), "City"),
        FormField::text(key(prefix, "country"), "Country").with_help("Two-letter country code."),
        FormField::text(key(prefix, "postal_code"), "Postal code"),
        FormField::new(key(prefix, "address"), "Address", FieldKind::TextArea),
        FormField::new(key(prefix, "primary_language"), "Primary language", language()),
        FormField::new(key(prefix, "secondary_language"), "Secondary language", language()),
        FormField::new(key(prefix, "tertiary_language"), "Tertiary language", language()),
    ]
}

fn put_profile(values: &mut FormValues, prefix: Option<&str>, p: &UserProfile) {
    values.set(key(prefix, "first_name"), &p.first_name);
    values.set(key(prefix, "last_name"), &p.last_name);
    values.set(key(prefix, "phone"), p.phone.clone().unwrap_or_default());
    values.set(
        key(prefix, "date_of_birth"),
        p.date_of_birth.map(|d| d.to_string()).unwrap_or_default(),
    );
    values.set(key(prefix, "city"), &p.city);
    values.set(key(prefix, "country"), &p.country);
    values.set(key(prefix, "postal_code"), &p.postal_code);
    values.set(key(prefix, "address"), &p.address);
    values.set(key(prefix, "primary_language"), p.primary_language.as_str());
    values.set(key(prefix, "secondary_language"), p.secondary_language.as_str());
    values.set(key(prefix, "tertiary_language"), p.tertiary_language.as_str());
}

/// Forms submit every field, so the patch sets all of them. Blank phone
/// and date clear the stored value.
fn profile_patch(form: &FormValues, prefix: Option<&str>) -> ProfilePatch {
    let text = |name: &str| Some(form.text(&key(prefix, name)).trim().to_string());
    let nullable = |name: &str| Some(form.opt(&key(prefix, name)).map(str::to_string));
    ProfilePatch {
        first_name: text("first_name"),
        last_name: text("last_name"),
        phone: nullable("phone"),
        date_of_birth: nullable("date_of_birth"),
        city: text("city"),
        country: text("country"),
        postal_code: text("postal_code"),
        address: text("address"),
        primary_language: text("primary_language"),
        secondary_language: text("secondary_language"),
        tertiary_language: text("tertiary_language"),
    }
}

fn drop_image(core: &CoreState, image: Option<String>) {
    if let Some(rel) = image {
        if let Err(e) = core.media().delete(&rel) {
            tracing::warn!(image = %rel, "Failed to remove profile image: {e}");
        }
    }
}

// ── users ────────────────────────────────────────────────────

pub struct UserAdmin;

impl UserAdmin {
    fn email(
        conn: &Connection,
        form: &FormValues,
        errors: &mut FieldErrors,
        excluding: Option<i64>,
    ) -> AdminResult<Option<String>> {
        let Some(email) = form.required(errors, "email").map(|e| validation::normalize_email(&e)) else {
            return Ok(None);
        };
        if !validation::is_valid_email(&email) {
            errors.add("email", "Enter a valid email address.");
            return Ok(None);
        }
        if email.chars().count() > EMAIL_MAX_LENGTH {
            validation::max_length(errors, "email", &email, EMAIL_MAX_LENGTH);
            return Ok(None);
        }
        if db::is_taken(conn, "email", &email, excluding)? {
            errors.add("email", "user with this email already exists.");
            return Ok(None);
        }
        Ok(Some(email))
    }

    fn username(
        conn: &Connection,
        form: &FormValues,
        errors: &mut FieldErrors,
        excluding: Option<i64>,
    ) -> AdminResult<Option<String>> {
        let Some(username) = form.required(errors, "username") else {
            return Ok(None);
        };
        if username.chars().count() > USERNAME_MAX_LENGTH {
            validation::max_length(errors, "username", &username, USERNAME_MAX_LENGTH);
            return Ok(None);
        }
        if db::is_taken(conn, "username", &username, excluding)? {
            errors.add("username", "user with this username already exists.");
            return Ok(None);
        }
        Ok(Some(username))
    }
}

impl AdminModel for UserAdmin {
    fn slug(&self) -> &'static str {
        "users"
    }

    fn title(&self) -> &'static str {
        "Users"
    }

    fn singular(&self) -> &'static str {
        "user"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Email", "Username", "Superuser", "Staff", "Active"]
    }

    fn fields(&self, _conn: &Connection, creating: bool) -> AdminResult<Vec<FormField>> {
        let password = FormField::new("password", "Password", FieldKind::Password);
        let password = if creating {
            password.with_help("At least 8 characters.")
        } else {
            password.with_help("Leave blank to keep the current password.")
        };
        let mut fields = vec![
            FormField::new("email", "Email", FieldKind::Email),
            FormField::text("username", "Username"),
            password,
            FormField::new("is_active", "Active", FieldKind::Checkbox),
            FormField::new("is_staff", "Staff status", FieldKind::Checkbox)
                .with_help("Designates whether the user can log into this admin site."),
            FormField::new("is_superuser", "Superuser status", FieldKind::Checkbox),
            FormField::new("is_doctor", "Doctor", FieldKind::Checkbox),
        ];
        fields.extend(profile_fields(Some(PROFILE)));
        Ok(fields)
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        Ok(db::list_users(conn, search)?
            .into_iter()
            .map(|u| Row {
                id: u.id,
                cells: vec![
                    u.email,
                    u.username,
                    yes_no(u.is_superuser),
                    yes_no(u.is_staff),
                    yes_no(u.is_active),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        let Some(user) = db::get_user(conn, id)? else {
            return Ok(None);
        };
        let profile = db::get_profile(conn, id)?.unwrap_or_else(|| UserProfile::empty(id));
        let mut values = FormValues::new();
        values.set("email", &user.email);
        values.set("username", &user.username);
        values.set_checked("is_active", user.is_active);
        values.set_checked("is_staff", user.is_staff);
        values.set_checked("is_superuser", user.is_superuser);
        values.set_checked("is_doctor", user.is_doctor);
        put_profile(&mut values, Some(PROFILE), &profile);
        Ok(Some((user.email, values)))
    }

    fn defaults(&self) -> FormValues {
        let mut values = FormValues::new();
        values.set_checked("is_active", true);
        put_profile(&mut values, Some(PROFILE), &UserProfile::empty(0));
        values
    }

    fn create(&self, core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let profile = profile_patch(form, Some(PROFILE)).validate(&[]).map_err(|nested| {
            let mut errors = FieldErrors::new();
            errors.extend_prefixed(PROFILE, nested);
            AdminError::Invalid(errors)
        })?;

        let req = SignupRequest {
            email: Some(form.text("email").to_string()),
            username: Some(form.text("username").trim().to_string()),
            password: Some(form.text("password").to_string()),
        };
        let mut user = accounts::create_user(conn, core.hasher(), &req)?;

        user.is_active = form.checked("is_active");
        user.is_staff = form.checked("is_staff");
        user.is_superuser = form.checked("is_superuser");
        user.is_doctor = form.checked("is_doctor");

        let tx = conn.transaction()?;
        db::update_user_account(&tx, &user)?;
        if user.is_doctor {
            db::ensure_doctor_profile(&tx, user.id)?;
        }
        let mut stored = db::get_profile(&tx, user.id)?.unwrap_or_else(|| UserProfile::empty(user.id));
        profile.apply(&mut stored);
        db::update_profile(&tx, &stored)?;
        tx.commit()?;

        tracing::info!(user_id = user.id, "User created from admin console");
        Ok(user.id)
    }

    fn update(
        &self,
        core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let Some(mut user) = db::get_user(conn, id)? else {
            return Err(AdminError::NotFound);
        };

        let mut errors = FieldErrors::new();
        let email = Self::email(conn, form, &mut errors, Some(id))?;
        let username = Self::username(conn, form, &mut errors, Some(id))?;
        let password = form.opt("password");
        if let Some(p) = password {
            validation::min_length(&mut errors, "password", p, MIN_PASSWORD_LENGTH);
        }
        let profile = match profile_patch(form, Some(PROFILE)).validate(&[]) {
            Ok(valid) => Some(valid),
            Err(nested) => {
                errors.extend_prefixed(PROFILE, nested);
                None
            }
        };
        let (email, username, profile) = checked(
            errors,
            email.zip(username).zip(profile).map(|((e, u), p)| (e, u, p)),
        )?;

        let was_active = user.is_active;
        user.username = username;
        user.is_active = form.checked("is_active");
        user.is_staff = form.checked("is_staff");
        user.is_superuser = form.checked("is_superuser");
        user.is_doctor = form.checked("is_doctor");

        let tx = conn.transaction()?;
        if email != user.email {
            db::update_email(&tx, id, &email).map_err(unique_error("User"))?;
        }
        db::update_user_account(&tx, &user).map_err(unique_error("User"))?;
        if let Some(p) = password {
            db::update_password(&tx, id, &core.hasher().hash(p))?;
        }
        db::ensure_profile(&tx, id)?;
        let mut stored = db::get_profile(&tx, id)?.unwrap_or_else(|| UserProfile::empty(id));
        profile.apply(&mut stored);
        db::update_profile(&tx, &stored)?;
        if user.is_doctor {
            db::ensure_doctor_profile(&tx, id)?;
        }
        if was_active && !user.is_active {
            db::delete_user_tokens(&tx, id)?;
        }
        tx.commit()?;

        tracing::info!(user_id = id, "User updated from admin console");
        Ok(())
    }

    fn delete(&self, core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        let image = db::get_profile(conn, id)?.and_then(|p| p.image);
        let deleted = db::delete_user(conn, id)?;
        if deleted {
            drop_image(core, image);
            tracing::info!(user_id = id, "User deleted from admin console");
        }
        Ok(deleted)
    }
}

// ── profiles ─────────────────────────────────────────────────

pub struct ProfileAdmin;

impl AdminModel for ProfileAdmin {
    fn slug(&self) -> &'static str {
        "profiles"
    }

    fn title(&self) -> &'static str {
        "Profiles"
    }

    fn singular(&self) -> &'static str {
        "profile"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["User", "First name", "Last name", "City", "Country", "Primary language"]
    }

    fn can_create(&self) -> bool {
        false
    }

    fn fields(&self, _conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(profile_fields(None))
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        Ok(db::list_profiles(conn, search)?
            .into_iter()
            .map(|(email, p)| Row {
                id: p.user_id,
                cells: vec![
                    email,
                    p.first_name,
                    p.last_name,
                    p.city,
                    p.country,
                    p.primary_language.label().to_string(),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        let (Some(profile), Some(user)) = (db::get_profile(conn, id)?, db::get_user(conn, id)?) else {
            return Ok(None);
        };
        let mut values = FormValues::new();
        put_profile(&mut values, None, &profile);
        Ok(Some((user.email, values)))
    }

    fn create(&self, _core: &CoreState, _conn: &mut Connection, _form: &FormValues) -> AdminResult<i64> {
        Err(AdminError::NotAllowed)
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let Some(mut profile) = db::get_profile(conn, id)? else {
            return Err(AdminError::NotFound);
        };
        let valid = profile_patch(form, None)
            .validate(&[])
            .map_err(AdminError::Invalid)?;
        valid.apply(&mut profile);
        db::update_profile(conn, &profile)?;
        Ok(())
    }

    fn delete(&self, core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        let image = db::get_profile(conn, id)?.and_then(|p| p.image);
        let deleted = db::delete_profile(conn, id)?;
        if deleted {
            drop_image(core, image);
        }
        Ok(deleted)
    }
}

// ── specialities ─────────────────────────────────────────────

pub struct SpecialityAdmin;

const SPECIALITY_NAME_MAX_LENGTH: usize = 255;

fn speciality_name(form: &FormValues) -> AdminResult<String> {
    let mut errors = FieldErrors::new();
    let name = form.required(&mut errors, "name");
    if let Some(name) = &name {
        validation::max_length(&mut errors, "name", name, SPECIALITY_NAME_MAX_LENGTH);
    }
    checked(errors, name)
}

impl AdminModel for SpecialityAdmin {
    fn slug(&self) -> &'static str {
        "specialities"
    }

    fn title(&self) -> &'static str {
        "Specialities"
    }

    fn singular(&self) -> &'static str {
        "speciality"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Name"]
    }

    fn fields(&self, _conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![FormField::text("name", "Name")])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        Ok(db::list_specialities(conn, search)?
            .into_iter()
            .map(|s| Row {
                id: s.id,
                cells: vec![s.name],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        Ok(db::get_speciality(conn, id)?.map(|s| {
            let mut values = FormValues::new();
            values.set("name", &s.name);
            (s.name, values)
        }))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let name = speciality_name(form)?;
        db::insert_speciality(conn, &name).map_err(unique_error("Speciality"))
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let name = speciality_name(form)?;
        db::rename_speciality(conn, id, &name).map_err(unique_error("Speciality"))
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_speciality(conn, id)?)
    }
}

// ── doctor profiles ──────────────────────────────────────────

pub struct DoctorProfileAdmin;

impl AdminModel for DoctorProfileAdmin {
    fn slug(&self) -> &'static str {
        "doctor-profiles"
    }

    fn title(&self) -> &'static str {
        "Doctor profiles"
    }

    fn singular(&self) -> &'static str {
        "doctor profile"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["User", "Qualification", "Experience"]
    }

    fn can_create(&self) -> bool {
        false
    }

    fn fields(&self, conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        let choices = speciality_choices(conn)?;
        let mut fields = vec![
            FormField::new("experience", "Experience", FieldKind::TextArea),
            FormField::text("qualification", "Qualification"),
            FormField::new("highlights", "Highlights", FieldKind::TextArea),
        ];
        for (slot, label) in (1..=SPECIALITY_SLOTS).zip([
            "Speciality 1",
            "Speciality 2",
            "Speciality 3",
            "Speciality 4",
        ]) {
            fields.push(FormField::new(
                format!("speciality{slot}"),
                label,
                FieldKind::MultiSelect(choices.clone()),
            ));
        }
        Ok(fields)
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        Ok(db::list_doctor_profiles(conn, search)?
            .into_iter()
            .map(|(email, d)| Row {
                id: d.user_id,
                cells: vec![email, d.qualification, d.experience],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        let (Some(doctor), Some(user)) = (db::get_doctor_profile(conn, id)?, db::get_user(conn, id)?)
        else {
            return Ok(None);
        };
        let mut values = FormValues::new();
        values.set("experience", &doctor.experience);
        values.set("qualification", &doctor.qualification);
        values.set("highlights", &doctor.highlights);
        for slot in 1..=SPECIALITY_SLOTS {
            values.set_all(
                format!("speciality{slot}"),
                doctor.slot(slot).iter().map(i64::to_string).collect(),
            );
        }
        Ok(Some((user.email, values)))
    }

    fn create(&self, _core: &CoreState, _conn: &mut Connection, _form: &FormValues) -> AdminResult<i64> {
        Err(AdminError::NotAllowed)
    }

    /// Slots are replaced outright, so an empty selection clears a slot.
    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let Some(mut doctor) = db::get_doctor_profile(conn, id)? else {
            return Err(AdminError::NotFound);
        };
        let choices = speciality_choices(conn)?;
        let mut errors = FieldErrors::new();
        let mut slots = Vec::new();
        for slot in 1..=SPECIALITY_SLOTS {
            slots.push(form.choice_ids(&mut errors, &format!("speciality{slot}"), &choices));
        }
        check(errors)?;

        doctor.experience = form.text("experience").to_string();
        doctor.qualification = form.text("qualification").trim().to_string();
        doctor.highlights = form.text("highlights").to_string();
        for (slot, ids) in (1..=SPECIALITY_SLOTS).zip(slots) {
            if let Some(target) = doctor.slot_mut(slot) {
                *target = ids;
            }
        }

        let tx = conn.transaction()?;
        db::update_doctor_profile(&tx, &doctor)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_doctor_profile(conn, id)?)
    }
}
