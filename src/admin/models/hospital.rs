use std::collections::HashMap;

use chrono::Utc;
use rusqlite::Connection;

use super::{
    check, checked, hospital_choices, language, language_choices, unique_error, AdminModel, AdminResult, Row,
};
use crate::admin::forms::{Choices, FieldKind, FormField, FormValues};
use crate::admin::AdminError;
use crate::core_state::CoreState;
use crate::db;
use crate::models::*;
use crate::validation::{self, FieldErrors};

const NAME_MAX_LENGTH: usize = 255;

fn hospital_select(choices: Choices) -> FormField {
    FormField::new(
        "hospital_id",
        "Hospital",
        FieldKind::Select {
            choices,
            blank: true,
        },
    )
}

/// Id → display name, for rendering foreign keys in change lists.
fn names(choices: Choices) -> HashMap<i64, String> {
    choices
        .into_iter()
        .filter_map(|(id, name)| id.parse::<i64>().ok().map(|id| (id, name)))
        .collect()
}

fn name_of(names: &HashMap<i64, String>, id: i64) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn doctor_choices(conn: &Connection) -> AdminResult<Choices> {
    Ok(db::list_users(conn, None)?
        .into_iter()
        .filter(|u| u.is_doctor)
        .map(|u| (u.id.to_string(), u.email))
        .collect())
}

fn procedure_choices(conn: &Connection) -> AdminResult<Choices> {
    Ok(db::list_procedures(conn, None)?
        .into_iter()
        .map(|p| (p.id.to_string(), p.name))
        .collect())
}

/// Required, length-checked name.
fn name(form: &FormValues, errors: &mut FieldErrors) -> Option<String> {
    let name = form.required(errors, "name")?;
    validation::max_length(errors, "name", &name, NAME_MAX_LENGTH);
    Some(name)
}

fn hospital_label(conn: &Connection, hospital_id: i64) -> AdminResult<String> {
    Ok(db::get_hospital(conn, hospital_id)?
        .map(|h| h.name)
        .unwrap_or_else(|| hospital_id.to_string()))
}

// ── hospitals ────────────────────────────────────────────────

pub struct HospitalAdmin;

fn hospital_from_form(conn: &Connection, id: i64, form: &FormValues) -> AdminResult<Hospital> {
    let mut errors = FieldErrors::new();
    let name = name(form, &mut errors);
    let country = match form.opt("country") {
        None => String::new(),
        Some(raw) => validation::normalize_country(raw).unwrap_or_else(|| {
            errors.add("country", format!("\"{raw}\" is not a valid choice."));
            String::new()
        }),
    };
    let phone = match form.opt("phone") {
        None => None,
        Some(raw) => {
            let phone = validation::normalize_phone(raw);
            if phone.is_none() {
                errors.add("phone", "Enter a valid phone number.");
            }
            phone
        }
    };
    check(errors)?;

    let created_date = match db::get_hospital(conn, id)? {
        Some(existing) => existing.created_date,
        None => Utc::now(),
    };
    Ok(Hospital {
        id,
        name: name.unwrap_or_default(),
        city: form.text("city").trim().to_string(),
        country,
        address: form.text("address").trim().to_string(),
        phone,
        website: form.text("website").trim().to_string(),
        description: form.text("description").to_string(),
        created_date,
    })
}

impl AdminModel for HospitalAdmin {
    fn slug(&self) -> &'static str {
        "hospitals"
    }

    fn title(&self) -> &'static str {
        "Hospitals"
    }

    fn singular(&self) -> &'static str {
        "hospital"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Name", "City", "Country", "Phone"]
    }

    fn fields(&self, _conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            FormField::text("name", "Name"),
            FormField::text("city", "City"),
            FormField::text("country", "Country").with_help("Two-letter country code."),
            FormField::new("address", "Address", FieldKind::TextArea),
            FormField::text("phone", "Phone"),
            FormField::text("website", "Website"),
            FormField::new("description", "Description", FieldKind::TextArea),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        Ok(db::list_hospitals(conn, search)?
            .into_iter()
            .map(|h| Row {
                id: h.id,
                cells: vec![h.name, h.city, h.country, h.phone.unwrap_or_default()],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        Ok(db::get_hospital(conn, id)?.map(|h| {
            let mut values = FormValues::new();
            values.set("name", &h.name);
            values.set("city", &h.city);
            values.set("country", &h.country);
            values.set("address", &h.address);
            values.set("phone", h.phone.clone().unwrap_or_default());
            values.set("website", &h.website);
            values.set("description", &h.description);
            (h.name, values)
        }))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let hospital = hospital_from_form(conn, 0, form)?;
        let id = db::insert_hospital(conn, &hospital).map_err(unique_error("Hospital"))?;
        tracing::info!(hospital_id = id, "Hospital created");
        Ok(id)
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let hospital = hospital_from_form(conn, id, form)?;
        db::update_hospital(conn, &hospital).map_err(unique_error("Hospital"))
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        let deleted = db::delete_hospital(conn, id)?;
        if deleted {
            tracing::info!(hospital_id = id, "Hospital deleted");
        }
        Ok(deleted)
    }
}

// ── accreditations ───────────────────────────────────────────

pub struct AccreditationAdmin;

fn accreditation_from_form(conn: &Connection, id: i64, form: &FormValues) -> AdminResult<Accreditation> {
    let mut errors = FieldErrors::new();
    let hospital_id = form.choice_id(&mut errors, "hospital_id", &hospital_choices(conn)?);
    let name = name(form, &mut errors);
    let valid_until = form.date(&mut errors, "valid_until");
    check(errors)?;
    Ok(Accreditation {
        id,
        hospital_id: hospital_id.unwrap_or_default(),
        name: name.unwrap_or_default(),
        issued_by: form.text("issued_by").trim().to_string(),
        valid_until: valid_until.flatten(),
    })
}

impl AdminModel for AccreditationAdmin {
    fn slug(&self) -> &'static str {
        "accreditations"
    }

    fn title(&self) -> &'static str {
        "Accreditations"
    }

    fn singular(&self) -> &'static str {
        "accreditation"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Name", "Hospital", "Issued by", "Valid until"]
    }

    fn fields(&self, conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            hospital_select(hospital_choices(conn)?),
            FormField::text("name", "Name"),
            FormField::text("issued_by", "Issued by"),
            FormField::new("valid_until", "Valid until", FieldKind::Date),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        let hospitals = names(hospital_choices(conn)?);
        Ok(db::list_accreditations(conn, search)?
            .into_iter()
            .map(|a| Row {
                id: a.id,
                cells: vec![
                    a.name,
                    name_of(&hospitals, a.hospital_id),
                    a.issued_by,
                    a.valid_until.map(|d| d.to_string()).unwrap_or_default(),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        Ok(db::get_accreditation(conn, id)?.map(|a| {
            let mut values = FormValues::new();
            values.set("hospital_id", a.hospital_id.to_string());
            values.set("name", &a.name);
            values.set("issued_by", &a.issued_by);
            values.set(
                "valid_until",
                a.valid_until.map(|d| d.to_string()).unwrap_or_default(),
            );
            (a.name, values)
        }))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let accreditation = accreditation_from_form(conn, 0, form)?;
        Ok(db::insert_accreditation(conn, &accreditation)?)
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let accreditation = accreditation_from_form(conn, id, form)?;
        Ok(db::update_accreditation(conn, &accreditation)?)
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_accreditation(conn, id)?)
    }
}

// ── services ─────────────────────────────────────────────────

pub struct ServiceAdmin;

fn service_from_form(conn: &Connection, id: i64, form: &FormValues) -> AdminResult<Service> {
    let mut errors = FieldErrors::new();
    let hospital_id = form.choice_id(&mut errors, "hospital_id", &hospital_choices(conn)?);
    let name = name(form, &mut errors);
    check(errors)?;
    Ok(Service {
        id,
        hospital_id: hospital_id.unwrap_or_default(),
        name: name.unwrap_or_default(),
        description: form.text("description").to_string(),
    })
}

impl AdminModel for ServiceAdmin {
    fn slug(&self) -> &'static str {
        "services"
    }

    fn title(&self) -> &'static str {
        "Services"
    }

    fn singular(&self) -> &'static str {
        "service"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Name", "Hospital"]
    }

    fn fields(&self, conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            hospital_select(hospital_choices(conn)?),
            FormField::text("name", "Name"),
            FormField::new("description", "Description", FieldKind::TextArea),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        let hospitals = names(hospital_choices(conn)?);
        Ok(db::list_services(conn, search)?
            .into_iter()
            .map(|s| Row {
                id: s.id,
                cells: vec![s.name, name_of(&hospitals, s.hospital_id)],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        Ok(db::get_service(conn, id)?.map(|s| {
            let mut values = FormValues::new();
            values.set("hospital_id", s.hospital_id.to_string());
            values.set("name", &s.name);
            values.set("description", &s.description);
            (s.name, values)
        }))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let service = service_from_form(conn, 0, form)?;
        Ok(db::insert_service(conn, &service)?)
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let service = service_from_form(conn, id, form)?;
        Ok(db::update_service(conn, &service)?)
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_service(conn, id)?)
    }
}

// ── hospital doctors ─────────────────────────────────────────

pub struct HospitalDoctorAdmin;

fn hospital_doctor_from_form(conn: &Connection, id: i64, form: &FormValues) -> AdminResult<HospitalDoctor> {
    let mut errors = FieldErrors::new();
    let hospital_id = form.choice_id(&mut errors, "hospital_id", &hospital_choices(conn)?);
    let doctor_id = form.choice_id(&mut errors, "doctor_id", &doctor_choices(conn)?);
    check(errors)?;
    Ok(HospitalDoctor {
        id,
        hospital_id: hospital_id.unwrap_or_default(),
        doctor_id: doctor_id.unwrap_or_default(),
    })
}

impl AdminModel for HospitalDoctorAdmin {
    fn slug(&self) -> &'static str {
        "hospital-doctors"
    }

    fn title(&self) -> &'static str {
        "Hospital doctors"
    }

    fn singular(&self) -> &'static str {
        "hospital doctor"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Hospital", "Doctor"]
    }

    fn fields(&self, conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            hospital_select(hospital_choices(conn)?),
            FormField::new(
                "doctor_id",
                "Doctor",
                FieldKind::Select {
                    choices: doctor_choices(conn)?,
                    blank: true,
                },
            ),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        let hospitals = names(hospital_choices(conn)?);
        let doctors = names(doctor_choices(conn)?);
        Ok(db::list_hospital_doctors(conn, search)?
            .into_iter()
            .map(|link| Row {
                id: link.id,
                cells: vec![
                    name_of(&hospitals, link.hospital_id),
                    name_of(&doctors, link.doctor_id),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        let Some(link) = db::get_hospital_doctor(conn, id)? else {
            return Ok(None);
        };
        let mut values = FormValues::new();
        values.set("hospital_id", link.hospital_id.to_string());
        values.set("doctor_id", link.doctor_id.to_string());
        Ok(Some((hospital_label(conn, link.hospital_id)?, values)))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let link = hospital_doctor_from_form(conn, 0, form)?;
        db::insert_hospital_doctor(conn, &link).map_err(unique_error("Hospital doctor"))
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let link = hospital_doctor_from_form(conn, id, form)?;
        db::update_hospital_doctor(conn, &link).map_err(unique_error("Hospital doctor"))
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_hospital_doctor(conn, id)?)
    }
}

// ── hospital procedures ──────────────────────────────────────

pub struct HospitalProcedureAdmin;

const PRICE_MAX_LENGTH: usize = 255;

fn hospital_procedure_from_form(
    conn: &Connection,
    id: i64,
    form: &FormValues,
) -> AdminResult<HospitalProcedure> {
    let mut errors = FieldErrors::new();
    let hospital_id = form.choice_id(&mut errors, "hospital_id", &hospital_choices(conn)?);
    let procedure_id = form.choice_id(&mut errors, "procedure_id", &procedure_choices(conn)?);
    let price = form.opt("price").map(str::to_string);
    if let Some(price) = &price {
        validation::max_length(&mut errors, "price", price, PRICE_MAX_LENGTH);
    }
    check(errors)?;
    Ok(HospitalProcedure {
        id,
        hospital_id: hospital_id.unwrap_or_default(),
        procedure_id: procedure_id.unwrap_or_default(),
        price,
    })
}

impl AdminModel for HospitalProcedureAdmin {
    fn slug(&self) -> &'static str {
        "hospital-procedures"
    }

    fn title(&self) -> &'static str {
        "Hospital procedures"
    }

    fn singular(&self) -> &'static str {
        "hospital procedure"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Hospital", "Procedure", "Price"]
    }

    fn fields(&self, conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            hospital_select(hospital_choices(conn)?),
            FormField::new(
                "procedure_id",
                "Procedure",
                FieldKind::Select {
                    choices: procedure_choices(conn)?,
                    blank: true,
                },
            ),
            FormField::text("price", "Price").with_help("Free text, e.g. \"USD 4,500\"."),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        let hospitals = names(hospital_choices(conn)?);
        let procedures = names(procedure_choices(conn)?);
        Ok(db::list_hospital_procedures(conn, search)?
            .into_iter()
            .map(|link| Row {
                id: link.id,
                cells: vec![
                    name_of(&hospitals, link.hospital_id),
                    name_of(&procedures, link.procedure_id),
                    link.price.unwrap_or_default(),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        let Some(link) = db::get_hospital_procedure(conn, id)? else {
            return Ok(None);
        };
        let mut values = FormValues::new();
        values.set("hospital_id", link.hospital_id.to_string());
        values.set("procedure_id", link.procedure_id.to_string());
        values.set("price", link.price.unwrap_or_default());
        Ok(Some((hospital_label(conn, link.hospital_id)?, values)))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let link = hospital_procedure_from_form(conn, 0, form)?;
        db::insert_hospital_procedure(conn, &link).map_err(unique_error("Hospital procedure"))
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let link = hospital_procedure_from_form(conn, id, form)?;
        db::update_hospital_procedure(conn, &link).map_err(unique_error("Hospital procedure"))
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_hospital_procedure(conn, id)?)
    }
}

// ── hospital languages ───────────────────────────────────────

pub struct HospitalLanguageAdmin;

fn hospital_language_from_form(
    conn: &Connection,
    id: i64,
    form: &FormValues,
) -> AdminResult<HospitalLanguage> {
    let mut errors = FieldErrors::new();
    let hospital_id = form.choice_id(&mut errors, "hospital_id", &hospital_choices(conn)?);
    let lang = language(form, &mut errors, "language");
    let (hospital_id, language) = checked(errors, hospital_id.zip(lang))?;
    Ok(HospitalLanguage {
        id,
        hospital_id,
        language,
    })
}

impl AdminModel for HospitalLanguageAdmin {
    fn slug(&self) -> &'static str {
        "hospital-languages"
    }

    fn title(&self) -> &'static str {
        "Hospital languages"
    }

    fn singular(&self) -> &'static str {
        "hospital language"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Hospital", "Language"]
    }

    fn fields(&self, conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            hospital_select(hospital_choices(conn)?),
            FormField::new(
                "language",
                "Language",
                FieldKind::Select {
                    choices: language_choices(),
                    blank: true,
                },
            ),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        let hospitals = names(hospital_choices(conn)?);
        Ok(db::list_hospital_languages(conn, search)?
            .into_iter()
            .map(|link| Row {
                id: link.id,
                cells: vec![
                    name_of(&hospitals, link.hospital_id),
                    link.language.label().to_string(),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        let Some(link) = db::get_hospital_language(conn, id)? else {
            return Ok(None);
        };
        let mut values = FormValues::new();
        values.set("hospital_id", link.hospital_id.to_string());
        values.set("language", link.language.as_str());
        Ok(Some((hospital_label(conn, link.hospital_id)?, values)))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        let link = hospital_language_from_form(conn, 0, form)?;
        db::insert_hospital_language(conn, &link).map_err(unique_error("Hospital language"))
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        let link = hospital_language_from_form(conn, id, form)?;
        db::update_hospital_language(conn, &link).map_err(unique_error("Hospital language"))
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_hospital_language(conn, id)?)
    }
}
