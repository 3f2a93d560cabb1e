use rusqlite::Connection;

use super::{check, AdminModel, AdminResult, Row};
use crate::admin::forms::{FieldKind, FormField, FormValues};
use crate::catalog::{self, ProcedureInput};
use crate::core_state::CoreState;
use crate::db;
use crate::validation::FieldErrors;

pub struct ProcedureAdmin;

/// Numbers arrive as text; unparseable ones are reported here, missing
/// ones by the catalog's own required check.
fn input(form: &FormValues) -> AdminResult<ProcedureInput> {
    let mut errors = FieldErrors::new();
    let days_in_hospital = form.int(&mut errors, "days_in_hospital");
    let days_in_destination = form.int(&mut errors, "days_in_destination");
    let duration_minutes = form.int(&mut errors, "duration_minutes");
    check(errors)?;
    Ok(ProcedureInput {
        name: form.opt("name").map(str::to_string),
        speciality: form.opt("speciality").map(str::to_string),
        days_in_hospital,
        days_in_destination,
        duration_minutes,
        overview: Some(form.text("overview").to_string()),
        other_details: Some(form.text("other_details").to_string()),
    })
}

impl AdminModel for ProcedureAdmin {
    fn slug(&self) -> &'static str {
        "procedures"
    }

    fn title(&self) -> &'static str {
        "Procedures"
    }

    fn singular(&self) -> &'static str {
        "procedure"
    }

    fn columns(&self) -> &'static [&'static str] {
        &["Name", "Speciality", "Days in hospital", "Days in destination", "Duration (minutes)"]
    }

    fn fields(&self, _conn: &Connection, _creating: bool) -> AdminResult<Vec<FormField>> {
        Ok(vec![
            FormField::text("name", "Name").with_help("Stored in lower case."),
            FormField::text("speciality", "Speciality"),
            FormField::new("days_in_hospital", "Days in hospital", FieldKind::Number),
            FormField::new("days_in_destination", "Days in destination", FieldKind::Number),
            FormField::new("duration_minutes", "Duration (minutes)", FieldKind::Number),
            FormField::new("overview", "Overview", FieldKind::TextArea),
            FormField::new("other_details", "Other details", FieldKind::TextArea),
        ])
    }

    fn rows(&self, conn: &Connection, search: Option<&str>) -> AdminResult<Vec<Row>> {
        Ok(db::list_procedures(conn, search)?
            .into_iter()
            .map(|p| Row {
                id: p.id,
                cells: vec![
                    p.name,
                    p.speciality,
                    p.days_in_hospital.to_string(),
                    p.days_in_destination.to_string(),
                    p.duration_minutes.to_string(),
                ],
            })
            .collect())
    }

    fn load(&self, conn: &Connection, id: i64) -> AdminResult<Option<(String, FormValues)>> {
        Ok(db::get_procedure(conn, id)?.map(|p| {
            let mut values = FormValues::new();
            values.set("name", &p.name);
            values.set("speciality", &p.speciality);
            values.set("days_in_hospital", p.days_in_hospital.to_string());
            values.set("days_in_destination", p.days_in_destination.to_string());
            values.set("duration_minutes", p.duration_minutes.to_string());
            values.set("overview", &p.overview);
            values.set("other_details", &p.other_details);
            (p.name, values)
        }))
    }

    fn create(&self, _core: &CoreState, conn: &mut Connection, form: &FormValues) -> AdminResult<i64> {
        Ok(catalog::create_procedure(conn, &input(form)?)?.id)
    }

    fn update(
        &self,
        _core: &CoreState,
        conn: &mut Connection,
        id: i64,
        form: &FormValues,
    ) -> AdminResult<()> {
        catalog::update_procedure(conn, id, &input(form)?, false)?;
        Ok(())
    }

    fn delete(&self, _core: &CoreState, conn: &Connection, id: i64) -> AdminResult<bool> {
        Ok(db::delete_procedure(conn, id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminError;
    use crate::catalog::DUPLICATE_NAME;
    use crate::config::Config;
    use crate::validation::REQUIRED;

    fn core() -> (CoreState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::new(Config::with_data_dir(dir.path()));
        core.prepare().unwrap();
        (core, dir)
    }

    fn form(pairs: &[(&str, &str)]) -> FormValues {
        FormValues::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn knee() -> FormValues {
        form(&[
            ("name", "Knee Replacement"),
            ("speciality", "Orthopedics"),
            ("days_in_hospital", "4"),
            ("days_in_destination", "10"),
            ("duration_minutes", "120"),
            ("overview", ""),
        ])
    }

    #[test]
    fn create_lowercases_and_lists() {
        let (core, _dir) = core();
        let mut conn = core.open_db().unwrap();
        let id = ProcedureAdmin.create(&core, &mut conn, &knee()).unwrap();
        let rows = ProcedureAdmin.rows(&conn, Some("knee")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].cells[0], "knee replacement");
        assert_eq!(rows[0].cells[1], "orthopedics");
    }

    #[test]
    fn bad_numbers_and_missing_fields_are_reported() {
        let (core, _dir) = core();
        let mut conn = core.open_db().unwrap();
        let mut values = knee();
        values.set("days_in_hospital", "four");
        let AdminError::Invalid(errors) = ProcedureAdmin.create(&core, &mut conn, &values).unwrap_err()
        else {
            panic!("expected form errors");
        };
        assert!(errors.contains("days_in_hospital"));

        let mut values = knee();
        values.set("speciality", "  ");
        let AdminError::Invalid(errors) = ProcedureAdmin.create(&core, &mut conn, &values).unwrap_err()
        else {
            panic!("expected form errors");
        };
        assert_eq!(errors.get("speciality").unwrap()[0], REQUIRED);
    }

    #[test]
    fn duplicate_name_is_form_error() {
        let (core, _dir) = core();
        let mut conn = core.open_db().unwrap();
        ProcedureAdmin.create(&core, &mut conn, &knee()).unwrap();
        let mut values = knee();
        values.set("name", "KNEE REPLACEMENT");
        let AdminError::Invalid(errors) = ProcedureAdmin.create(&core, &mut conn, &values).unwrap_err()
        else {
            panic!("expected form errors");
        };
        assert_eq!(errors.get("name").unwrap()[0], DUPLICATE_NAME);
    }

    #[test]
    fn update_rewrites_every_field() {
        let (core, _dir) = core();
        let mut conn = core.open_db().unwrap();
        let id = ProcedureAdmin.create(&core, &mut conn, &knee()).unwrap();
        let (_, mut values) = ProcedureAdmin.load(&conn, id).unwrap().unwrap();
        values.set("duration_minutes", "90");
        values.set("overview", "Total knee arthroplasty.");
        ProcedureAdmin.update(&core, &mut conn, id, &values).unwrap();

        let stored = catalog::get_procedure(&conn, id).unwrap();
        assert_eq!(stored.duration_minutes, 90);
        assert_eq!(stored.overview, "Total knee arthroplasty.");
        assert!(ProcedureAdmin.delete(&core, &conn, id).unwrap());
        assert!(!ProcedureAdmin.delete(&core, &conn, id).unwrap());
    }
}
