//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per entity
//! group. Everything is re-exported here.

mod doctor;
mod hospital;
mod procedure;
mod profile;
mod speciality;
mod token;
mod user;

pub use doctor::*;
pub use hospital::*;
pub use procedure::*;
pub use profile::*;
pub use speciality::*;
pub use token::*;
pub use user::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::*;
    use chrono::{NaiveDate, Utc};
    use rusqlite::Connection;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn make_user(conn: &Connection, email: &str, username: &str) -> i64 {
        let id = insert_user(
            conn,
            &NewUser::patient(email.into(), username.into(), "hash".into()),
        )
        .unwrap();
        ensure_profile(conn, id).unwrap();
        id
    }

    fn make_procedure(conn: &Connection, name: &str) -> i64 {
        insert_procedure(
            conn,
            &Procedure {
                id: 0,
                name: name.into(),
                speciality: "cardiology".into(),
                days_in_hospital: 3,
                days_in_destination: 7,
                duration_minutes: 180,
                overview: String::new(),
                other_details: String::new(),
            },
        )
        .unwrap()
    }

    fn make_hospital(conn: &Connection, name: &str) -> i64 {
        insert_hospital(
            conn,
            &Hospital {
                id: 0,
                name: name.into(),
                city: "Kolkata".into(),
                country: "IN".into(),
                address: String::new(),
                phone: None,
                website: String::new(),
                description: String::new(),
                created_date: Utc::now(),
            },
        )
        .unwrap()
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn user_insert_and_lookup() {
        let conn = test_db();
        let id = make_user(&conn, "test@curesio.com", "tester");
        let user = get_user_by_email(&conn, "test@curesio.com").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "tester");
        assert!(user.is_active);
        assert!(!user.is_doctor);
        assert!(user.last_login.is_none());
        assert!(get_user(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let conn = test_db();
        make_user(&conn, "dup@curesio.com", "one");
        let err = insert_user(
            &conn,
            &NewUser::patient("dup@curesio.com".into(), "two".into(), "hash".into()),
        )
        .unwrap_err();
        assert_eq!(err.unique_column(), Some("email"));
    }

    #[test]
    fn is_taken_excludes_self() {
        let conn = test_db();
        let id = make_user(&conn, "a@curesio.com", "alpha");
        assert!(is_taken(&conn, "username", "alpha", None).unwrap());
        assert!(!is_taken(&conn, "username", "alpha", Some(id)).unwrap());
        assert!(!is_taken(&conn, "email", "b@curesio.com", None).unwrap());
        assert!(is_taken(&conn, "password", "x", None).is_err());
    }

    #[test]
    fn users_listed_by_id_with_search() {
        let conn = test_db();
        make_user(&conn, "zed@curesio.com", "zed");
        make_user(&conn, "amy@curesio.com", "amy");
        let all = list_users(&conn, None).unwrap();
        assert_eq!(all[0].username, "zed");
        assert_eq!(all[1].username, "amy");
        let found = list_users(&conn, Some("amy")).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn last_login_is_recorded() {
        let conn = test_db();
        let id = make_user(&conn, "l@curesio.com", "login");
        touch_last_login(&conn, id).unwrap();
        assert!(get_user(&conn, id).unwrap().unwrap().last_login.is_some());
    }

    #[test]
    fn profile_is_provisioned_once() {
        let conn = test_db();
        let id = make_user(&conn, "p@curesio.com", "prof");
        ensure_profile(&conn, id).unwrap();
        assert_eq!(count(&conn, "user_profiles"), 1);
        let profile = get_profile(&conn, id).unwrap().unwrap();
        assert_eq!(profile, UserProfile::empty(id));
    }

    #[test]
    fn profile_update_and_image() {
        let conn = test_db();
        let id = make_user(&conn, "p@curesio.com", "prof");
        let mut profile = get_profile(&conn, id).unwrap().unwrap();
        profile.city = "Dhaka".into();
        profile.secondary_language = Language::Bengali;
        profile.date_of_birth = NaiveDate::from_ymd_opt(1988, 2, 29);
        update_profile(&conn, &profile).unwrap();
        set_profile_image(&conn, id, Some("profile-images/x.png")).unwrap();

        let stored = get_profile(&conn, id).unwrap().unwrap();
        assert_eq!(stored.city, "Dhaka");
        assert_eq!(stored.secondary_language, Language::Bengali);
        assert_eq!(stored.date_of_birth, NaiveDate::from_ymd_opt(1988, 2, 29));
        assert_eq!(stored.image.as_deref(), Some("profile-images/x.png"));

        let listed = list_profiles(&conn, Some("dhaka")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "p@curesio.com");
    }

    #[test]
    fn doctor_slots_round_trip() {
        let conn = test_db();
        let id = make_user(&conn, "doc@curesio.com", "doc");
        ensure_doctor_profile(&conn, id).unwrap();
        let cardio = insert_speciality(&conn, "Cardiology").unwrap();
        let neuro = insert_speciality(&conn, "Neurology").unwrap();

        let mut doctor = get_doctor_profile(&conn, id).unwrap().unwrap();
        doctor.qualification = "MBBS, MD".into();
        doctor.speciality1 = vec![cardio, neuro];
        doctor.speciality3 = vec![neuro];
        update_doctor_profile(&conn, &doctor).unwrap();

        let stored = get_doctor_profile(&conn, id).unwrap().unwrap();
        assert_eq!(stored.qualification, "MBBS, MD");
        assert_eq!(stored.speciality1, vec![cardio, neuro]);
        assert!(stored.speciality2.is_empty());
        assert_eq!(stored.speciality3, vec![neuro]);

        delete_speciality(&conn, neuro).unwrap();
        let stored = get_doctor_profile(&conn, id).unwrap().unwrap();
        assert_eq!(stored.speciality1, vec![cardio]);
        assert!(stored.speciality3.is_empty());
    }

    #[test]
    fn missing_specialities_are_found() {
        let conn = test_db();
        let id = insert_speciality(&conn, "Oncology").unwrap();
        assert_eq!(missing_specialities(&conn, &[id, 99, 99]).unwrap(), vec![99]);
        let err = insert_speciality(&conn, "Oncology").unwrap_err();
        assert_eq!(err.unique_column(), Some("name"));
    }

    #[test]
    fn procedures_are_listed_by_name_descending() {
        let conn = test_db();
        make_procedure(&conn, "angioplasty");
        make_procedure(&conn, "knee replacement");
        make_procedure(&conn, "cataract surgery");
        let names: Vec<String> = list_procedures(&conn, None)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["knee replacement", "cataract surgery", "angioplasty"]);
    }

    #[test]
    fn procedure_update_and_delete() {
        let conn = test_db();
        let id = make_procedure(&conn, "bypass");
        let mut proc = get_procedure(&conn, id).unwrap().unwrap();
        proc.duration_minutes = 240;
        update_procedure(&conn, &proc).unwrap();
        assert_eq!(get_procedure(&conn, id).unwrap().unwrap().duration_minutes, 240);

        proc.id = 999;
        assert!(matches!(
            update_procedure(&conn, &proc),
            Err(DatabaseError::NotFound { .. })
        ));
        assert!(delete_procedure(&conn, id).unwrap());
        assert!(!delete_procedure(&conn, id).unwrap());
    }

    #[test]
    fn negative_duration_is_rejected() {
        let conn = test_db();
        let err = insert_procedure(
            &conn,
            &Procedure {
                id: 0,
                name: "x".into(),
                speciality: "y".into(),
                days_in_hospital: -1,
                days_in_destination: 0,
                duration_minutes: 0,
                overview: String::new(),
                other_details: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn tokens_accumulate_per_scope() {
        let conn = test_db();
        let id = make_user(&conn, "t@curesio.com", "tok");
        store_token(&conn, id, TokenScope::Api, &[1; 32]).unwrap();
        store_token(&conn, id, TokenScope::Admin, &[2; 32]).unwrap();
        store_token(&conn, id, TokenScope::Api, &[3; 32]).unwrap();

        assert_eq!(find_token_owner(&conn, &[1; 32], TokenScope::Api).unwrap(), Some(id));
        assert_eq!(find_token_owner(&conn, &[3; 32], TokenScope::Api).unwrap(), Some(id));
        assert_eq!(find_token_owner(&conn, &[2; 32], TokenScope::Api).unwrap(), None);
        assert_eq!(find_token_owner(&conn, &[2; 32], TokenScope::Admin).unwrap(), Some(id));

        assert!(delete_token(&conn, &[1; 32], TokenScope::Api).unwrap());
        assert!(!delete_token(&conn, &[2; 32], TokenScope::Api).unwrap());
        assert_eq!(find_token_owner(&conn, &[1; 32], TokenScope::Api).unwrap(), None);
        assert_eq!(find_token_owner(&conn, &[3; 32], TokenScope::Api).unwrap(), Some(id));

        assert_eq!(delete_user_tokens(&conn, id).unwrap(), 2);
        assert_eq!(count(&conn, "auth_tokens"), 0);
    }

    #[test]
    fn deleting_profile_keeps_user() {
        let conn = test_db();
        let id = make_user(&conn, "p@curesio.com", "prof");
        ensure_profile(&conn, id).unwrap();
        assert!(delete_profile(&conn, id).unwrap());
        assert!(get_profile(&conn, id).unwrap().is_none());
        assert!(get_user(&conn, id).unwrap().is_some());
        assert!(!delete_profile(&conn, id).unwrap());
    }

    #[test]
    fn deleting_user_cascades() {
        let conn = test_db();
        let id = make_user(&conn, "gone@curesio.com", "gone");
        ensure_doctor_profile(&conn, id).unwrap();
        let spec = insert_speciality(&conn, "Urology").unwrap();
        set_speciality_slot(&conn, id, 1, &[spec]).unwrap();
        store_token(&conn, id, TokenScope::Api, &[9; 32]).unwrap();

        assert!(delete_user(&conn, id).unwrap());
        for table in ["user_profiles", "doctor_profiles", "doctor_specialities", "auth_tokens"] {
            assert_eq!(count(&conn, table), 0, "{table} not cascaded");
        }
        assert_eq!(count(&conn, "specialities"), 1);
    }

    #[test]
    fn deleting_hospital_cascades() {
        let conn = test_db();
        let hospital_id = make_hospital(&conn, "Apollo");
        let doctor_id = make_user(&conn, "doc@curesio.com", "doc");
        let procedure_id = make_procedure(&conn, "bypass");

        insert_accreditation(
            &conn,
            &Accreditation {
                id: 0,
                hospital_id,
                name: "JCI".into(),
                issued_by: "Joint Commission".into(),
                valid_until: NaiveDate::from_ymd_opt(2027, 1, 1),
            },
        )
        .unwrap();
        insert_service(
            &conn,
            &Service {
                id: 0,
                hospital_id,
                name: "ICU".into(),
                description: String::new(),
            },
        )
        .unwrap();
        insert_hospital_doctor(&conn, &HospitalDoctor { id: 0, hospital_id, doctor_id }).unwrap();
        insert_hospital_procedure(
            &conn,
            &HospitalProcedure {
                id: 0,
                hospital_id,
                procedure_id,
                price: Some("USD 4200".into()),
            },
        )
        .unwrap();
        insert_hospital_language(
            &conn,
            &HospitalLanguage { id: 0, hospital_id, language: Language::Hindi },
        )
        .unwrap();

        assert!(delete_hospital(&conn, hospital_id).unwrap());
        for table in [
            "accreditations",
            "services",
            "hospital_doctors",
            "hospital_procedures",
            "hospital_languages",
        ] {
            assert_eq!(count(&conn, table), 0, "{table} not cascaded");
        }
        assert_eq!(count(&conn, "procedures"), 1);
        assert_eq!(count(&conn, "users"), 1);
    }

    #[test]
    fn hospital_associations_are_unique_pairs() {
        let conn = test_db();
        let hospital_id = make_hospital(&conn, "Fortis");
        let link = HospitalLanguage { id: 0, hospital_id, language: Language::English };
        insert_hospital_language(&conn, &link).unwrap();
        let err = insert_hospital_language(&conn, &link).unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation { .. }));

        let listed = list_hospital_languages(&conn, Some("fortis")).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].language, Language::English);
    }

    #[test]
    fn hospital_update_and_search() {
        let conn = test_db();
        let id = make_hospital(&conn, "Max");
        let mut h = get_hospital(&conn, id).unwrap().unwrap();
        h.city = "Delhi".into();
        h.phone = Some("+911140554055".into());
        update_hospital(&conn, &h).unwrap();
        let found = list_hospitals(&conn, Some("delhi")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].phone.as_deref(), Some("+911140554055"));
    }
}
