//! Staff admin console.
//!
//! Server-rendered HTML pages for managing every stored record: a model
//! index, per-model change lists with search, add/edit forms with inline
//! validation errors, and delete confirmation. Sign-in uses an admin-scope
//! token carried in an HttpOnly cookie; only active staff accounts get in.

pub mod forms;
pub mod html;
pub mod models;
mod pages;
mod session;

use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use thiserror::Error;

use crate::accounts::AccountError;
use crate::api::middleware::audit;
use crate::api::ApiContext;
use crate::catalog::CatalogError;
use crate::db::DatabaseError;
use crate::models::User;
use crate::validation::FieldErrors;

pub use session::SESSION_COOKIE;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Invalid input: {}", .0.summary())]
    Invalid(FieldErrors),

    #[error("Not found")]
    NotFound,

    #[error("Not allowed")]
    NotAllowed,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AdminError {
    fn from(err: rusqlite::Error) -> Self {
        AdminError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<AccountError> for AdminError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(errors) => AdminError::Invalid(errors),
            AccountError::NotFound(_) => AdminError::NotFound,
            AccountError::Database(e) => AdminError::Database(e),
            other => AdminError::Internal(other.to_string()),
        }
    }
}

impl From<CatalogError> for AdminError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Invalid(errors) => AdminError::Invalid(errors),
            CatalogError::NotFound(_) => AdminError::NotFound,
            CatalogError::Database(e) => AdminError::Database(e),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AdminError::NotFound => (StatusCode::NOT_FOUND, "The requested record does not exist."),
            AdminError::NotAllowed => (
                StatusCode::FORBIDDEN,
                "This action is not available for this model.",
            ),
            // Form errors are rendered by the page handlers; reaching here
            // means a handler had no form to show them on.
            AdminError::Invalid(_) => (StatusCode::BAD_REQUEST, "The submitted data was invalid."),
            AdminError::Database(e) => {
                tracing::error!(error = %e, "Admin database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "A server error occurred.")
            }
            AdminError::Internal(e) => {
                tracing::error!(error = %e, "Admin internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "A server error occurred.")
            }
        };
        let title = status.canonical_reason().unwrap_or("Error");
        let body = format!(
            r#"<p>{}</p><p><a href="/admin">Back to site administration</a></p>"#,
            html::escape(message)
        );
        (status, Html(html::page(title, None, &body))).into_response()
    }
}

/// Signed-in staff account, injected by the session middleware.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// Build the console router, mounted at `/admin`.
pub fn admin_router(ctx: ApiContext) -> Router {
    let protected = Router::new()
        .route("/admin", get(pages::index))
        .route("/admin/", get(pages::index))
        .route("/admin/logout", post(session::logout))
        .route("/admin/:model", get(pages::change_list))
        .route("/admin/:model/:id", get(pages::edit).post(pages::save))
        .route(
            "/admin/:model/:id/delete",
            get(pages::confirm_delete).post(pages::delete),
        )
        .route_layer(from_fn(session::require_staff_session));

    Router::new()
        .route("/admin/login", get(session::login_page).post(session::login))
        .merge(protected)
        .layer(from_fn(audit::log_access))
        .layer(Extension(ctx))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::accounts::{self, SignupRequest};
    use crate::api::app;
    use crate::config::Config;
    use crate::core_state::CoreState;
    use crate::db;

    const PASSWORD: &str = "adminpassword";

    struct Console {
        core: Arc<CoreState>,
        _dir: tempfile::TempDir,
    }

    fn encode(pairs: &[(&str, &str)]) -> String {
        let escape = |s: &str| {
            s.bytes()
                .map(|b| match b {
                    b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                        (b as char).to_string()
                    }
                    _ => format!("%{b:02X}"),
                })
                .collect::<String>()
        };
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    impl Console {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::with_data_dir(dir.path());
            config.password_iterations = 1000;
            let core = Arc::new(CoreState::new(config));
            core.prepare().unwrap();
            Self { core, _dir: dir }
        }

        fn user(&self, email: &str, username: &str, staff: bool) -> i64 {
            let mut conn = self.core.open_db().unwrap();
            let req = SignupRequest {
                email: Some(email.into()),
                username: Some(username.into()),
                password: Some(PASSWORD.into()),
            };
            let user = if staff {
                accounts::create_superuser(&mut conn, self.core.hasher(), &req).unwrap()
            } else {
                accounts::create_user(&mut conn, self.core.hasher(), &req).unwrap()
            };
            user.id
        }

        async fn send(&self, req: Request<Body>) -> Response {
            app(self.core.clone()).oneshot(req).await.unwrap()
        }

        async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
            let mut builder = Request::builder().uri(uri);
            if let Some(c) = cookie {
                builder = builder.header(header::COOKIE, c);
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        async fn post(&self, uri: &str, cookie: Option<&str>, pairs: &[(&str, &str)]) -> Response {
            let mut builder = Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            if let Some(c) = cookie {
                builder = builder.header(header::COOKIE, c);
            }
            self.send(builder.body(Body::from(encode(pairs))).unwrap()).await
        }

        /// Sign in and return the `Cookie` header value to send back.
        async fn login(&self, email: &str, password: &str) -> String {
            let response = self
                .post("/admin/login", None, &[("email", email), ("password", password)])
                .await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
            set_cookie.split(';').next().unwrap().to_string()
        }
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn pages_redirect_to_login_without_session() {
        let console = Console::new();
        let response = console.get("/admin/users", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/login");

        let response = console.get("/admin/login", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(text(response).await.contains(r#"action="/admin/login""#));
    }

    #[tokio::test]
    async fn staff_login_sets_http_only_cookie() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let response = console
            .post(
                "/admin/login",
                None,
                &[("email", "admin@curesio.com"), ("password", PASSWORD)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("curesio_admin="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn non_staff_and_wrong_password_are_refused() {
        let console = Console::new();
        console.user("patient@curesio.com", "patient", false);
        console.user("admin@curesio.com", "admin", true);

        for (email, password) in [
            ("patient@curesio.com", PASSWORD),
            ("admin@curesio.com", "wrongpassword"),
        ] {
            let response = console
                .post("/admin/login", None, &[("email", email), ("password", password)])
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
            assert!(text(response).await.contains("correct email and password for a staff"));
        }
    }

    #[tokio::test]
    async fn api_token_is_not_an_admin_session() {
        let console = Console::new();
        let id = console.user("admin@curesio.com", "admin", true);
        let token = {
            let conn = console.core.open_db().unwrap();
            accounts::issue_token(&conn, id, crate::models::TokenScope::Api).unwrap()
        };
        let response = console
            .get("/admin", Some(&format!("curesio_admin={token}")))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn index_lists_every_model() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;
        let response = console.get("/admin", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = text(response).await;
        for slug in ["users", "profiles", "specialities", "procedures", "hospitals", "hospital-languages"] {
            assert!(body.contains(&format!(r#"href="/admin/{slug}""#)), "{slug}");
        }
        assert!(!body.contains(r#"href="/admin/profiles/new""#));
    }

    #[tokio::test]
    async fn users_list_shows_columns_and_searches() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        console.user("patient@curesio.com", "patient", false);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;

        let body = text(console.get("/admin/users", Some(&cookie)).await).await;
        for column in ["Email", "Username", "Superuser", "Staff", "Active"] {
            assert!(body.contains(&format!("<th>{column}</th>")));
        }
        let admin = body.find("admin@curesio.com</a>").unwrap();
        let patient = body.find("patient@curesio.com</a>").unwrap();
        assert!(admin < patient);

        let body = text(console.get("/admin/users?q=patient", Some(&cookie)).await).await;
        assert!(body.contains("patient@curesio.com"));
        assert!(!body.contains("admin@curesio.com</a>"));
    }

    #[tokio::test]
    async fn create_edit_and_delete_a_hospital() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;

        let response = console
            .post(
                "/admin/hospitals/new",
                Some(&cookie),
                &[("name", "Apollo"), ("city", "Chennai"), ("country", "in")],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/hospitals");

        let id = {
            let conn = console.core.open_db().unwrap();
            db::list_hospitals(&conn, None).unwrap()[0].id
        };
        let body = text(console.get(&format!("/admin/hospitals/{id}"), Some(&cookie)).await).await;
        assert!(body.contains(r#"value="Apollo""#));
        assert!(body.contains(r#"value="IN""#));

        let response = console
            .post(
                &format!("/admin/hospitals/{id}"),
                Some(&cookie),
                &[("name", "Apollo Chennai"), ("city", "Chennai"), ("country", "IN")],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let body = text(console.get(&format!("/admin/hospitals/{id}/delete"), Some(&cookie)).await).await;
        assert!(body.contains("Apollo Chennai"));
        let response = console
            .post(&format!("/admin/hospitals/{id}/delete"), Some(&cookie), &[])
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let conn = console.core.open_db().unwrap();
        assert!(db::get_hospital(&conn, id).unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_form_is_rerendered_with_errors() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;
        console
            .post("/admin/hospitals/new", Some(&cookie), &[("name", "Apollo")])
            .await;

        let response = console
            .post(
                "/admin/hospitals/new",
                Some(&cookie),
                &[("name", "Apollo"), ("city", "<b>Pune</b>")],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = text(response).await;
        assert!(body.contains("Hospital with this name already exists."));
        assert!(body.contains("&lt;b&gt;Pune&lt;/b&gt;"));
        assert!(!body.contains("<b>Pune</b>"));
    }

    #[tokio::test]
    async fn admin_creates_staff_user_with_profile() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;

        let response = console
            .post(
                "/admin/users/new",
                Some(&cookie),
                &[
                    ("email", "nurse@curesio.com"),
                    ("username", "nurse"),
                    ("password", "nursepassword"),
                    ("is_active", "on"),
                    ("is_staff", "on"),
                    ("profile.city", "Kolkata"),
                    ("profile.primary_language", "BN"),
                    ("profile.secondary_language", "EN"),
                    ("profile.tertiary_language", "EN"),
                ],
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let conn = console.core.open_db().unwrap();
        let nurse = db::get_user_by_email(&conn, "nurse@curesio.com").unwrap().unwrap();
        assert!(nurse.is_staff);
        assert!(!nurse.is_superuser);
        assert_eq!(db::get_profile(&conn, nurse.id).unwrap().unwrap().city, "Kolkata");
        drop(conn);

        let cookie = console.login("nurse@curesio.com", "nursepassword").await;
        let response = console.get("/admin", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_model_or_record_is_404() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;
        for uri in ["/admin/nope", "/admin/hospitals/999", "/admin/hospitals/abc"] {
            let response = console.get(uri, Some(&cookie)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
        let response = console.get("/admin/profiles/new", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn logout_revokes_only_that_session() {
        let console = Console::new();
        console.user("admin@curesio.com", "admin", true);
        let cookie = console.login("admin@curesio.com", PASSWORD).await;
        let other = console.login("admin@curesio.com", PASSWORD).await;
        assert_ne!(cookie, other);

        let response = console.post("/admin/logout", Some(&cookie), &[]).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0"));

        let response = console.get("/admin", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/login");

        let response = console.get("/admin", Some(&other)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
