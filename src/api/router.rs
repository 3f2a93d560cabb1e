//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! JSON endpoints are nested under `/api/`, the admin console under
//! `/admin`, and uploaded files are served from `/media`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Token resolver → 2. Access log → 3. `require_auth` (account routes only)

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::admin;
use crate::api::endpoints::{doctor, health, images, procedures, user};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::media::MEDIA_URL_PREFIX;

/// Room for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the full application: API, admin console and media files.
pub fn app(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    Router::new()
        .merge(build_api(ctx.clone()))
        .merge(admin::admin_router(ctx.clone()))
        .nest_service(
            MEDIA_URL_PREFIX,
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .service(ServeDir::new(ctx.core.media_root())),
        )
}

/// Build only the JSON API under `/api/`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_api(ApiContext::new(core))
}

fn build_api(ctx: ApiContext) -> Router {
    // Multipart uploads get the image limit plus framing; everything else
    // keeps axum's default.
    let upload_limit =
        DefaultBodyLimit::max(ctx.core.media().max_image_bytes() + MULTIPART_OVERHEAD);

    // Routes acting on the caller's own account.
    let account = Router::new()
        .route(
            "/user/me",
            get(user::me).put(user::replace_me).patch(user::update_me),
        )
        .route(
            "/user/upload-image",
            get(images::current)
                .post(images::upload)
                .layer(upload_limit),
        )
        .route(
            "/doctor/me",
            get(doctor::me).put(doctor::replace_me).patch(doctor::update_me),
        )
        .route(
            "/doctor/upload-image",
            get(images::current)
                .post(images::upload)
                .layer(upload_limit),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth::require_auth));

    // Open routes. Procedure writes check for staff inside the handler so
    // reads on the same path stay anonymous.
    let open = Router::new()
        .route("/health", get(health::check))
        .route("/user/signup", post(user::signup))
        .route("/user/token", post(user::token))
        .route("/doctor/signup", post(doctor::signup))
        .route("/doctor/token", post(doctor::token))
        .route("/doctor/specialities", get(doctor::specialities))
        .route(
            "/staff/procedure",
            get(procedures::list).post(procedures::create),
        )
        .route(
            "/staff/procedure/:id",
            get(procedures::detail)
                .put(procedures::replace)
                .patch(procedures::update)
                .delete(procedures::delete),
        );

    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → CORS → Token → Audit (innermost) → Handler
    let api = open
        .merge(account)
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::resolve_token))
        .layer(cors())
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", api)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
