//! Access logging middleware.
//!
//! Emits one tracing event per API request with method, path, status,
//! user id and latency. Runs inside the token resolver so the user is known.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_id = req.extensions().get::<AuthUser>().map(AuthUser::id);
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let latency_ms = started.elapsed().as_millis() as u64;
    if status >= 500 {
        tracing::warn!(%method, %path, status, user_id, latency_ms, "API request failed");
    } else {
        tracing::info!(%method, %path, status, user_id, latency_ms, "API request");
    }

    response
}
