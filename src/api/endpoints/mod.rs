//! API endpoint handlers.
//!
//! Handlers stay thin: extract, call into `accounts` / `catalog`, map the
//! result. Password hashing and image decoding run on the blocking pool.

pub mod doctor;
pub mod health;
pub mod images;
pub mod procedures;
pub mod user;

use crate::api::error::ApiError;

/// Run CPU-heavy work (PBKDF2, image decoding) off the async workers.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
