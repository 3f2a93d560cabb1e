//! Shared types for the HTTP layer.

use std::sync::Arc;

use crate::core_state::CoreState;
use crate::models::User;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Authenticated account, injected into request extensions by the token
/// middleware after a successful lookup.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    /// Fail with 403 unless the account is staff.
    pub fn require_staff(&self) -> Result<(), crate::api::error::ApiError> {
        if self.0.is_staff {
            Ok(())
        } else {
            Err(crate::api::error::ApiError::Forbidden)
        }
    }
}
