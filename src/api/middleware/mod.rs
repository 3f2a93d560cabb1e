//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Token resolver: validates a presented token, injects `AuthUser`
//! 2. Audit logger: one event per request, after auth has run
//! 3. `require_auth` on account routes only

pub mod audit;
pub mod auth;
