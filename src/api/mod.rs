//! REST API.
//!
//! JSON endpoints for patient and doctor accounts and the procedure
//! catalog, nested under `/api/`. Requests pass through the token
//! resolver and access log; account routes additionally require a
//! signed-in user.
//!
//! The router is composable: `app()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::{api_router, app};
pub use server::{serve, start_server, ApiServer};
pub use types::ApiContext;
