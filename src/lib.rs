pub mod accounts; // User, doctor and token lifecycle
pub mod admin; // Staff console
pub mod api; // REST API router
pub mod catalog; // Procedure catalog
pub mod config;
pub mod core_state; // Shared request state
pub mod crypto;
pub mod db;
pub mod media; // Profile image storage
pub mod models;
pub mod validation;
