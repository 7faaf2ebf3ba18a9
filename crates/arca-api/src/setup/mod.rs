//! Application wiring: database, services, routes.

pub mod database;
pub mod routes;
pub mod services;

pub use database::setup_database;
pub use routes::build_router;
pub use services::{build_state, import_configs_at_startup};
