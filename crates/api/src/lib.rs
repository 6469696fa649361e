//! HTTP surface of the skill demand service.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use app::{build_router, AppState};
pub use config::ApiConfig;
pub use error::ApiError;
