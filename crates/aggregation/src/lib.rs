//! Aggregate read queries over the skill demand store.

pub mod districts;
pub mod models;
pub mod repository;
pub mod service;

pub use repository::{DemandRepository, SqliteRepository};
pub use service::{parse_limit, AggregationService, QueryError};
