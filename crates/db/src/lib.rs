//! Storage layer for the skill demand service.
//!
//! Provides SQLite storage for regions, skills and demand counts, schema
//! migrations, and the whole-snapshot replacement used by refreshes.

pub mod error;
pub mod models;
pub mod pool;
pub mod runs;
pub mod snapshot;

pub use error::{StoreError, StoreResult};
pub use pool::DbPool;
pub use snapshot::Snapshot;
