//! JSON-lines audit trail.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Append-only JSON-lines file. A log without a path accepts and drops
/// every record.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: Option<impl Into<PathBuf>>) -> Self {
        Self {
            path: path.map(Into::into),
        }
    }

    /// Append `record` as one compact line, written with a single `write_all`.
    pub fn append<T: Serialize>(&self, record: &T) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(&line)?;
        debug!(path = %path.display(), bytes = line.len(), "Appended audit record");
        Ok(())
    }
}
