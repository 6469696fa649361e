//! Refresh run bookkeeping.

use chrono::Utc;
use sqlx::Row;

use crate::error::StoreResult;
use crate::models::{RefreshRun, RefreshStatus};
use crate::pool::DbPool;
use crate::snapshot::SnapshotCounts;

impl DbPool {
    /// Record the start of a refresh and return the run id.
    pub async fn start_refresh_run(&self, mode: &str) -> StoreResult<i64> {
        let id = sqlx::query(
            "INSERT INTO refresh_runs (started_at, status, mode) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(Utc::now())
        .bind(RefreshStatus::Running.as_str())
        .bind(mode)
        .fetch_one(self.pool())
        .await?
        .get::<i64, _>(0);

        Ok(id)
    }

    /// Close a run with its final status.
    pub async fn finish_refresh_run(
        &self,
        id: i64,
        status: RefreshStatus,
        message: &str,
        counts: SnapshotCounts,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE refresh_runs
            SET finished_at = ?, status = ?, message = ?,
                regions = ?, skills = ?, demand_rows = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(status.as_str())
        .bind(message)
        .bind(counts.regions as i64)
        .bind(counts.skills as i64)
        .bind(counts.demand_rows as i64)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Most recent refresh run, if any.
    pub async fn last_refresh_run(&self) -> StoreResult<Option<RefreshRun>> {
        let run = sqlx::query_as::<_, RefreshRun>(
            r#"
            SELECT id, started_at, finished_at, status, mode, message,
                   regions, skills, demand_rows
            FROM refresh_runs
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool())
        .await?;

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_lifecycle() {
        let db = DbPool::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.last_refresh_run().await.unwrap().is_none());

        let id = db.start_refresh_run("staged").await.unwrap();
        let running = db.last_refresh_run().await.unwrap().unwrap();
        assert_eq!(running.id, id);
        assert_eq!(running.status, "running");
        assert!(running.finished_at.is_none());

        let counts = SnapshotCounts { regions: 2, skills: 1, demand_rows: 2 };
        db.finish_refresh_run(id, RefreshStatus::Succeeded, "ok", counts)
            .await
            .unwrap();

        let done = db.last_refresh_run().await.unwrap().unwrap();
        assert_eq!(done.status, "succeeded");
        assert_eq!(done.mode, "staged");
        assert_eq!(done.demand_rows, 2);
        assert!(done.finished_at.is_some());
    }
}
