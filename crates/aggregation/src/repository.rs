//! Aggregate queries against the store.

use async_trait::async_trait;
use skillgap_db::models::RefreshRun;
use skillgap_db::{DbPool, StoreResult};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::{ExportRow, RegionTotal, SkillTotal, SkillTrend, TopSkill};

/// Read-side access to the demand data.
///
/// Every method returns rows in their final order; callers never re-sort.
#[async_trait]
pub trait DemandRepository: Send + Sync {
    /// Demand total of every region, zero for regions without demand rows.
    async fn region_totals(&self) -> StoreResult<Vec<RegionTotal>>;

    /// Per-skill demand summed over the regions with the given slugs.
    async fn skill_trends(&self, slugs: &[&str]) -> StoreResult<Vec<SkillTrend>>;

    /// The `limit` skills with the highest national demand.
    async fn top_skills(&self, limit: u32) -> StoreResult<Vec<TopSkill>>;

    /// Every demand record joined with its region and skill.
    async fn demand_export(&self) -> StoreResult<Vec<ExportRow>>;

    /// National demand grouped by skill name.
    async fn national_totals(&self) -> StoreResult<Vec<SkillTotal>>;

    async fn last_refresh(&self) -> StoreResult<Option<RefreshRun>>;
}

/// [`DemandRepository`] backed by the SQLite store.
#[derive(Clone)]
pub struct SqliteRepository {
    db: DbPool,
}

impl SqliteRepository {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DemandRepository for SqliteRepository {
    async fn region_totals(&self) -> StoreResult<Vec<RegionTotal>> {
        let rows = sqlx::query_as::<_, RegionTotal>(
            r#"
            SELECT r.id AS id, r.name AS name, r.slug AS slug,
                   COALESCE(SUM(d.count), 0) AS total_demand
            FROM regions r
            LEFT JOIN skill_demand d ON d.region_id = r.id
            GROUP BY r.id, r.name, r.slug
            ORDER BY r.id
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows)
    }

    async fn skill_trends(&self, slugs: &[&str]) -> StoreResult<Vec<SkillTrend>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT s.name AS skill_name, s.category AS category,
                   SUM(d.count) AS count, MAX(d.last_updated) AS last_updated
            FROM skill_demand d
            INNER JOIN regions r ON d.region_id = r.id
            INNER JOIN skills s ON d.skill_id = s.id
            WHERE r.slug IN ("#,
        );
        let mut in_list = builder.separated(", ");
        for slug in slugs {
            in_list.push_bind(slug.to_string());
        }
        in_list.push_unseparated(")");
        builder.push(
            r#"
            GROUP BY s.name, s.category
            ORDER BY SUM(d.count) DESC, s.name ASC, s.category ASC
            "#,
        );

        let rows = builder
            .build_query_as::<SkillTrend>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows)
    }

    async fn top_skills(&self, limit: u32) -> StoreResult<Vec<TopSkill>> {
        let rows = sqlx::query_as::<_, TopSkill>(
            r#"
            SELECT s.name AS skill_name, s.category AS category,
                   SUM(d.count) AS total_count
            FROM skill_demand d
            INNER JOIN skills s ON d.skill_id = s.id
            GROUP BY s.id, s.name, s.category
            ORDER BY SUM(d.count) DESC, s.id ASC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows)
    }

    async fn demand_export(&self) -> StoreResult<Vec<ExportRow>> {
        let rows = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT r.name AS region, s.name AS skill, s.category AS category,
                   d.count AS demand_count, d.last_updated AS last_updated
            FROM skill_demand d
            INNER JOIN regions r ON d.region_id = r.id
            INNER JOIN skills s ON d.skill_id = s.id
            ORDER BY d.count DESC, d.id ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows)
    }

    async fn national_totals(&self) -> StoreResult<Vec<SkillTotal>> {
        let rows = sqlx::query_as::<_, SkillTotal>(
            r#"
            SELECT s.name AS skill, SUM(d.count) AS total_demand
            FROM skill_demand d
            INNER JOIN skills s ON d.skill_id = s.id
            GROUP BY s.name
            ORDER BY SUM(d.count) DESC, s.name ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows)
    }

    async fn last_refresh(&self) -> StoreResult<Option<RefreshRun>> {
        self.db.last_refresh_run().await
    }
}
