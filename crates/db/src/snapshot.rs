//! Whole-snapshot persistence.
//!
//! Regions, skills and demand rows are never updated row by row: a refresh
//! deletes every row (children first) and inserts one complete scrape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::pool::DbPool;

/// A region as produced by a scrape, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegion {
    pub name: String,
    pub slug: String,
}

/// A skill as produced by a scrape. The same name may appear under several
/// categories; `(name, category)` identifies one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSkill {
    pub name: String,
    pub category: String,
}

impl NewSkill {
    fn key(&self) -> (&str, &str) {
        (&self.name, &self.category)
    }
}

/// A demand count keyed by region slug and skill `(name, category)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDemand {
    pub region_slug: String,
    pub skill_name: String,
    pub category: String,
    pub count: u32,
    pub last_updated: DateTime<Utc>,
}

/// One complete scrape result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub regions: Vec<NewRegion>,
    pub skills: Vec<NewSkill>,
    pub demand: Vec<NewDemand>,
}

/// Row counts written for a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCounts {
    pub regions: usize,
    pub skills: usize,
    pub demand_rows: usize,
}

/// Whether `slug` is lowercase ASCII letters, digits and inner hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl Snapshot {
    /// Check that the snapshot can be stored as one coherent unit.
    pub fn validate(&self) -> StoreResult<()> {
        if self.regions.is_empty() {
            return Err(invalid("snapshot contains no regions"));
        }

        let mut slugs = HashSet::new();
        for region in &self.regions {
            if !is_valid_slug(&region.slug) {
                return Err(invalid(format!("region slug {:?} is not URL-safe", region.slug)));
            }
            if !slugs.insert(region.slug.as_str()) {
                return Err(invalid(format!("duplicate region slug {:?}", region.slug)));
            }
        }

        let mut skills = HashSet::new();
        for skill in &self.skills {
            if skill.name.trim().is_empty() {
                return Err(invalid("skill with empty name"));
            }
            if !skills.insert(skill.key()) {
                return Err(invalid(format!(
                    "duplicate skill {:?} in category {:?}",
                    skill.name, skill.category
                )));
            }
        }

        for row in &self.demand {
            if !slugs.contains(row.region_slug.as_str()) {
                return Err(invalid(format!(
                    "demand row references unknown region {:?}",
                    row.region_slug
                )));
            }
            if !skills.contains(&(row.skill_name.as_str(), row.category.as_str())) {
                return Err(invalid(format!(
                    "demand row references unknown skill {:?} in category {:?}",
                    row.skill_name, row.category
                )));
            }
        }

        Ok(())
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            regions: self.regions.len(),
            skills: self.skills.len(),
            demand_rows: self.demand.len(),
        }
    }
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidSnapshot(message.into())
}

impl DbPool {
    /// Atomically swap the stored data for `snapshot`.
    ///
    /// Validation happens before anything is touched, and delete plus insert
    /// share one transaction, so concurrent readers see either the previous
    /// snapshot or the new one.
    pub async fn replace_snapshot(&self, snapshot: &Snapshot) -> StoreResult<SnapshotCounts> {
        snapshot.validate()?;

        let mut tx = self.pool().begin().await?;
        delete_all(&mut tx).await?;
        let counts = insert_all(&mut tx, snapshot).await?;
        tx.commit().await?;

        info!(
            regions = counts.regions,
            skills = counts.skills,
            demand_rows = counts.demand_rows,
            "Replaced snapshot"
        );
        Ok(counts)
    }

    /// Delete every region, skill and demand row and commit immediately.
    pub async fn clear_snapshot(&self) -> StoreResult<()> {
        let mut tx = self.pool().begin().await?;
        delete_all(&mut tx).await?;
        tx.commit().await?;
        info!("Cleared snapshot tables");
        Ok(())
    }

    /// Insert `snapshot` into tables assumed to be empty.
    pub async fn insert_snapshot(&self, snapshot: &Snapshot) -> StoreResult<SnapshotCounts> {
        snapshot.validate()?;

        let mut tx = self.pool().begin().await?;
        let counts = insert_all(&mut tx, snapshot).await?;
        tx.commit().await?;
        Ok(counts)
    }

    /// Row counts of the stored snapshot.
    pub async fn snapshot_counts(&self) -> StoreResult<SnapshotCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM regions),
                (SELECT COUNT(*) FROM skills),
                (SELECT COUNT(*) FROM skill_demand)
            "#,
        )
        .fetch_one(self.pool())
        .await?;

        Ok(SnapshotCounts {
            regions: row.get::<i64, _>(0) as usize,
            skills: row.get::<i64, _>(1) as usize,
            demand_rows: row.get::<i64, _>(2) as usize,
        })
    }
}

async fn delete_all(conn: &mut SqliteConnection) -> StoreResult<()> {
    sqlx::query("DELETE FROM skill_demand").execute(&mut *conn).await?;
    sqlx::query("DELETE FROM regions").execute(&mut *conn).await?;
    sqlx::query("DELETE FROM skills").execute(&mut *conn).await?;
    Ok(())
}

async fn insert_all(conn: &mut SqliteConnection, snapshot: &Snapshot) -> StoreResult<SnapshotCounts> {
    let mut region_ids = HashMap::with_capacity(snapshot.regions.len());
    for region in &snapshot.regions {
        let id: i64 = sqlx::query("INSERT INTO regions (name, slug) VALUES (?, ?) RETURNING id")
            .bind(&region.name)
            .bind(&region.slug)
            .fetch_one(&mut *conn)
            .await?
            .get(0);
        region_ids.insert(region.slug.as_str(), id);
    }

    let mut skill_ids = HashMap::with_capacity(snapshot.skills.len());
    for skill in &snapshot.skills {
        let id: i64 = sqlx::query("INSERT INTO skills (name, category) VALUES (?, ?) RETURNING id")
            .bind(&skill.name)
            .bind(&skill.category)
            .fetch_one(&mut *conn)
            .await?
            .get(0);
        skill_ids.insert(skill.key(), id);
    }

    for row in &snapshot.demand {
        // validate() guarantees both lookups succeed
        let (Some(region_id), Some(skill_id)) = (
            region_ids.get(row.region_slug.as_str()),
            skill_ids.get(&(row.skill_name.as_str(), row.category.as_str())),
        ) else {
            return Err(invalid("demand row lost its region or skill"));
        };

        sqlx::query(
            r#"
            INSERT INTO skill_demand (region_id, skill_id, count, last_updated)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(*region_id)
        .bind(*skill_id)
        .bind(i64::from(row.count))
        .bind(row.last_updated)
        .execute(&mut *conn)
        .await?;
    }

    debug!("Inserted {} demand rows", snapshot.demand.len());
    Ok(snapshot.counts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    fn sample() -> Snapshot {
        Snapshot {
            regions: vec![
                NewRegion { name: "Quezon City".into(), slug: "qc".into() },
                NewRegion { name: "Manila".into(), slug: "manila".into() },
            ],
            skills: vec![NewSkill { name: "Python".into(), category: "Programming".into() }],
            demand: vec![
                demand("qc", "Python", "Programming", 5),
                demand("manila", "Python", "Programming", 3),
            ],
        }
    }

    fn demand(slug: &str, skill: &str, category: &str, count: u32) -> NewDemand {
        NewDemand {
            region_slug: slug.into(),
            skill_name: skill.into(),
            category: category.into(),
            count,
            last_updated: ts(),
        }
    }

    async fn db() -> DbPool {
        let db = DbPool::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("quezon-city"));
        assert!(is_valid_slug("qc2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Quezon City"));
        assert!(!is_valid_slug("-manila"));
        assert!(!is_valid_slug("las_pinas"));
    }

    #[test]
    fn validate_rejects_unknown_references() {
        let mut snapshot = sample();
        snapshot.demand[0].region_slug = "cebu".into();
        assert!(matches!(snapshot.validate(), Err(StoreError::InvalidSnapshot(_))));

        let mut snapshot = sample();
        snapshot.demand[1].skill_name = "Rust".into();
        assert!(matches!(snapshot.validate(), Err(StoreError::InvalidSnapshot(_))));

        let mut snapshot = sample();
        snapshot.demand[1].category = "Data".into();
        assert!(matches!(snapshot.validate(), Err(StoreError::InvalidSnapshot(_))));
    }

    #[test]
    fn same_name_in_two_categories_is_two_skills() {
        let mut snapshot = sample();
        snapshot.skills.push(NewSkill { name: "Python".into(), category: "Data".into() });
        snapshot.demand.push(demand("qc", "Python", "Data", 2));
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicates_and_empty() {
        let mut snapshot = sample();
        snapshot.regions.push(NewRegion { name: "QC again".into(), slug: "qc".into() });
        assert!(snapshot.validate().is_err());

        let mut snapshot = sample();
        snapshot.skills.push(snapshot.skills[0].clone());
        assert!(snapshot.validate().is_err());

        assert!(Snapshot::default().validate().is_err());
    }

    #[tokio::test]
    async fn replace_swaps_whole_snapshot() {
        let db = db().await;
        db.replace_snapshot(&sample()).await.unwrap();

        let next = Snapshot {
            regions: vec![NewRegion { name: "Pasig".into(), slug: "pasig".into() }],
            skills: vec![NewSkill { name: "Excel".into(), category: "Office".into() }],
            demand: vec![demand("pasig", "Excel", "Office", 7)],
        };
        let counts = db.replace_snapshot(&next).await.unwrap();
        assert_eq!(counts, SnapshotCounts { regions: 1, skills: 1, demand_rows: 1 });
        assert_eq!(db.snapshot_counts().await.unwrap(), counts);

        let slugs: Vec<String> = sqlx::query_scalar("SELECT slug FROM regions")
            .fetch_all(db.pool())
            .await
            .unwrap();
        assert_eq!(slugs, vec!["pasig"]);
    }

    #[tokio::test]
    async fn invalid_snapshot_leaves_store_untouched() {
        let db = db().await;
        db.replace_snapshot(&sample()).await.unwrap();

        let mut broken = sample();
        broken.demand[0].skill_name = "Cobol".into();
        assert!(db.replace_snapshot(&broken).await.is_err());

        assert_eq!(
            db.snapshot_counts().await.unwrap(),
            SnapshotCounts { regions: 2, skills: 1, demand_rows: 2 }
        );
    }

    #[tokio::test]
    async fn clear_then_insert() {
        let db = db().await;
        db.replace_snapshot(&sample()).await.unwrap();

        db.clear_snapshot().await.unwrap();
        assert_eq!(db.snapshot_counts().await.unwrap(), SnapshotCounts::default());

        db.insert_snapshot(&sample()).await.unwrap();
        assert_eq!(db.snapshot_counts().await.unwrap().demand_rows, 2);
    }

    #[tokio::test]
    async fn demand_rows_point_at_their_own_category() {
        let db = db().await;
        let mut snapshot = sample();
        snapshot.skills.push(NewSkill { name: "Python".into(), category: "Data".into() });
        snapshot.demand.push(demand("qc", "Python", "Data", 2));
        db.replace_snapshot(&snapshot).await.unwrap();

        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT r.slug, s.name, s.category, d.count
            FROM skill_demand d
            JOIN regions r ON r.id = d.region_id
            JOIN skills s ON s.id = d.skill_id
            ORDER BY d.id
            "#,
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert_eq!(
            rows,
            vec![
                ("qc".into(), "Python".into(), "Programming".into(), 5),
                ("manila".into(), "Python".into(), "Programming".into(), 3),
                ("qc".into(), "Python".into(), "Data".into(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn timestamps_round_trip() {
        let db = db().await;
        db.replace_snapshot(&sample()).await.unwrap();

        let stored: DateTime<Utc> = sqlx::query_scalar("SELECT last_updated FROM skill_demand LIMIT 1")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(stored, ts());
    }
}
