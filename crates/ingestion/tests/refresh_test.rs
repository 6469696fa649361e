//! Integration tests for the refresh cycle.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use skillgap_db::snapshot::{NewDemand, NewRegion, NewSkill, SnapshotCounts};
    use skillgap_db::{DbPool, Snapshot};
    use skillgap_ingestion::{
        RefreshCoordinator, RefreshError, RefreshMode, ScrapeError, ScrapeResult, Scraper,
    };
    use skillgap_telemetry::Metrics;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn snapshot(slugs: &[&str], count: u32) -> Snapshot {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        Snapshot {
            regions: slugs
                .iter()
                .map(|s| NewRegion { name: s.to_uppercase(), slug: s.to_string() })
                .collect(),
            skills: vec![NewSkill { name: "Python".into(), category: "Programming".into() }],
            demand: slugs
                .iter()
                .map(|s| NewDemand {
                    region_slug: s.to_string(),
                    skill_name: "Python".into(),
                    category: "Programming".into(),
                    count,
                    last_updated: ts,
                })
                .collect(),
        }
    }

    enum Behavior {
        Succeed(Snapshot),
        Fail,
        Hang,
        Gate { entered: Arc<Notify>, release: Arc<Notify>, snapshot: Snapshot },
    }

    struct FakeScraper(Behavior);

    #[async_trait]
    impl Scraper for FakeScraper {
        fn name(&self) -> &str {
            "fake"
        }

        async fn collect(&self) -> ScrapeResult<Snapshot> {
            match &self.0 {
                Behavior::Succeed(snapshot) => Ok(snapshot.clone()),
                Behavior::Fail => Err(ScrapeError::Status(503)),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Snapshot::default())
                }
                Behavior::Gate { entered, release, snapshot } => {
                    entered.notify_one();
                    release.notified().await;
                    Ok(snapshot.clone())
                }
            }
        }
    }

    async fn seeded_db() -> DbPool {
        let db = DbPool::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.replace_snapshot(&snapshot(&["qc", "manila"], 4)).await.unwrap();
        db
    }

    fn coordinator(db: &DbPool, behavior: Behavior, mode: RefreshMode) -> RefreshCoordinator {
        RefreshCoordinator::new(db.clone(), Arc::new(FakeScraper(behavior)), Metrics::new().unwrap())
            .with_mode(mode)
    }

    #[tokio::test]
    async fn staged_refresh_replaces_snapshot() {
        let db = seeded_db().await;
        let coordinator = coordinator(
            &db,
            Behavior::Succeed(snapshot(&["pasig", "taguig", "makati"], 2)),
            RefreshMode::Staged,
        );

        let outcome = coordinator.refresh().await.unwrap();
        assert_eq!(outcome.counts, SnapshotCounts { regions: 3, skills: 1, demand_rows: 3 });
        assert_eq!(db.snapshot_counts().await.unwrap(), outcome.counts);

        let run = db.last_refresh_run().await.unwrap().unwrap();
        assert_eq!(run.status, "succeeded");
        assert_eq!(run.mode, "staged");
    }

    #[tokio::test]
    async fn staged_failure_keeps_previous_snapshot() {
        let db = seeded_db().await;
        let coordinator = coordinator(&db, Behavior::Fail, RefreshMode::Staged);

        let result = coordinator.refresh().await;
        assert!(matches!(result, Err(RefreshError::Scrape(_))));
        assert_eq!(db.snapshot_counts().await.unwrap().regions, 2);

        let run = db.last_refresh_run().await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert!(run.message.unwrap().contains("previous snapshot kept"));
    }

    #[tokio::test]
    async fn staged_invalid_snapshot_keeps_previous_snapshot() {
        let db = seeded_db().await;
        let mut broken = snapshot(&["pasig"], 1);
        broken.demand[0].region_slug = "nowhere".into();
        let coordinator = coordinator(&db, Behavior::Succeed(broken), RefreshMode::Staged);

        assert!(matches!(coordinator.refresh().await, Err(RefreshError::Store(_))));
        assert_eq!(db.snapshot_counts().await.unwrap().demand_rows, 2);
    }

    #[tokio::test]
    async fn in_place_failure_leaves_store_empty() {
        let db = seeded_db().await;
        let coordinator = coordinator(&db, Behavior::Fail, RefreshMode::InPlace);

        assert!(coordinator.refresh().await.is_err());
        assert_eq!(db.snapshot_counts().await.unwrap(), SnapshotCounts::default());

        let run = db.last_refresh_run().await.unwrap().unwrap();
        assert!(run.message.unwrap().contains("store left empty"));
    }

    #[tokio::test]
    async fn in_place_clear_failure_keeps_previous_snapshot() {
        let db = seeded_db().await;
        sqlx::query("DROP TABLE skill_demand")
            .execute(db.pool())
            .await
            .unwrap();
        let coordinator = coordinator(
            &db,
            Behavior::Succeed(snapshot(&["pasig"], 1)),
            RefreshMode::InPlace,
        );

        assert!(matches!(coordinator.refresh().await, Err(RefreshError::Store(_))));

        let regions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM regions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(regions, 2);

        let message = db.last_refresh_run().await.unwrap().unwrap().message.unwrap();
        assert!(message.contains("previous snapshot kept"), "{message}");
        assert!(!message.contains("left empty"), "{message}");
    }

    #[tokio::test]
    async fn in_place_success_repopulates() {
        let db = seeded_db().await;
        let coordinator = coordinator(
            &db,
            Behavior::Succeed(snapshot(&["pasig"], 9)),
            RefreshMode::InPlace,
        );

        coordinator.refresh().await.unwrap();
        assert_eq!(
            db.snapshot_counts().await.unwrap(),
            SnapshotCounts { regions: 1, skills: 1, demand_rows: 1 }
        );
    }

    #[tokio::test]
    async fn slow_scrape_times_out() {
        let db = seeded_db().await;
        let coordinator = coordinator(&db, Behavior::Hang, RefreshMode::Staged)
            .with_scrape_timeout(Duration::from_millis(20));

        assert!(matches!(coordinator.refresh().await, Err(RefreshError::Timeout(_))));
        assert_eq!(db.snapshot_counts().await.unwrap().regions, 2);
    }

    #[tokio::test]
    async fn concurrent_refresh_is_rejected() {
        let db = seeded_db().await;
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let coordinator = Arc::new(coordinator(
            &db,
            Behavior::Gate {
                entered: entered.clone(),
                release: release.clone(),
                snapshot: snapshot(&["pasig"], 1),
            },
            RefreshMode::Staged,
        ));

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        entered.notified().await;

        assert!(matches!(coordinator.refresh().await, Err(RefreshError::InProgress)));

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn refresh_from_sample_csv() {
        let db = seeded_db().await;
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/skill_demand_sample.csv");
        let coordinator = RefreshCoordinator::new(
            db.clone(),
            Arc::new(skillgap_ingestion::CsvScraper::new(path)),
            Metrics::new().unwrap(),
        );

        let outcome = coordinator.refresh().await.unwrap();
        assert_eq!(outcome.counts, SnapshotCounts { regions: 7, skills: 6, demand_rows: 14 });
    }

    #[tokio::test]
    async fn csv_skill_in_two_categories_keeps_both() {
        let db = seeded_db().await;
        let path = std::env::temp_dir()
            .join(format!("skillgap-refresh-categories-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "region,slug,skill,category,count\nManila,manila,Excel,Office,5\nManila,manila,Excel,Data,3\n",
        )
        .unwrap();

        let coordinator = RefreshCoordinator::new(
            db.clone(),
            Arc::new(skillgap_ingestion::CsvScraper::new(&path)),
            Metrics::new().unwrap(),
        );
        let outcome = coordinator.refresh().await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(outcome.counts, SnapshotCounts { regions: 1, skills: 2, demand_rows: 2 });

        let stored: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT s.name, s.category, d.count
            FROM skill_demand d
            JOIN skills s ON s.id = d.skill_id
            ORDER BY d.id
            "#,
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(
            stored,
            vec![
                ("Excel".to_string(), "Office".to_string(), 5),
                ("Excel".to_string(), "Data".to_string(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn audit_line_is_written() {
        let db = seeded_db().await;
        let path = std::env::temp_dir().join(format!("skillgap-refresh-audit-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let coordinator = coordinator(&db, Behavior::Succeed(snapshot(&["pasig"], 1)), RefreshMode::Staged)
            .with_sample_output(Some(path.to_string_lossy().into_owned()));
        coordinator.refresh().await.unwrap();

        let line: serde_json::Value =
            serde_json::from_str(std::fs::read_to_string(&path).unwrap().trim()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(line["success"], true);
        assert_eq!(line["mode"], "staged");
        assert_eq!(line["demandRows"], 1);
    }
}
