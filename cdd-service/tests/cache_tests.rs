//! Refresh, fallback and scheduling tests against real sources and stores

mod common;

use cdd_service::cache::{CacheSettings, PersistentStore, RefreshOutcome, RefreshableCache};
use cdd_service::notify::AlertNotifier;
use cdd_service::scheduler::{RefreshScheduler, TickOutcome};
use cdd_service::search::{DistanceCache, SearchQuery, SearchService};
use cdd_service::source::FileSource;
use common::{fixture_path, SwitchableSource};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_file_source_edits_picked_up_on_refresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dictionary.json");
    std::fs::copy(fixture_path(), &path).unwrap();

    let cache = RefreshableCache::new(
        Arc::new(FileSource::new(&path)),
        CacheSettings::default(),
    );
    cache.refresh(false).await.unwrap();
    assert_eq!(cache.snapshot().await.unwrap().attributes().len(), 5);

    std::fs::write(
        &path,
        r#"{"attributes": [{"column_header": "AGE", "display_name": "Age",
            "description": "Age", "datatype": "NUMBER",
            "attribute_type": "PATIENT", "priority": "1"}]}"#,
    )
    .unwrap();
    cache.refresh(false).await.unwrap();

    let snapshot = cache.snapshot().await.unwrap();
    assert_eq!(snapshot.attributes().len(), 1);
    assert!(snapshot.overrides().is_empty());
}

#[tokio::test]
async fn test_persistent_store_survives_restart() {
    let dir = TempDir::new().unwrap();

    // First run: source up, data persisted
    {
        let cache = RefreshableCache::new(
            Arc::new(SwitchableSource::new()),
            CacheSettings::default(),
        )
        .with_persistent_store(PersistentStore::open(dir.path()).await.unwrap());
        assert_eq!(
            cache.refresh(false).await.unwrap(),
            RefreshOutcome::Refreshed
        );
    }

    // Second run: source down from the start
    let source = Arc::new(SwitchableSource::new());
    source.set_failing(true);
    let cache = RefreshableCache::new(source, CacheSettings::default())
        .with_persistent_store(PersistentStore::open(dir.path()).await.unwrap());

    assert_eq!(
        cache.refresh(true).await.unwrap(),
        RefreshOutcome::RestoredFromBackup
    );
    let snapshot = cache.snapshot().await.unwrap();
    assert_eq!(snapshot.attributes().len(), 5);
    assert_eq!(
        snapshot.policy("test_override_study").unwrap()["DISEASE_STAGE"].priority(),
        "10"
    );
    assert!(cache.status().await.stale);
}

#[tokio::test]
async fn test_scheduler_recovers_after_outage() {
    let source = Arc::new(SwitchableSource::new());
    source.set_failing(true);
    let cache = Arc::new(RefreshableCache::new(
        source.clone(),
        CacheSettings {
            failure_threshold: 1,
            ..CacheSettings::default()
        },
    ));
    let scheduler = RefreshScheduler::new(
        cache.clone(),
        Arc::new(DistanceCache::new()),
        Arc::new(AlertNotifier::disabled()),
        Duration::from_secs(300),
    );

    assert_eq!(scheduler.tick().await, TickOutcome::Failed);
    assert!(cache.get().await.is_none());

    source.set_failing(false);
    assert_eq!(
        scheduler.tick().await,
        TickOutcome::Refreshed(RefreshOutcome::Refreshed)
    );
    assert_eq!(scheduler.tick().await, TickOutcome::Skipped);
}

#[tokio::test]
async fn test_scheduler_prunes_search_distances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dictionary.json");
    std::fs::copy(fixture_path(), &path).unwrap();

    let cache = Arc::new(RefreshableCache::new(
        Arc::new(FileSource::new(&path)),
        CacheSettings {
            max_age: Duration::ZERO,
            ..CacheSettings::default()
        },
    ));
    let distances = Arc::new(DistanceCache::new());
    let search = SearchService::new(cache.clone(), distances.clone());
    let scheduler = RefreshScheduler::new(
        cache.clone(),
        distances.clone(),
        Arc::new(AlertNotifier::disabled()),
        Duration::from_secs(300),
    );

    scheduler.tick().await;
    search
        .search(&SearchQuery {
            terms: vec!["Stage".to_string()],
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert!(distances.cached("CLIN_M_STAGE", "stage").await.is_some());

    // CLIN_M_STAGE disappears from the dictionary
    std::fs::write(
        &path,
        r#"{"attributes": [{"column_header": "DISEASE_STAGE", "display_name": "Disease Stage",
            "description": "Disease Stage", "datatype": "STRING",
            "attribute_type": "SAMPLE", "priority": "1"}]}"#,
    )
    .unwrap();
    // max_age of zero keeps the cache permanently due for refresh
    assert_eq!(
        scheduler.tick().await,
        TickOutcome::Refreshed(RefreshOutcome::Refreshed)
    );

    assert_eq!(distances.cached("CLIN_M_STAGE", "stage").await, None);
    assert_eq!(distances.cached("DISEASE_STAGE", "stage").await, Some(36));
}
