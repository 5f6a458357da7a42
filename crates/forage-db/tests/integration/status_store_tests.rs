use chrono::{TimeDelta, Utc};
use forage_core::models::{SourceStatus, SourceType};
use forage_core::traits::StatusStore;
use forage_db::SourceStatusRepository;

use crate::common::setup_test_db;

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn upsert_and_get_roundtrip() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceStatusRepository::new(pool);

    let status = SourceStatus::new("https://letters.example/weekly", SourceType::Newsletter);
    repo.upsert(&status).await.unwrap();

    let fetched = repo
        .get("https://letters.example/weekly")
        .await
        .unwrap()
        .expect("Should find the status record");

    assert_eq!(fetched.source_id, "https://letters.example/weekly");
    assert_eq!(fetched.source_type, SourceType::Newsletter);
    assert_eq!(fetched.consecutive_failures, 0);
    assert!(fetched.last_error.is_none());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn get_returns_none_for_unknown_source() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceStatusRepository::new(pool);

    assert!(repo.get("https://nowhere.example").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn upsert_updates_existing_record_in_place() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceStatusRepository::new(pool);

    let mut status = SourceStatus::new("https://videos.example/v", SourceType::VideoChannel);
    repo.upsert(&status).await.unwrap();

    let now = Utc::now();
    status.consecutive_failures = 3;
    status.last_error = Some("read timeout".into());
    status.last_error_at = Some(now);
    status.last_collected_at = Some(now);
    repo.upsert(&status).await.unwrap();

    let all = repo.get_all().await.unwrap();
    assert_eq!(all.len(), 1, "upsert must not create a second row");

    let fetched = &all[0];
    assert_eq!(fetched.consecutive_failures, 3);
    assert_eq!(fetched.last_error.as_deref(), Some("read timeout"));
    let stored_at = fetched.last_error_at.unwrap();
    assert!((stored_at - now).abs() < TimeDelta::seconds(1));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn get_all_orders_by_type_then_id() {
    let (pool, _container) = setup_test_db().await;
    let repo = SourceStatusRepository::new(pool);

    for (id, kind) in [
        ("https://videos.example/b", SourceType::VideoChannel),
        ("https://letters.example/b", SourceType::Newsletter),
        ("https://letters.example/a", SourceType::Newsletter),
    ] {
        repo.upsert(&SourceStatus::new(id, kind)).await.unwrap();
    }

    let ids: Vec<String> = repo
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.source_id)
        .collect();

    assert_eq!(
        ids,
        vec![
            "https://letters.example/a",
            "https://letters.example/b",
            "https://videos.example/b",
        ]
    );
}
