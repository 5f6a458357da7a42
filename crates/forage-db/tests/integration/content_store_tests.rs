use forage_core::models::{NewContentItem, SourceType, compute_hash};
use forage_core::traits::ContentStore;
use forage_db::ContentRepository;

use crate::common::setup_test_db;

fn sample_item(body: &str) -> NewContentItem {
    NewContentItem {
        source_id: "https://letters.example/weekly".into(),
        source_type: SourceType::Newsletter,
        title: "Weekly Dispatch".into(),
        body: body.to_string(),
        url: "https://letters.example/weekly".into(),
        published_at: None,
        content_hash: compute_hash(body),
    }
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn save_and_find_by_hash() {
    let (pool, _container) = setup_test_db().await;
    let repo = ContentRepository::new(pool);

    let item = sample_item("this week in collection resilience");
    let id = repo.save(&item).await.unwrap();
    assert!(!id.is_nil());

    let found = repo
        .find_by_hash(&item.content_hash)
        .await
        .unwrap()
        .expect("Should find the saved item");

    assert_eq!(found.id, id);
    assert_eq!(found.title, "Weekly Dispatch");
    assert_eq!(found.source_type, SourceType::Newsletter);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn find_by_hash_misses_on_unknown_hash() {
    let (pool, _container) = setup_test_db().await;
    let repo = ContentRepository::new(pool);

    repo.save(&sample_item("some body")).await.unwrap();

    let missing = repo.find_by_hash(&compute_hash("other body")).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn list_recent_returns_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = ContentRepository::new(pool);

    repo.save(&sample_item("first issue")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    repo.save(&sample_item("second issue")).await.unwrap();

    let recent = repo.list_recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].body, "second issue");
    assert_eq!(recent[1].body, "first issue");
}
