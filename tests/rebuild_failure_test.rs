mod helpers;

use std::sync::Arc;
use std::time::Duration;

use roster::config::SearchConfig;
use roster::error::SearchError;
use roster::search::{IndexEntry, SearchService, VectorIndex};
use tokio_util::sync::CancellationToken;

fn people() -> Vec<IndexEntry> {
    vec![
        IndexEntry::new(1, "Alice Springfield"),
        IndexEntry::new(2, "Bob capital city"),
    ]
}

#[tokio::test]
async fn embedding_failure_keeps_previous_generation() {
    let embedder = Arc::new(helpers::FailingEmbedder::new(2));
    let index = VectorIndex::new(embedder.clone(), 1);
    let cancel = CancellationToken::new();

    // Two batches of one: both succeed
    index.rebuild(people(), &cancel).await.unwrap();
    let before = index.status();
    assert_eq!(before.generation, 1);

    let err = index
        .rebuild(vec![IndexEntry::new(9, "Zed")], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::Embedding(_)));
    assert_eq!(embedder.batches(), 3);

    let after = index.status();
    assert_eq!(after.generation, before.generation);
    assert_eq!(after.entries, 2);
    assert_eq!(index.query("Alice", 1).await.unwrap(), vec![1]);
}

#[tokio::test]
async fn failure_partway_through_discards_partial_work() {
    let embedder = Arc::new(helpers::FailingEmbedder::new(3));
    let index = VectorIndex::new(embedder.clone(), 1);
    let cancel = CancellationToken::new();
    index.rebuild(people(), &cancel).await.unwrap();

    // Third batch overall is the first of this rebuild and succeeds; the second fails
    let more = vec![
        IndexEntry::new(3, "Carol"),
        IndexEntry::new(4, "Dave"),
        IndexEntry::new(5, "Zed"),
    ];
    assert!(index.rebuild(more, &cancel).await.is_err());
    assert_eq!(embedder.batches(), 4);
    assert_eq!(index.status().entries, 2);
    assert_eq!(index.query("Carol", 5).await.unwrap().len(), 2);
}

#[tokio::test]
async fn cancelled_rebuild_keeps_previous_generation() {
    let mut conn = helpers::test_db();
    helpers::seed_employees(&mut conn);
    let service = SearchService::with_embedder(
        helpers::hashing_embedder(),
        helpers::shared(conn),
        SearchConfig::default(),
    );
    service
        .rebuild_from_store(&CancellationToken::new())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = service.rebuild_from_store(&cancel).await.unwrap_err();
    assert!(matches!(err, SearchError::Cancelled));

    let status = service.status().unwrap();
    assert_eq!(status.generation, 1);
    assert_eq!(status.entries, 3);
}

#[tokio::test]
async fn abandoned_rebuild_releases_the_writer() {
    let index = Arc::new(VectorIndex::new(
        Arc::new(helpers::SlowEmbedder::new(Duration::from_millis(50))),
        1,
    ));
    let cancel = CancellationToken::new();
    index.rebuild(people(), &cancel).await.unwrap();

    let many: Vec<IndexEntry> = (10..30)
        .map(|id| IndexEntry::new(id, format!("worker {id}")))
        .collect();
    let outcome = tokio::time::timeout(Duration::from_millis(120), index.rebuild(many, &cancel)).await;
    assert!(outcome.is_err(), "rebuild should still be running at the deadline");
    assert_eq!(index.status().generation, 1);
    assert_eq!(index.status().entries, 2);

    // A later rebuild is not blocked by the abandoned one
    let report = index.rebuild(people(), &cancel).await.unwrap();
    assert_eq!(report.generation, 2);
}
