use super::*;
use crate::ingest::content_hash;
use tempfile::TempDir;

fn test_config(temp_dir: &TempDir) -> Config {
    Config {
        base_dir: Some(temp_dir.path().to_path_buf()),
        ..Config::default()
    }
}

fn node(id: &str, document_id: &str, chunk_index: usize, embedding: Vec<f32>) -> Node {
    let text = format!("text of node {id}");
    Node {
        id: id.to_string(),
        document_id: document_id.to_string(),
        chunk_index,
        content_hash: content_hash(&text),
        summary: format!("summary of node {id}"),
        embedding,
        token_count: 12,
        text,
    }
}

#[tokio::test]
async fn opening_a_missing_index_is_unavailable() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let manager = IndexManager::new(&test_config(&temp_dir)).expect("can build manager");

    let loaded = manager
        .try_load(VECTOR_INDEX_ID)
        .await
        .expect("try_load never fails on absence");
    assert!(loaded.is_none());

    let error = manager
        .open(VECTOR_INDEX_ID)
        .await
        .expect_err("open fails on absence");
    match error.downcast_ref::<StudyError>() {
        Some(StudyError::IndexUnavailable(id)) => assert_eq!(id, VECTOR_INDEX_ID),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn first_build_creates_a_fresh_persisted_index() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let manager = IndexManager::new(&test_config(&temp_dir)).expect("can build manager");

    let nodes = vec![
        node("a", "doc1.txt", 0, vec![1.0, 0.0, 0.0, 0.0]),
        node("b", "doc1.txt", 1, vec![0.0, 1.0, 0.0, 0.0]),
    ];
    let index = manager
        .build_or_update(&nodes)
        .await
        .expect("build succeeds");

    let stats = index.stats().await.expect("can read stats");
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.nodes, 2);
    assert_eq!(stats.embeddings, 2);

    let documents = index.documents().await.expect("can list documents");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].file_name, "doc1.txt");

    // The index is durably persisted: a fresh manager can open it.
    let reopened = manager
        .open(VECTOR_INDEX_ID)
        .await
        .expect("persisted index opens");
    assert_eq!(reopened.id(), VECTOR_INDEX_ID);
}

#[tokio::test]
async fn update_is_additive_and_preserves_prior_nodes() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let manager = IndexManager::new(&test_config(&temp_dir)).expect("can build manager");

    manager
        .build_or_update(&[
            node("a", "doc1.txt", 0, vec![1.0, 0.0, 0.0, 0.0]),
            node("b", "doc1.txt", 1, vec![0.0, 1.0, 0.0, 0.0]),
        ])
        .await
        .expect("first build succeeds");

    let index = manager
        .build_or_update(&[node("c", "doc2.txt", 0, vec![0.0, 0.0, 1.0, 0.0])])
        .await
        .expect("second build succeeds");

    let stats = index.stats().await.expect("can read stats");
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.nodes, 3);
    assert_eq!(stats.embeddings, 3);

    let results = index
        .search(&[0.0, 0.0, 1.0, 0.0], 3)
        .await
        .expect("search succeeds");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].node_id, "c");
    assert!(results.iter().any(|r| r.node_id == "a"));
    assert!(results.iter().any(|r| r.node_id == "b"));
}

#[tokio::test]
async fn build_lock_rejects_a_concurrent_build() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = test_config(&temp_dir);
    let manager = IndexManager::new(&config).expect("can build manager");

    let index_dir = config.index_dir().expect("index dir resolves");
    std::fs::create_dir_all(&index_dir).expect("can create index dir");
    std::fs::write(index_dir.join(".index.lock"), "held").expect("can write lock");

    let result = manager
        .build_or_update(&[node("a", "doc1.txt", 0, vec![1.0, 0.0])])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn build_lock_is_released_after_a_successful_build() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let config = test_config(&temp_dir);
    let manager = IndexManager::new(&config).expect("can build manager");

    manager
        .build_or_update(&[node("a", "doc1.txt", 0, vec![1.0, 0.0])])
        .await
        .expect("build succeeds");

    let lock_path = config
        .index_dir()
        .expect("index dir resolves")
        .join(".index.lock");
    assert!(!lock_path.exists());
}
