use super::*;
use tempfile::TempDir;

fn record(id: &str, vector: Vec<f32>, document_id: &str, chunk_index: u32) -> NodeEmbedding {
    NodeEmbedding {
        id: id.to_string(),
        vector,
        payload: NodePayload {
            document_id: document_id.to_string(),
            chunk_index,
            content_hash: format!("hash-{id}"),
            text: format!("text of {id}"),
            summary: format!("summary of {id}"),
            token_count: 10,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        },
    }
}

#[tokio::test]
async fn table_is_absent_until_first_insert() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let store = VectorStore::open(temp_dir.path(), "vector")
        .await
        .expect("can open store");

    assert!(!store.table_exists().await.expect("can check table"));
    assert_eq!(store.count().await.expect("can count"), 0);
}

#[tokio::test]
async fn insert_and_search_round_trip() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "vector")
        .await
        .expect("can open store");

    store
        .insert_batch(&[
            record("a", vec![1.0, 0.0, 0.0, 0.0], "doc1", 0),
            record("b", vec![0.0, 1.0, 0.0, 0.0], "doc1", 1),
        ])
        .await
        .expect("can insert batch");

    assert!(store.table_exists().await.expect("can check table"));
    assert_eq!(store.count().await.expect("can count"), 2);

    let results = store
        .search(&[0.9, 0.1, 0.0, 0.0], 1)
        .await
        .expect("search succeeds");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].node_id, "a");
    assert_eq!(results[0].payload.document_id, "doc1");
    assert_eq!(results[0].payload.text, "text of a");
}

#[tokio::test]
async fn updates_are_additive() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "vector")
        .await
        .expect("can open store");

    store
        .insert_batch(&[
            record("a", vec![1.0, 0.0, 0.0, 0.0], "doc1", 0),
            record("b", vec![0.0, 1.0, 0.0, 0.0], "doc1", 1),
        ])
        .await
        .expect("can insert first batch");

    // Reopen to mimic a later run updating the same persisted index.
    let mut store = VectorStore::open(temp_dir.path(), "vector")
        .await
        .expect("can reopen store");
    store
        .insert_batch(&[record("c", vec![0.0, 0.0, 1.0, 0.0], "doc2", 0)])
        .await
        .expect("can insert second batch");

    assert_eq!(store.count().await.expect("can count"), 3);

    // All three nodes stay retrievable; none of the prior data is lost.
    let results = store
        .search(&[0.0, 0.0, 1.0, 0.0], 3)
        .await
        .expect("search succeeds");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].node_id, "c");

    let all_ids: Vec<_> = results.iter().map(|r| r.node_id.as_str()).collect();
    assert!(all_ids.contains(&"a"));
    assert!(all_ids.contains(&"b"));
}

#[tokio::test]
async fn mismatched_dimensions_are_rejected() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "vector")
        .await
        .expect("can open store");

    store
        .insert_batch(&[record("a", vec![1.0, 0.0, 0.0, 0.0], "doc1", 0)])
        .await
        .expect("can insert batch");

    let result = store
        .insert_batch(&[record("bad", vec![1.0, 0.0], "doc1", 1)])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn stores_for_different_index_ids_are_independent() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    let mut store = VectorStore::open(temp_dir.path(), "vector")
        .await
        .expect("can open store");
    store
        .insert_batch(&[record("a", vec![1.0, 0.0, 0.0, 0.0], "doc1", 0)])
        .await
        .expect("can insert batch");

    let other = VectorStore::open(temp_dir.path(), "other")
        .await
        .expect("can open second store");
    assert!(!other.table_exists().await.expect("can check table"));
}
