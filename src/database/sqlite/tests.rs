use super::*;
use tempfile::TempDir;

async fn test_database() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let database = Database::new(temp_dir.path().join("catalog.db"))
        .await
        .expect("can create database");
    (database, temp_dir)
}

#[tokio::test]
async fn missing_index_is_none_not_an_error() {
    let (database, _temp_dir) = test_database().await;

    let record = database
        .get_index("vector")
        .await
        .expect("lookup succeeds");
    assert!(record.is_none());
}

#[tokio::test]
async fn index_lifecycle() {
    let (database, _temp_dir) = test_database().await;

    let created = database
        .create_index("vector")
        .await
        .expect("can create index record");
    assert_eq!(created.id, "vector");

    let loaded = database
        .get_index("vector")
        .await
        .expect("lookup succeeds")
        .expect("index record exists");
    assert_eq!(loaded, created);

    database
        .touch_index("vector")
        .await
        .expect("can touch index record");
    let touched = database
        .get_index("vector")
        .await
        .expect("lookup succeeds")
        .expect("index record exists");
    assert!(touched.updated_at >= created.updated_at);
}

#[tokio::test]
async fn document_upsert_is_idempotent() {
    let (database, _temp_dir) = test_database().await;

    let new_document = NewDocument {
        id: "notes.txt".to_string(),
        file_name: "notes.txt".to_string(),
    };

    database
        .upsert_document(new_document.clone())
        .await
        .expect("first upsert succeeds");
    database
        .upsert_document(new_document)
        .await
        .expect("second upsert succeeds");

    assert_eq!(
        database.count_documents().await.expect("can count"),
        1
    );
}

#[tokio::test]
async fn nodes_map_back_to_their_document() {
    let (database, _temp_dir) = test_database().await;

    database
        .create_index("vector")
        .await
        .expect("can create index record");
    database
        .upsert_document(NewDocument {
            id: "notes.txt".to_string(),
            file_name: "notes.txt".to_string(),
        })
        .await
        .expect("can upsert document");

    for chunk_index in 0..3i64 {
        database
            .insert_node(NewNode {
                id: format!("node-{chunk_index}"),
                index_id: "vector".to_string(),
                document_id: "notes.txt".to_string(),
                chunk_index,
                content_hash: format!("hash-{chunk_index}"),
                token_count: 100,
                summary: "a summary".to_string(),
            })
            .await
            .expect("can insert node");
    }

    let nodes = database
        .nodes_for_document("notes.txt")
        .await
        .expect("can list nodes");
    assert_eq!(nodes.len(), 3);
    assert!(nodes.windows(2).all(|w| w[0].chunk_index < w[1].chunk_index));

    assert_eq!(
        database.count_nodes("vector").await.expect("can count"),
        3
    );
}
