use std::sync::Arc;

use rankweave::{
    DocumentStore, Embedder, HashingEmbedder, IndexPhase, LocalStore,
    Retriever, RetrieverConfig,
    types::Document,
};
use serde_json::json;
use tempfile::TempDir;

const CORPUS: &[(&str, &str)] = &[
    ("rust", "rust is a systems programming language focused on safety"),
    ("python", "python is an interpreted programming language"),
    ("pasta", "boil the pasta in salted water until al dente"),
    ("garden", "water the garden plants daily in summer"),
];

async fn seeded_retriever() -> (TempDir, Retriever) {
    let tmp = tempfile::tempdir().unwrap();
    let store = LocalStore::open(&tmp.path().join("store.redb")).unwrap();
    let embedder = HashingEmbedder::default();

    let mut entries = Vec::new();
    for (id, content) in CORPUS {
        let embedding = embedder.encode(content).await.unwrap();
        entries.push((
            Document {
                id: id.to_string(),
                content: content.to_string(),
                metadata: json!({"lang": "en"}),
            },
            embedding,
        ));
    }
    store.upsert_batch(&entries).unwrap();

    let retriever = Retriever::new(
        Arc::new(embedder),
        Arc::new(store) as Arc<dyn DocumentStore>,
        RetrieverConfig::default(),
    );
    (tmp, retriever)
}

#[tokio::test]
async fn hybrid_search_surfaces_the_relevant_document_first() {
    let (_tmp, retriever) = seeded_retriever().await;
    retriever.sparse().rebuild_now().await;

    let hits = retriever
        .search("boil pasta in salted water", 3)
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.len() <= 3);
    assert_eq!(hits[0].id, "pasta");
    assert_eq!(hits[0].source_scores.sparse_rank, Some(1));
    assert_eq!(hits[0].metadata["lang"], "en");

    for window in hits.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
}

#[tokio::test]
async fn results_carry_provenance_from_both_rankers() {
    let (_tmp, retriever) = seeded_retriever().await;
    retriever.sparse().rebuild_now().await;

    let hits = retriever
        .search("programming language", 4)
        .await
        .unwrap();

    // Both language documents match the keyword index; the winner must be
    // ranked by at least one side and hydrated with its content.
    assert!(!hits.is_empty());
    let top = &hits[0];
    assert!(
        top.source_scores.dense_rank.is_some()
            || top.source_scores.sparse_rank.is_some()
    );
    assert!(!top.content.is_empty());
}

#[tokio::test]
async fn search_before_first_build_is_dense_only() {
    let (_tmp, retriever) = seeded_retriever().await;

    assert_eq!(retriever.sparse().phase(), IndexPhase::Empty);
    let hits = retriever.search("pasta", 3).await.unwrap();

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.source_scores.sparse_rank.is_none()));
    assert!(hits.iter().all(|h| h.source_scores.dense_rank.is_some()));
}

#[tokio::test]
async fn zero_k_is_rejected() {
    let (_tmp, retriever) = seeded_retriever().await;
    assert!(retriever.search("pasta", 0).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_builds_the_index_in_the_background() {
    let (_tmp, retriever) = seeded_retriever().await;

    assert!(retriever.refresh());

    for _ in 0..200 {
        if retriever.sparse().phase() == IndexPhase::Ready {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(retriever.sparse().phase(), IndexPhase::Ready);

    let hits = retriever.search("salted pasta", 3).await.unwrap();
    assert!(hits.iter().any(|h| h.source_scores.sparse_rank.is_some()));
}

#[tokio::test]
async fn persisted_index_is_ready_for_the_next_retriever() {
    let tmp = tempfile::tempdir().unwrap();
    let store_path = tmp.path().join("store.redb");
    let index_dir = tmp.path().join("index");
    let embedder = HashingEmbedder::default();

    let store = LocalStore::open(&store_path).unwrap();
    let mut entries = Vec::new();
    for (id, content) in CORPUS {
        let embedding = embedder.encode(content).await.unwrap();
        entries.push((
            Document {
                id: id.to_string(),
                content: content.to_string(),
                metadata: json!({}),
            },
            embedding,
        ));
    }
    store.upsert_batch(&entries).unwrap();

    {
        let retriever = Retriever::with_index_dir(
            Arc::new(embedder.clone()),
            Arc::new(store) as Arc<dyn DocumentStore>,
            RetrieverConfig::default(),
            index_dir.clone(),
        );
        retriever.sparse().rebuild_now().await;
    }

    // A second retriever over the same data directory serves the persisted
    // index immediately, without another build.
    let store = LocalStore::open(&store_path).unwrap();
    let retriever = Retriever::with_index_dir(
        Arc::new(embedder),
        Arc::new(store) as Arc<dyn DocumentStore>,
        RetrieverConfig::default(),
        index_dir,
    );
    assert_eq!(retriever.sparse().phase(), IndexPhase::Ready);

    let hits = retriever
        .search("boil pasta in salted water", 3)
        .await
        .unwrap();
    assert_eq!(hits[0].id, "pasta");
    assert_eq!(hits[0].source_scores.sparse_rank, Some(1));
}

#[tokio::test]
async fn repeated_searches_are_deterministic() {
    let (_tmp, retriever) = seeded_retriever().await;
    retriever.sparse().rebuild_now().await;

    let first = retriever.search("garden water", 4).await.unwrap();
    let second = retriever.search("garden water", 4).await.unwrap();
    assert_eq!(first, second);
}
