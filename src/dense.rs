use std::{sync::Arc, time::Duration};

use tracing::warn;

use crate::{embedder::Embedder, store::DocumentStore, types::RankedHit};

/// Semantic ranker: embeds the query and runs nearest-neighbor search
/// against the document store.
///
/// Owns no mutable state, only handles to the embedding oracle and the
/// store. Upstream failures and timeouts are local, recoverable errors: the
/// ranker logs a warning and returns no candidates, letting the overall
/// search degrade to sparse-only instead of failing.
pub struct DenseRanker {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl DenseRanker {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            embedder,
            store,
            timeout,
        }
    }

    /// Return up to `k` hits ordered by descending cosine similarity.
    pub async fn search(&self, query: &str, k: usize) -> Vec<RankedHit> {
        if k == 0 {
            return Vec::new();
        }

        let embedding = match tokio::time::timeout(
            self.timeout,
            self.embedder.encode(query),
        )
        .await
        {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(e)) => {
                warn!(error = %e, "query embedding failed, dense ranker returns no candidates");
                return Vec::new();
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "embedding oracle timed out");
                return Vec::new();
            }
        };

        match tokio::time::timeout(
            self.timeout,
            self.store.similarity_search(&embedding, k),
        )
        .await
        {
            Ok(Ok(mut hits)) => {
                hits.truncate(k);
                hits
            }
            Ok(Err(e)) => {
                warn!(error = %e, "similarity search failed, dense ranker returns no candidates");
                Vec::new()
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "similarity search timed out");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::{Error, Result},
        types::Document,
    };

    struct FixedStore {
        hits: Vec<RankedHit>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl DocumentStore for FixedStore {
        async fn similarity_search(
            &self,
            _embedding: &[f32],
            limit: usize,
        ) -> Result<Vec<RankedHit>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(Error::Store("connection refused".into()));
            }
            let mut hits = self.hits.clone();
            hits.truncate(limit);
            Ok(hits)
        }

        async fn scan_content(&self) -> Result<Vec<(String, String)>> {
            Ok(Vec::new())
        }

        async fn fetch(&self, _ids: &[String]) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::Embedding("model unavailable".into()))
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl Embedder for UnitEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn ranker(store: FixedStore, embedder: Arc<dyn Embedder>) -> DenseRanker {
        DenseRanker::new(embedder, Arc::new(store), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn returns_store_hits_in_order() {
        let store = FixedStore {
            hits: vec![RankedHit::new("a", 0.9), RankedHit::new("b", 0.5)],
            fail: false,
            delay: None,
        };
        let ranker = ranker(store, Arc::new(UnitEmbedder));

        let hits = ranker.search("query", 10).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_empty() {
        let store = FixedStore {
            hits: vec![RankedHit::new("a", 0.9)],
            fail: false,
            delay: None,
        };
        let ranker = ranker(store, Arc::new(FailingEmbedder));

        assert!(ranker.search("query", 10).await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty() {
        let store = FixedStore {
            hits: Vec::new(),
            fail: true,
            delay: None,
        };
        let ranker = ranker(store, Arc::new(UnitEmbedder));

        assert!(ranker.search("query", 10).await.is_empty());
    }

    #[tokio::test]
    async fn slow_store_times_out_to_empty() {
        let store = FixedStore {
            hits: vec![RankedHit::new("a", 0.9)],
            fail: false,
            delay: Some(Duration::from_secs(5)),
        };
        let ranker = ranker(store, Arc::new(UnitEmbedder));

        assert!(ranker.search("query", 10).await.is_empty());
    }

    #[tokio::test]
    async fn zero_k_short_circuits() {
        let store = FixedStore {
            hits: vec![RankedHit::new("a", 0.9)],
            fail: false,
            delay: None,
        };
        let ranker = ranker(store, Arc::new(UnitEmbedder));

        assert!(ranker.search("query", 0).await.is_empty());
    }
}
