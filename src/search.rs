use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tracing::{debug, warn};

use crate::{
    config::RetrieverConfig,
    dense::DenseRanker,
    embedder::Embedder,
    error::{Error, Result},
    fuse::RrfFuser,
    sparse::SparseRanker,
    store::DocumentStore,
    types::{Document, SearchHit, SearchRequest, SearchResponse},
};

/// The public entry point of the retrieval engine.
///
/// A search fans the query out to the dense and sparse rankers concurrently,
/// fuses their candidate lists by reciprocal rank, hydrates the winners from
/// the document store in one batch, and returns them in fused order with
/// per-source provenance.
pub struct Retriever {
    dense: DenseRanker,
    sparse: Arc<SparseRanker>,
    store: Arc<dyn DocumentStore>,
    fuser: RrfFuser,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: RetrieverConfig,
    ) -> Self {
        let sparse = Arc::new(SparseRanker::new(Arc::clone(&store)));
        Self::assemble(embedder, store, config, sparse)
    }

    /// Variant whose sparse index is persisted under `index_dir`, so a
    /// rebuild outlives the process and a later one can serve the index
    /// without building it again.
    pub fn with_index_dir(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: RetrieverConfig,
        index_dir: PathBuf,
    ) -> Self {
        let sparse = Arc::new(SparseRanker::with_index_dir(
            Arc::clone(&store),
            index_dir,
        ));
        Self::assemble(embedder, store, config, sparse)
    }

    fn assemble(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        config: RetrieverConfig,
        sparse: Arc<SparseRanker>,
    ) -> Self {
        let dense = DenseRanker::new(
            embedder,
            Arc::clone(&store),
            config.upstream_timeout,
        );
        let fuser = RrfFuser::new(config.rrf_k);
        Self {
            dense,
            sparse,
            store,
            fuser,
            config,
        }
    }

    /// The sparse ranker, exposed for lifecycle control and diagnostics.
    pub fn sparse(&self) -> &Arc<SparseRanker> {
        &self.sparse
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Schedule a sparse index rebuild and return immediately. The return
    /// value only acknowledges scheduling: false means the trigger was
    /// coalesced into a build already in flight. Completion is observable
    /// through logs and subsequent searches, never reported back.
    pub fn refresh(&self) -> bool {
        self.sparse.trigger_rebuild()
    }

    /// Retrieve the top `k` documents for `query`.
    ///
    /// Both rankers returning nothing is a valid empty answer, not an
    /// error. A document store failure during the final hydration step is a
    /// hard error: once fusion has committed to a winner set there is no
    /// meaningful partial answer.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "k must be a positive integer".into(),
            ));
        }

        let candidate_k = k.saturating_mul(self.config.candidate_multiplier.max(1));
        let (dense_hits, sparse_hits) = tokio::join!(
            self.dense.search(query, candidate_k),
            async { self.sparse.search(query, candidate_k) },
        );
        debug!(
            dense = dense_hits.len(),
            sparse = sparse_hits.len(),
            "candidate lists ready"
        );

        let fused = self.fuser.merge(&dense_hits, &sparse_hits, k);
        if fused.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = fused.iter().map(|f| f.id.clone()).collect();
        let documents = self.store.fetch(&ids).await?;
        let mut by_id: HashMap<String, Document> = documents
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect();

        // The batch fetch is unordered and keyed; re-walk the fused id
        // sequence to restore ranking order.
        let mut hits = Vec::with_capacity(fused.len());
        for result in fused {
            match by_id.remove(&result.id) {
                Some(doc) => hits.push(SearchHit {
                    id: doc.id,
                    content: doc.content,
                    metadata: doc.metadata,
                    score: result.fused_score,
                    source_scores: result.provenance,
                }),
                None => {
                    warn!(id = %result.id, "fused document missing from store, dropping");
                }
            }
        }
        Ok(hits)
    }

    /// Serve the external request shape.
    pub async fn handle(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        let results = self.search(&request.query, request.k).await?;
        Ok(SearchResponse {
            query: request.query.clone(),
            results,
        })
    }
}
