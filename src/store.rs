use async_trait::async_trait;

use crate::{
    error::Result,
    types::{Document, RankedHit},
};

/// The persistent document store, consumed as an external collaborator.
///
/// The engine only reads: nearest-neighbor search for the dense ranker, a
/// full corpus scan for sparse index builds, and batch fetch for result
/// hydration. [`crate::local_store::LocalStore`] is the bundled
/// implementation; production deployments supply their own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Nearest-neighbor search by embedding. Returns up to `limit` hits
    /// scored by cosine similarity, descending.
    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RankedHit>>;

    /// Full corpus scan: `(id, content)` for every stored document.
    async fn scan_content(&self) -> Result<Vec<(String, String)>>;

    /// Batch fetch by id. Order is not guaranteed; missing ids are silently
    /// omitted rather than reported as errors.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<Document>>;
}
