use std::path::Path;

use async_trait::async_trait;
use rayon::prelude::*;
use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    store::DocumentStore,
    types::{Document, RankedHit},
};

const DOCUMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("documents");
const EMBEDDINGS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("embeddings");

/// On-disk record for a document, minus its embedding. Embeddings live in
/// their own table as raw f32 little-endian bytes.
#[derive(Serialize, Deserialize)]
struct StoredDocument {
    content: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

/// A redb-backed [`DocumentStore`] for local experiments and tests.
///
/// Similarity search is a brute-force cosine scan over every stored vector,
/// parallelized across documents. Fine for corpora that fit comfortably in
/// memory; anything larger belongs in a real vector store behind the same
/// trait.
pub struct LocalStore {
    db: Database,
}

impl LocalStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or replace a document and its embedding.
    pub fn upsert(&self, document: &Document, embedding: &[f32]) -> Result<()> {
        self.upsert_batch(std::slice::from_ref(&(
            document.clone(),
            embedding.to_vec(),
        )))
    }

    /// Insert or replace a batch of documents in a single transaction.
    pub fn upsert_batch(&self, entries: &[(Document, Vec<f32>)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write()?;
        {
            let mut docs = txn.open_table(DOCUMENTS)?;
            let mut embeddings = txn.open_table(EMBEDDINGS)?;

            for (document, embedding) in entries {
                let record = StoredDocument {
                    content: document.content.clone(),
                    metadata: document.metadata.clone(),
                };
                let payload = serde_json::to_vec(&record)?;
                docs.insert(document.id.as_str(), payload.as_slice())?;

                let bytes: &[u8] = bytemuck::cast_slice(embedding.as_slice());
                embeddings.insert(document.id.as_str(), bytes)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        Ok(table.len()? as usize)
    }

    fn all_embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;

        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            // pod_collect_to_vec tolerates the unaligned byte slices redb
            // hands back.
            let vector: Vec<f32> = bytemuck::pod_collect_to_vec(value.value());
            rows.push((key.value().to_string(), vector));
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn similarity_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RankedHit>> {
        let rows = self.all_embeddings()?;

        let mut hits: Vec<RankedHit> = rows
            .par_iter()
            .map(|(id, vector)| {
                RankedHit::new(id.clone(), cosine_similarity(embedding, vector))
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scan_content(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;

        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let record: StoredDocument = serde_json::from_slice(value.value())?;
            rows.push((key.value().to_string(), record.content));
        }
        Ok(rows)
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(guard) = table.get(id.as_str())? else {
                continue;
            };
            let record: StoredDocument = serde_json::from_slice(guard.value())?;
            documents.push(Document {
                id: id.clone(),
                content: record.content,
                metadata: record.metadata,
            });
        }
        Ok(documents)
    }
}
