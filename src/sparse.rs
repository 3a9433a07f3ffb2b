use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use tantivy::{
    Index,
    IndexReader,
    TantivyDocument,
    collector::TopDocs,
    directory::MmapDirectory,
    doc,
    query::QueryParser,
    schema::{
        Field,
        IndexRecordOption,
        STORED,
        STRING,
        Schema,
        TextFieldIndexing,
        TextOptions,
        Value,
    },
    tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer},
};
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    store::DocumentStore,
    types::RankedHit,
};

/// Analyzer registered for document content: lower-cased word tokens, no
/// stemming, matching how queries are tokenized.
const CONTENT_TOKENIZER: &str = "word_lower";

/// One fully-built, immutable keyword index over a corpus snapshot.
///
/// Built from a full scan of the document store, published by atomic
/// reference swap, and never mutated afterwards. Tokenization and BM25
/// scoring are delegated to tantivy; the index lives in RAM unless the
/// ranker was given a directory to persist it in.
pub struct SparseSnapshot {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    content_field: Field,
    doc_count: usize,
}

impl SparseSnapshot {
    fn analyzer() -> TextAnalyzer {
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .build()
    }

    fn build(corpus: &[(String, String)], dir: Option<&Path>) -> Result<Self> {
        let mut builder = Schema::builder();
        let id_field = builder.add_text_field("id", STRING | STORED);

        let content_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(CONTENT_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );
        let content_field = builder.add_text_field("content", content_options);
        let schema = builder.build();

        let index = match dir {
            Some(path) => {
                // A build replaces the index wholesale, so clear out any
                // previous generation first.
                if path.exists() {
                    std::fs::remove_dir_all(path)?;
                }
                std::fs::create_dir_all(path)?;
                Index::create_in_dir(path, schema)?
            }
            None => Index::create_in_ram(schema),
        };
        index.tokenizers().register(CONTENT_TOKENIZER, Self::analyzer());

        let mut writer = index.writer(15_000_000)?;
        for (id, content) in corpus {
            writer.add_document(doc!(
                id_field => id.as_str(),
                content_field => content.as_str(),
            ))?;
        }
        writer.commit()?;

        let reader = index.reader()?;
        reader.reload()?;

        Ok(Self {
            index,
            reader,
            id_field,
            content_field,
            doc_count: corpus.len(),
        })
    }

    /// Open an index persisted by an earlier build, if the directory holds
    /// one. Tokenizers are not stored on disk and must be re-registered.
    fn open(dir: &Path) -> Result<Option<Self>> {
        if !dir.exists() {
            return Ok(None);
        }
        let mmap = MmapDirectory::open(dir)
            .map_err(tantivy::TantivyError::from)?;
        if !Index::exists(&mmap).map_err(tantivy::TantivyError::from)? {
            return Ok(None);
        }

        let index = Index::open(mmap)?;
        index.tokenizers().register(CONTENT_TOKENIZER, Self::analyzer());

        let schema = index.schema();
        let id_field = schema.get_field("id")?;
        let content_field = schema.get_field("content")?;

        let reader = index.reader()?;
        reader.reload()?;
        let doc_count = reader.searcher().num_docs() as usize;

        Ok(Some(Self {
            index,
            reader,
            id_field,
            content_field,
            doc_count,
        }))
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// Query the snapshot with BM25 scoring. Hits with non-positive scores
    /// are dropped.
    fn search(&self, query_str: &str, k: usize) -> Result<Vec<RankedHit>> {
        let searcher = self.reader.searcher();
        let parser =
            QueryParser::for_index(&self.index, vec![self.content_field]);
        let (query, _errors) = parser.parse_query_lenient(query_str);

        let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            // A hit without a usable id cannot be hydrated downstream;
            // skip it rather than emit a phantom document.
            let Some(id) = doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .filter(|id| !id.is_empty())
            else {
                continue;
            };
            hits.push(RankedHit {
                id: id.to_string(),
                score,
            });
        }
        Ok(hits)
    }
}

impl std::fmt::Debug for SparseSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseSnapshot")
            .field("doc_count", &self.doc_count)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of the sparse index.
enum IndexState {
    /// No build has succeeded yet.
    Empty,
    /// A build is running. Searches keep serving the previous snapshot if
    /// one exists.
    Building {
        previous: Option<Arc<SparseSnapshot>>,
    },
    /// An immutable snapshot is queryable.
    Ready(Arc<SparseSnapshot>),
}

/// Externally visible lifecycle phase, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Empty,
    Building,
    Ready,
}

impl std::fmt::Display for IndexPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexPhase::Empty => write!(f, "empty"),
            IndexPhase::Building => write!(f, "building"),
            IndexPhase::Ready => write!(f, "ready"),
        }
    }
}

/// Keyword ranker over a rebuildable in-memory BM25 index.
///
/// Exclusively owns the snapshot and the build-in-flight state; at most one
/// build runs at a time, and a trigger that arrives while one is running is
/// coalesced (logged and dropped, never queued). Readers only ever observe
/// fully-built snapshots.
pub struct SparseRanker {
    store: Arc<dyn DocumentStore>,
    state: Mutex<IndexState>,
    index_dir: Option<PathBuf>,
}

impl SparseRanker {
    /// Ranker whose snapshots live only in RAM.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            state: Mutex::new(IndexState::Empty),
            index_dir: None,
        }
    }

    /// Ranker whose snapshots are persisted under `dir`. An index left
    /// behind by an earlier process is opened and served immediately; an
    /// unreadable one is logged and treated as absent.
    pub fn with_index_dir(store: Arc<dyn DocumentStore>, dir: PathBuf) -> Self {
        let state = match SparseSnapshot::open(&dir) {
            Ok(Some(snapshot)) => {
                info!(
                    documents = snapshot.doc_count(),
                    "opened persisted sparse index"
                );
                IndexState::Ready(Arc::new(snapshot))
            }
            Ok(None) => IndexState::Empty,
            Err(e) => {
                warn!(error = %e, "could not open persisted sparse index, starting empty");
                IndexState::Empty
            }
        };
        Self {
            store,
            state: Mutex::new(state),
            index_dir: Some(dir),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, IndexState> {
        // A panic mid-transition cannot leave a torn state behind, so a
        // poisoned lock is still safe to reuse.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The snapshot a search should use right now, if any.
    pub fn snapshot(&self) -> Option<Arc<SparseSnapshot>> {
        match &*self.lock_state() {
            IndexState::Empty => None,
            IndexState::Building { previous } => previous.clone(),
            IndexState::Ready(snapshot) => Some(snapshot.clone()),
        }
    }

    pub fn phase(&self) -> IndexPhase {
        match &*self.lock_state() {
            IndexState::Empty => IndexPhase::Empty,
            IndexState::Building { .. } => IndexPhase::Building,
            IndexState::Ready(_) => IndexPhase::Ready,
        }
    }

    /// Return up to `k` hits ordered by descending BM25 score. Empty until
    /// the first successful build, and during a first build.
    pub fn search(&self, query: &str, k: usize) -> Vec<RankedHit> {
        if k == 0 {
            return Vec::new();
        }
        let Some(snapshot) = self.snapshot() else {
            debug!("sparse index not ready, returning no candidates");
            return Vec::new();
        };
        match snapshot.search(query, k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "sparse search failed, returning no candidates");
                Vec::new()
            }
        }
    }

    /// Claim the build slot. Returns false when a build already holds it.
    fn begin_build(&self) -> bool {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, IndexState::Empty) {
            IndexState::Building { previous } => {
                *state = IndexState::Building { previous };
                false
            }
            IndexState::Empty => {
                *state = IndexState::Building { previous: None };
                true
            }
            IndexState::Ready(snapshot) => {
                *state = IndexState::Building {
                    previous: Some(snapshot),
                };
                true
            }
        }
    }

    /// Publish a finished build: swap in the new snapshot, or restore the
    /// pre-build state when the build failed.
    fn publish(&self, built: Result<SparseSnapshot>) {
        let mut state = self.lock_state();
        let previous = match std::mem::replace(&mut *state, IndexState::Empty) {
            IndexState::Building { previous } => previous,
            other => {
                // Publish without a claimed slot never happens through the
                // public API; keep whatever state was there.
                *state = other;
                return;
            }
        };

        match built {
            Ok(snapshot) => {
                info!(
                    documents = snapshot.doc_count(),
                    "sparse index build complete"
                );
                *state = IndexState::Ready(Arc::new(snapshot));
            }
            Err(e) => {
                warn!(error = %e, "sparse index build failed, keeping previous snapshot");
                *state = match previous {
                    Some(snapshot) => IndexState::Ready(snapshot),
                    None => IndexState::Empty,
                };
            }
        }
    }

    async fn build_snapshot(&self) -> Result<SparseSnapshot> {
        let corpus = self.store.scan_content().await?;
        debug!(documents = corpus.len(), "corpus scan complete, indexing");

        // Tokenization and indexing over the full corpus is CPU-bound; keep
        // it off the async workers.
        let dir = self.index_dir.clone();
        tokio::task::spawn_blocking(move || {
            SparseSnapshot::build(&corpus, dir.as_deref())
        })
        .await
        .map_err(|e| Error::Store(format!("index build task failed: {e}")))?
    }

    /// Run a full rebuild to completion. Returns false when another build
    /// already holds the slot (the request is coalesced, not queued).
    pub async fn rebuild_now(&self) -> bool {
        if !self.begin_build() {
            warn!("sparse index build already in progress, coalescing trigger");
            return false;
        }
        info!("starting sparse index rebuild");
        let built = self.build_snapshot().await;
        self.publish(built);
        true
    }

    /// Fire-and-forget rebuild: schedules a detached background build and
    /// returns immediately. Returns whether a build was actually scheduled.
    pub fn trigger_rebuild(self: &Arc<Self>) -> bool {
        if !self.begin_build() {
            warn!("sparse index build already in progress, coalescing trigger");
            return false;
        }
        info!("starting sparse index rebuild");
        let ranker = Arc::clone(self);
        tokio::spawn(async move {
            let built = ranker.build_snapshot().await;
            ranker.publish(built);
        });
        true
    }
}

impl std::fmt::Debug for SparseRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseRanker")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
