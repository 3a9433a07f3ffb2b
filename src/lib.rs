//! Hybrid retrieval: a dense vector ranker and a sparse keyword ranker run
//! in parallel over the same document store, and their candidate lists are
//! folded together by reciprocal rank fusion.
//!
//! The entry point is [`Retriever`]. It is generic over two seams: an
//! [`Embedder`] that turns text into vectors, and a [`DocumentStore`] that
//! holds documents, serves nearest-neighbor queries, and hydrates results.
//! [`LocalStore`] and [`HashingEmbedder`] provide self-contained
//! implementations for local use and tests.
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use rankweave::{
//!     DocumentStore, HashingEmbedder, LocalStore, Retriever, RetrieverConfig,
//! };
//!
//! # async fn run() -> rankweave::Result<()> {
//! let store = Arc::new(LocalStore::open(Path::new("store.redb"))?);
//! let retriever = Retriever::new(
//!     Arc::new(HashingEmbedder::default()),
//!     store as Arc<dyn DocumentStore>,
//!     RetrieverConfig::default(),
//! );
//!
//! retriever.sparse().rebuild_now().await;
//! let hits = retriever.search("salted pasta water", 5).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data_dir;
pub mod dense;
pub mod embedder;
pub mod error;
pub mod fuse;
pub mod local_store;
pub mod search;
pub mod sparse;
pub mod store;
pub mod types;

pub use config::RetrieverConfig;
pub use data_dir::DataDir;
pub use dense::DenseRanker;
pub use embedder::{Embedder, HashingEmbedder};
pub use error::{Error, Result};
pub use fuse::RrfFuser;
pub use local_store::LocalStore;
pub use search::Retriever;
pub use sparse::{IndexPhase, SparseRanker, SparseSnapshot};
pub use store::DocumentStore;
