use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};
use rankweave::{
    DataDir, DocumentStore, Embedder, HashingEmbedder, IndexPhase, LocalStore,
    Retriever, RetrieverConfig, SparseRanker,
    error::{self, Error},
    types::{Document, SearchRequest},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RANKWEAVE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Search(args) => {
            let mut config = RetrieverConfig::default();
            if let Some(multiplier) = args.multiplier {
                config.candidate_multiplier = multiplier;
            }
            let k = args.k.unwrap_or(config.default_k);

            let store = Arc::new(LocalStore::open(&data_dir.store_db())?);
            let retriever = Retriever::with_index_dir(
                Arc::new(HashingEmbedder::default()),
                store as Arc<dyn DocumentStore>,
                config,
                data_dir.index_dir()?,
            );

            // Serve the index persisted by an earlier ingest or refresh;
            // without one, build it up front instead of answering
            // dense-only.
            if retriever.sparse().phase() != IndexPhase::Ready {
                retriever.sparse().rebuild_now().await;
            }

            let request = SearchRequest {
                query: args.query,
                k,
                profile: None,
            };
            let response = retriever.handle(&request).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if response.results.is_empty() {
                println!("No results for '{}'", response.query);
            } else {
                for (i, hit) in response.results.iter().enumerate() {
                    let dense = hit
                        .source_scores
                        .dense_rank
                        .map_or("-".to_string(), |r| r.to_string());
                    let sparse = hit
                        .source_scores
                        .sparse_rank
                        .map_or("-".to_string(), |r| r.to_string());
                    println!(
                        "{:>2}. {:.4}  {}  (dense #{dense}, keyword #{sparse})",
                        i + 1,
                        hit.score,
                        hit.id
                    );
                    println!("    {}", snippet(&hit.content));
                }
            }
        }
        Command::Ingest(args) => {
            let raw = std::fs::read_to_string(&args.file)?;
            let documents: Vec<IngestDocument> = serde_json::from_str(&raw)
                .map_err(|e| {
                    Error::Config(format!(
                        "cannot parse {}: {e}",
                        args.file.display()
                    ))
                })?;

            let store = Arc::new(LocalStore::open(&data_dir.store_db())?);
            let embedder = HashingEmbedder::default();

            let mut entries = Vec::with_capacity(documents.len());
            for doc in documents {
                let embedding = embedder.encode(&doc.text).await?;
                entries.push((
                    Document {
                        id: doc.id,
                        content: doc.text,
                        metadata: doc.metadata,
                    },
                    embedding,
                ));
            }
            let count = entries.len();
            store.upsert_batch(&entries)?;

            // Keep the persisted keyword index in step with the store so
            // the next search serves the new documents.
            let sparse = SparseRanker::with_index_dir(
                store as Arc<dyn DocumentStore>,
                data_dir.index_dir()?,
            );
            sparse.rebuild_now().await;

            println!("Ingested {count} document(s), keyword index updated");
        }
        Command::Refresh => {
            let store = Arc::new(LocalStore::open(&data_dir.store_db())?);
            let doc_count = store.document_count()?;
            let sparse = SparseRanker::with_index_dir(
                store as Arc<dyn DocumentStore>,
                data_dir.index_dir()?,
            );
            sparse.rebuild_now().await;

            println!(
                "Keyword index rebuilt: {doc_count} document(s), state {}",
                sparse.phase()
            );
        }
        Command::Status(args) => {
            let store = Arc::new(LocalStore::open(&data_dir.store_db())?);
            let doc_count = store.document_count()?;
            let sparse = SparseRanker::with_index_dir(
                store as Arc<dyn DocumentStore>,
                data_dir.index_dir()?,
            );
            let phase = sparse.phase();
            let indexed =
                sparse.snapshot().map_or(0, |snapshot| snapshot.doc_count());

            if args.json {
                println!(
                    "{{\"data_dir\":\"{}\",\"documents\":{doc_count},\"index_state\":\"{phase}\",\"indexed_documents\":{indexed}}}",
                    data_dir.root().display()
                );
            } else {
                println!("Data directory: {}", data_dir.root().display());
                println!("Documents: {doc_count}");
                println!("Keyword index: {phase} ({indexed} document(s))");
            }
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct IngestDocument {
    id: String,
    text: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

fn snippet(content: &str) -> String {
    const MAX: usize = 120;
    let line = content.lines().next().unwrap_or("");
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}
