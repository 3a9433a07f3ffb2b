use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "rankweave",
    about = "Hybrid dense + keyword retrieval over a local document store"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a hybrid search against the stored corpus
    Search(SearchArgs),
    /// Load documents from a JSON file into the store
    Ingest(IngestArgs),
    /// Rebuild the keyword index from the store
    Refresh,
    /// Show store and index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Candidate pool multiplier passed to each ranker
    #[arg(long)]
    pub multiplier: Option<usize>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// JSON file containing an array of {id, text, metadata?} objects
    pub file: PathBuf,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "rankweave",
            &mut std::io::stdout(),
        );
    }
}
