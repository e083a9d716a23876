use anyhow::Result;
use clap::Parser;
use lexcase_core::SearchConfig;
use lexcase_server::{open_engine, run_batch_files, EngineOptions};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Answer a file of queries, one ranked line of document ids per query.
#[derive(Parser)]
#[command(name = "search")]
struct Args {
    /// Dictionary file written by `indexer build`
    #[arg(short = 'd', long)]
    dictionary: PathBuf,
    /// Postings file written by `indexer build`
    #[arg(short = 'p', long)]
    postings: PathBuf,
    /// File with one query per line
    #[arg(short = 'q', long)]
    queries: PathBuf,
    /// Output file of results
    #[arg(short = 'o', long)]
    output: PathBuf,
    /// JSON thesaurus used for query expansion
    #[arg(long)]
    thesaurus: Option<PathBuf>,
    /// Disable thesaurus expansion
    #[arg(long, default_value_t = false)]
    no_expand: bool,
    /// Per-query proximity budget in milliseconds
    #[arg(long)]
    proximity_budget_ms: Option<u64>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let config = SearchConfig {
        proximity_budget: args.proximity_budget_ms.map(std::time::Duration::from_millis),
        ..SearchConfig::default()
    };
    let options = EngineOptions { dictionary: args.dictionary, postings: args.postings, thesaurus: args.thesaurus, config };
    let engine = open_engine(&options)?;
    run_batch_files(&engine, &args.queries, &args.output, !args.no_expand)?;
    Ok(())
}
