mod corpus;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexcase_core::persist::{load_meta, save_meta, IndexPaths, MetaFile, CATALOG_VERSION};
use lexcase_core::tokenizer::{normalize, tokenize};
use lexcase_core::{InvertedIndex, NoThesaurus, SearchConfig, SearchEngine, WordWidth};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect the positional inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dictionary and postings files from a CSV/JSON/JSONL corpus
    Build {
        /// Corpus file or directory
        #[arg(short = 'i', long)]
        input: PathBuf,
        /// Output dictionary file
        #[arg(short = 'd', long)]
        dictionary: PathBuf,
        /// Output postings file
        #[arg(short = 'p', long)]
        postings: PathBuf,
        /// Bytes per integer in the postings file (1-4)
        #[arg(long, default_value_t = 3)]
        word_width: u8,
        /// Index only the first N documents
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print catalog statistics and the posting list of one term
    Inspect {
        #[arg(short = 'd', long)]
        dictionary: PathBuf,
        #[arg(short = 'p', long)]
        postings: PathBuf,
        /// Word to look up; normalized the same way documents are
        term: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, dictionary, postings, word_width, limit } => {
            let width = WordWidth::new(word_width)?;
            build_index(&input, &IndexPaths::new(dictionary, postings), width, limit)
        }
        Commands::Inspect { dictionary, postings, term } => inspect(&IndexPaths::new(dictionary, postings), term.as_deref()),
    }
}

fn build_index(input: &std::path::Path, paths: &IndexPaths, width: WordWidth, limit: Option<usize>) -> Result<()> {
    let docs = corpus::read_corpus(input, limit)?;
    tracing::info!(num_docs = docs.len(), input = %input.display(), "tokenizing documents");

    let tokenized: Vec<_> = docs.into_par_iter().map(|d| (d.doc_id, tokenize(&d.content))).collect();
    let mut built = InvertedIndex::build_parallel(tokenized, width)?;
    built.save(paths).context("writing index")?;

    let meta = MetaFile {
        num_docs: built.catalog.num_docs() as u32,
        num_terms: built.catalog.num_terms() as u32,
        word_width: width.get(),
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: CATALOG_VERSION as u32,
    };
    save_meta(paths, &meta)?;

    tracing::info!(dictionary = %paths.dictionary.display(), postings = %paths.postings.display(), "index build complete");
    Ok(())
}

fn inspect(paths: &IndexPaths, term: Option<&str>) -> Result<()> {
    let engine = SearchEngine::open(paths, Arc::new(NoThesaurus), SearchConfig::default())?;
    let catalog = engine.catalog();
    println!("documents: {}", catalog.num_docs());
    println!("terms:     {}", catalog.num_terms());
    println!("width:     {} bytes", catalog.word_width().get());
    match load_meta(paths) {
        Ok(meta) => println!("built:     {} (format v{})", meta.created_at, meta.version),
        Err(err) => tracing::debug!(error = %err, "no build metadata next to the dictionary"),
    }
    let Some(word) = term else { return Ok(()) };

    let Some(normalized) = normalize(word) else {
        println!("{word:?} is a stopword");
        return Ok(());
    };
    let Some(id) = catalog.term_id(&normalized) else {
        println!("{normalized:?} is not in the vocabulary");
        return Ok(());
    };
    println!("term:      {normalized} (id {id})");
    println!("df:        {}", catalog.document_frequency(&normalized));
    println!("cf:        {}", catalog.collection_frequency(&normalized));
    println!("idf:       {:.6}", catalog.idf(&normalized));
    println!("offset:    {}", catalog.lookup_offset(&normalized).unwrap_or_default());
    if let Some(entry) = engine.postings_for(&normalized)? {
        for ((doc_id, tf), positions) in entry.document_ids.iter().zip(&entry.term_frequencies).zip(&entry.positions) {
            println!("  doc {doc_id}: tf {tf}, positions {positions:?}");
        }
    }
    Ok(())
}
