use anyhow::Result;
use axum::Router;
use clap::Parser;
use lexcase_core::SearchConfig;
use lexcase_server::{build_app, open_engine, EngineOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Dictionary file path
    #[arg(short = 'd', long)]
    dictionary: PathBuf,
    /// Postings file path
    #[arg(short = 'p', long)]
    postings: PathBuf,
    /// JSON thesaurus used for query expansion
    #[arg(long)]
    thesaurus: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Per-query proximity budget in milliseconds
    #[arg(long, default_value_t = 250)]
    proximity_budget_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = SearchConfig {
        proximity_budget: Some(std::time::Duration::from_millis(args.proximity_budget_ms)),
        ..SearchConfig::default()
    };
    let options = EngineOptions { dictionary: args.dictionary, postings: args.postings, thesaurus: args.thesaurus, config };
    let engine = Arc::new(open_engine(&options)?);
    let app: Router = build_app(engine);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
