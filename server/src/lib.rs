use anyhow::{Context, Result};
use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use lexcase_core::persist::IndexPaths;
use lexcase_core::{parse_query, MapThesaurus, NoThesaurus, ParsedQuery, ScoredDoc, SearchConfig, SearchEngine, Thesaurus};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Everything needed to open a search session.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub dictionary: PathBuf,
    pub postings: PathBuf,
    pub thesaurus: Option<PathBuf>,
    pub config: SearchConfig,
}

/// Load the catalog, open the postings file and the optional thesaurus.
pub fn open_engine(options: &EngineOptions) -> Result<SearchEngine> {
    let thesaurus: Arc<dyn Thesaurus> = match &options.thesaurus {
        Some(path) => Arc::new(MapThesaurus::load(path)?),
        None => Arc::new(NoThesaurus),
    };
    let paths = IndexPaths::new(&options.dictionary, &options.postings);
    SearchEngine::open(&paths, thesaurus, options.config.clone())
}

/// Answer every line of `queries` and write one line of space-separated document ids per
/// query. A query that hits a corrupt entry gets an empty line; the rest still run.
pub fn run_batch<R, Q, W>(engine: &SearchEngine<R>, queries: Q, mut out: W, expand: bool) -> Result<usize>
where
    R: Read + Seek,
    Q: BufRead,
    W: Write,
{
    let mut answered = 0;
    for (line_no, line) in queries.lines().enumerate() {
        let line = line?;
        let ids = match engine.query(&line, expand) {
            Ok(hits) => hits.iter().map(|h| h.doc_id.to_string()).collect::<Vec<_>>().join(" "),
            Err(err) => {
                tracing::error!(line = line_no + 1, query = line.trim(), error = %err, "query failed");
                String::new()
            }
        };
        writeln!(out, "{ids}")?;
        answered += 1;
    }
    out.flush()?;
    Ok(answered)
}

/// File-to-file form of [`run_batch`].
pub fn run_batch_files<R: Read + Seek>(engine: &SearchEngine<R>, queries: &Path, output: &Path, expand: bool) -> Result<usize> {
    let input = File::open(queries).with_context(|| format!("opening queries {}", queries.display()))?;
    let out = File::create(output).with_context(|| format!("creating output {}", output.display()))?;
    let answered = run_batch(engine, BufReader::new(input), BufWriter::new(out), expand)?;
    tracing::info!(answered, output = %output.display(), "batch complete");
    Ok(answered)
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_expand")]
    pub expand: bool,
}
fn default_k() -> usize { 10 }
fn default_expand() -> bool { true }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub parsed: ParsedQuery,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<ScoredDoc>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

pub fn build_app(engine: Arc<SearchEngine>) -> Router {
    let app_state = AppState { engine };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let parsed = parse_query(&params.q);
    let engine = state.engine.clone();
    let query = parsed.clone();
    let expand = params.expand;
    // postings reads seek a shared file handle, keep them off the async workers
    let hits = tokio::task::spawn_blocking(move || engine.retrieve(&query, expand))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let total_hits = hits.len();
    let k = params.k.clamp(1, 100);
    let results = hits.into_iter().take(k).collect();
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, parsed, took_s: elapsed.as_secs_f64(), total_hits, results }))
}
