use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lexcase_core::persist::IndexPaths;
use lexcase_core::tokenizer::tokenize;
use lexcase_core::{InvertedIndex, SearchConfig, WordWidth};
use lexcase_server::{build_app, open_engine, run_batch, EngineOptions};
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

fn build_sample(dir: &std::path::Path) -> EngineOptions {
    let paths = IndexPaths::new(dir.join("dictionary.txt"), dir.join("postings.txt"));
    let docs = vec![
        (101, tokenize("The appeal against conviction is dismissed")),
        (102, tokenize("Damages for breach of contract were awarded")),
        (103, tokenize("The court allowed the appeal on costs")),
    ];
    let mut built = InvertedIndex::build_parallel(docs, WordWidth::DEFAULT).unwrap();
    built.save(&paths).unwrap();
    EngineOptions { dictionary: paths.dictionary, postings: paths.postings, thesaurus: None, config: SearchConfig::default() }
}

#[tokio::test]
async fn health_and_search_work() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(open_engine(&build_sample(dir.path())).unwrap());
    let app = build_app(engine);

    let res = app.clone().oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.oneshot(Request::builder().uri("/search?q=appeal&k=5").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["parsed"]["type"], "free_text");
    assert_eq!(v["total_hits"], 2);
    let mut ids: Vec<u64> = v["results"].as_array().unwrap().iter().map(|r| r["doc_id"].as_u64().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![101, 103]);
}

#[tokio::test]
async fn malformed_query_returns_no_hits() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_app(Arc::new(open_engine(&build_sample(dir.path())).unwrap()));
    let res = app.oneshot(Request::builder().uri("/search?q=appeal%20AND").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["parsed"]["type"], "error");
    assert_eq!(v["total_hits"], 0);
}

#[test]
fn batch_writes_one_line_per_query() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(&build_sample(dir.path())).unwrap();
    let queries = "contract damages\nzebra\n\"court allowed\" AND conviction\n";
    let mut out = Vec::new();
    let answered = run_batch(&engine, Cursor::new(queries), &mut out, false).unwrap();
    assert_eq!(answered, 3);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "102");
    assert_eq!(lines[1], "");
    let mut boolean: Vec<&str> = lines[2].split(' ').collect();
    boolean.sort_unstable();
    assert_eq!(boolean, vec!["101", "103"]);
}
