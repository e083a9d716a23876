//! Corpus sources: CSV tables and JSON / JSONL documents, as files or directory trees.

use anyhow::{anyhow, Context, Result};
use lexcase_core::DocId;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    document_id: Option<serde_json::Value>,
    #[serde(default)]
    content: Option<String>,
}

/// One corpus row: external document id and raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub doc_id: DocId,
    pub content: String,
}

fn parse_id(raw: &str) -> Option<DocId> {
    raw.trim().parse::<DocId>().ok()
}

fn json_id(value: &serde_json::Value) -> Option<DocId> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| DocId::try_from(v).ok()),
        serde_json::Value::String(s) => parse_id(s),
        _ => None,
    }
}

/// Collects rows in file order, stopping after `limit` documents.
struct Collector {
    docs: Vec<RawDocument>,
    limit: Option<usize>,
    skipped: usize,
}

impl Collector {
    fn full(&self) -> bool {
        self.limit.is_some_and(|l| self.docs.len() >= l)
    }

    fn push(&mut self, id: Option<DocId>, content: Option<String>, origin: &Path, row: usize) {
        match id {
            Some(doc_id) => self.docs.push(RawDocument { doc_id, content: content.unwrap_or_default() }),
            None => {
                self.skipped += 1;
                tracing::warn!(file = %origin.display(), row, "row without a usable document_id, skipped");
            }
        }
    }

    fn push_json(&mut self, doc: InputDoc, origin: &Path, row: usize) {
        let id = doc.document_id.as_ref().and_then(json_id);
        self.push(id, doc.content, origin, row);
    }
}

/// Files under `input` that look like corpus files, in a stable order.
pub fn corpus_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(anyhow!("corpus path {} does not exist", input.display()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_file() {
            if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                if matches!(ext, "csv" | "json" | "jsonl") {
                    files.push(p.to_path_buf());
                }
            }
        }
    }
    Ok(files)
}

/// Read every document under `input`, in file then row order.
pub fn read_corpus(input: &Path, limit: Option<usize>) -> Result<Vec<RawDocument>> {
    let mut collector = Collector { docs: Vec::new(), limit, skipped: 0 };
    for file in corpus_files(input)? {
        if collector.full() {
            break;
        }
        let read = match file.extension().and_then(|s| s.to_str()) {
            Some("csv") => read_csv(&file, &mut collector),
            Some("jsonl") => read_jsonl(&file, &mut collector),
            _ => read_json(&file, &mut collector),
        };
        read.with_context(|| format!("reading corpus file {}", file.display()))?;
    }
    tracing::info!(documents = collector.docs.len(), skipped = collector.skipped, "corpus read");
    Ok(collector.docs)
}

fn read_csv(file: &Path, out: &mut Collector) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(file)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let id_col = column("document_id").ok_or_else(|| anyhow!("missing document_id column"))?;
    let content_col = column("content").ok_or_else(|| anyhow!("missing content column"))?;
    for (row, record) in reader.records().enumerate() {
        if out.full() {
            break;
        }
        let record = record?;
        let id = record.get(id_col).and_then(parse_id);
        out.push(id, record.get(content_col).map(str::to_string), file, row + 1);
    }
    Ok(())
}

fn read_jsonl(file: &Path, out: &mut Collector) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for (row, line) in reader.lines().enumerate() {
        if out.full() {
            break;
        }
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)?;
        out.push_json(doc, file, row + 1);
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Collector) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for (row, v) in arr.into_iter().enumerate() {
                if out.full() {
                    break;
                }
                let doc: InputDoc = serde_json::from_value(v)?;
                out.push_json(doc, file, row + 1);
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            out.push_json(doc, file, 1);
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_csv_with_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(
            &path,
            "document_id,title,content,court\n246391,\"A v B\",\"The appeal, in part, is allowed.\",SGHC\nx,bad,skipped,SGCA\n17,,,SGCA\n",
        )
        .unwrap();
        let docs = read_corpus(&path, None).unwrap();
        assert_eq!(
            docs,
            vec![
                RawDocument { doc_id: 246391, content: "The appeal, in part, is allowed.".into() },
                RawDocument { doc_id: 17, content: String::new() },
            ]
        );
    }

    #[test]
    fn walks_directories_and_honours_limit() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jsonl"), "{\"document_id\": 1, \"content\": \"one\"}\n\n{\"document_id\": \"2\", \"content\": \"two\"}\n").unwrap();
        fs::write(dir.path().join("b.json"), "[{\"document_id\": 3, \"content\": \"three\"}]").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let all = read_corpus(dir.path(), None).unwrap();
        assert_eq!(all.iter().map(|d| d.doc_id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let first_two = read_corpus(dir.path(), Some(2)).unwrap();
        assert_eq!(first_two.len(), 2);
    }

    #[test]
    fn missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_corpus(&dir.path().join("absent.csv"), None).is_err());
    }
}
