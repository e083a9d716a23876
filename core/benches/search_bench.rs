use criterion::{criterion_group, criterion_main, Criterion};
use lexcase_core::codec::{encode_entry, PostingsReader};
use lexcase_core::tokenizer::tokenize;
use lexcase_core::{InvertedIndex, NoThesaurus, PostingsEntry, SearchConfig, SearchEngine, WordWidth};
use std::io::Cursor;
use std::sync::Arc;

const WORDS: &[&str] = &[
    "appeal", "court", "negligence", "damages", "contract", "breach", "tenant", "lease", "judgment", "plaintiff",
    "defendant", "evidence", "statute", "liability", "injunction", "costs",
];

fn synthetic_corpus(docs: u32, len: usize) -> Vec<(u32, Vec<(String, usize)>)> {
    (0..docs)
        .map(|d| {
            let text: Vec<&str> = (0..len).map(|i| WORDS[(d as usize * 7 + i * 3 + i / 5) % WORDS.len()]).collect();
            (d, tokenize(&text.join(" ")))
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = "The plaintiff's appeal against the judgment on damages for negligence was dismissed with costs. ".repeat(50);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(&text)));
}

fn bench_decode(c: &mut Criterion) {
    let entry = PostingsEntry {
        term_id: 1,
        document_ids: (0..2000).collect(),
        term_frequencies: vec![3; 2000],
        positions: (0..2000).map(|i| vec![i, i + 10, i + 20]).collect(),
    };
    let mut bytes = Vec::new();
    encode_entry(&entry, WordWidth::DEFAULT, &mut bytes).unwrap();
    let reader = PostingsReader::new(Cursor::new(bytes), WordWidth::DEFAULT);
    c.bench_function("decode_2000_postings", |b| b.iter(|| reader.read_at(0).unwrap()));
}

fn bench_query(c: &mut Criterion) {
    let mut built = InvertedIndex::build_parallel(synthetic_corpus(2000, 12), WordWidth::DEFAULT).unwrap();
    let bytes = built.write_postings(Vec::new()).unwrap();
    let engine = SearchEngine::new(built.catalog, Cursor::new(bytes), Arc::new(NoThesaurus), SearchConfig::default());
    c.bench_function("free_text_three_terms", |b| b.iter(|| engine.query("negligence damages appeal", false).unwrap()));
}

criterion_group!(benches, bench_tokenize, bench_decode, bench_query);
criterion_main!(benches);
