//! Ranked retrieval: log-weighted cosine similarity plus a positional proximity bonus.

use crate::catalog::Catalog;
use crate::codec::{PostingsEntry, PostingsReader};
use crate::error::SearchError;
use crate::persist::{load_catalog, IndexPaths};
use crate::query::{parse_query, ParsedQuery};
use crate::thesaurus::Thesaurus;
use crate::tokenizer::normalize;
use crate::DocId;
use anyhow::Context;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::fs::File;
use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Divisor applied to the summed `1 / distance` proximity bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProximityNorm {
    /// `|T| (|T| - 1) / 2` over the distinct query terms, whatever the document matched.
    #[default]
    QueryTermPairs,
    /// Number of position-list pairs the document actually has.
    RealizedPairs,
}

impl ProximityNorm {
    pub fn divisor(self, query_terms: usize, lists: usize) -> f64 {
        let n = match self {
            ProximityNorm::QueryTermPairs => query_terms,
            ProximityNorm::RealizedPairs => lists,
        };
        (n * n.saturating_sub(1)) as f64 / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Cosine weight for free-text queries.
    pub free_text_alpha: f64,
    /// Cosine weight for each Boolean clause.
    pub boolean_alpha: f64,
    pub proximity_norm: ProximityNorm,
    /// Wall-clock limit on proximity work for one (sub-)query.
    pub proximity_budget: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { free_text_alpha: 0.8, boolean_alpha: 0.2, proximity_norm: ProximityNorm::default(), proximity_budget: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Heap key: higher score first, equal scores broken by higher document id.
#[derive(Debug, Clone, Copy)]
struct Ranked(ScoredDoc);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.score.total_cmp(&other.0.score).then(self.0.doc_id.cmp(&other.0.doc_id))
    }
}

/// Best-first order over strictly positive scores.
fn rank<I: IntoIterator<Item = ScoredDoc>>(scores: I) -> Vec<ScoredDoc> {
    let mut heap: BinaryHeap<Ranked> = scores.into_iter().filter(|s| s.score > 0.0).map(Ranked).collect();
    let mut out = Vec::with_capacity(heap.len());
    while let Some(Ranked(doc)) = heap.pop() {
        out.push(doc);
    }
    out
}

/// Smallest `|a[i] - b[j]|` over two ascending position lists, by a linear merge sweep.
pub fn min_distance(a: &[u32], b: &[u32]) -> Option<u32> {
    let (mut i, mut j) = (0, 0);
    let mut best: Option<u32> = None;
    while i < a.len() && j < b.len() {
        let d = a[i].abs_diff(b[j]);
        best = Some(best.map_or(d, |m| m.min(d)));
        if d == 0 {
            break;
        }
        if a[i] < b[j] { i += 1 } else { j += 1 }
    }
    best
}

/// Sum of `1 / min_distance` over every unordered pair of position lists.
fn proximity_sum(lists: &[&[u32]]) -> f64 {
    let mut sum = 0.0;
    for i in 0..lists.len() {
        for j in i + 1..lists.len() {
            if let Some(d) = min_distance(lists[i], lists[j]) {
                sum += 1.0 / d.max(1) as f64;
            }
        }
    }
    sum
}

/// Query engine over a loaded catalog and a random-access postings file.
pub struct SearchEngine<R = File> {
    catalog: Catalog,
    postings: PostingsReader<R>,
    thesaurus: Arc<dyn Thesaurus>,
    config: SearchConfig,
}

impl SearchEngine<File> {
    /// Load the catalog and open the postings file named by `paths`.
    pub fn open(paths: &IndexPaths, thesaurus: Arc<dyn Thesaurus>, config: SearchConfig) -> anyhow::Result<Self> {
        let catalog = load_catalog(&paths.dictionary)?;
        let file = File::open(&paths.postings).with_context(|| format!("opening postings {}", paths.postings.display()))?;
        Ok(Self::new(catalog, file, thesaurus, config))
    }
}

impl<R: Read + Seek> SearchEngine<R> {
    pub fn new(catalog: Catalog, postings: R, thesaurus: Arc<dyn Thesaurus>, config: SearchConfig) -> Self {
        let postings = PostingsReader::new(postings, catalog.word_width());
        Self { catalog, postings, thesaurus, config }
    }

    pub fn catalog(&self) -> &Catalog { &self.catalog }

    pub fn config(&self) -> &SearchConfig { &self.config }

    /// Decoded postings for `term`, `None` when it is out of vocabulary.
    pub fn postings_for(&self, term: &str) -> Result<Option<PostingsEntry>, SearchError> {
        let Some(id) = self.catalog.term_id(term) else { return Ok(None) };
        let offset = self.catalog.lookup_offset(term).ok_or_else(|| SearchError::MissingOffset(term.to_string()))?;
        let entry = self
            .postings
            .read_at(offset)
            .map_err(|source| SearchError::Corrupt { term: term.to_string(), source })?;
        if entry.term_id != id {
            return Err(SearchError::Corrupt {
                term: term.to_string(),
                source: crate::error::CodecError::Inconsistent(format!("expected term {id}, found {}", entry.term_id)),
            });
        }
        tracing::debug!(term, offset, postings = entry.len(), "decoded postings");
        Ok(Some(entry))
    }

    /// Parse and answer a raw query string.
    pub fn query(&self, raw: &str, expand: bool) -> Result<Vec<ScoredDoc>, SearchError> {
        self.retrieve(&parse_query(raw), expand)
    }

    /// Ranked documents for a parsed query, best first.
    pub fn retrieve(&self, query: &ParsedQuery, expand: bool) -> Result<Vec<ScoredDoc>, SearchError> {
        match query {
            ParsedQuery::FreeText { tokens } => {
                let tokens = if expand { self.expand(tokens) } else { tokens.clone() };
                self.free_text(&tokens, self.config.free_text_alpha)
            }
            ParsedQuery::Boolean { clauses } => {
                let mut summed: HashMap<DocId, f64> = HashMap::new();
                for clause in clauses {
                    let terms = clause.terms();
                    let terms = if expand { self.expand(terms) } else { terms.to_vec() };
                    for hit in self.free_text(&terms, self.config.boolean_alpha)? {
                        *summed.entry(hit.doc_id).or_insert(0.0) += hit.score;
                    }
                }
                Ok(rank(summed.into_iter().map(|(doc_id, score)| ScoredDoc { doc_id, score })))
            }
            ParsedQuery::Error { raw_tokens } => {
                tracing::warn!(tokens = ?raw_tokens, "query rejected, returning no documents");
                Ok(Vec::new())
            }
        }
    }

    /// Append in-vocabulary lemmas from the token's own senses (primary lemma equal to the
    /// token) to the query.
    pub fn expand(&self, tokens: &[String]) -> Vec<String> {
        let mut extra: BTreeSet<String> = BTreeSet::new();
        for token in tokens {
            for entry in self.thesaurus.synonyms_of(token) {
                if entry.primary().and_then(normalize).as_deref() != Some(token.as_str()) {
                    continue;
                }
                for lemma in &entry.lemmas {
                    match normalize(lemma) {
                        Some(term) if self.catalog.contains(&term) => {
                            extra.insert(term);
                        }
                        _ => {}
                    }
                }
            }
        }
        if !extra.is_empty() {
            tracing::debug!(added = ?extra, "expanded query");
        }
        tokens.iter().cloned().chain(extra).collect()
    }

    fn free_text(&self, tokens: &[String], alpha: f64) -> Result<Vec<ScoredDoc>, SearchError> {
        let mut query_tf: BTreeMap<&str, u32> = BTreeMap::new();
        for token in tokens {
            if self.catalog.contains(token) {
                *query_tf.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        if query_tf.is_empty() {
            return Ok(Vec::new());
        }

        let mut fetched: Vec<(&str, f64, PostingsEntry)> = Vec::with_capacity(query_tf.len());
        for (&term, &tf) in &query_tf {
            let weight = (1.0 + (tf as f64).log10()) * self.catalog.idf(term);
            if let Some(entry) = self.postings_for(term)? {
                fetched.push((term, weight, entry));
            }
        }

        let docs = self.catalog.num_docs();
        let mut cosine = vec![0.0f64; docs];
        let mut lists: Vec<Vec<&[u32]>> = vec![Vec::new(); docs];
        for (term, weight, entry) in &fetched {
            for (i, &doc_id) in entry.document_ids.iter().enumerate() {
                let tf = entry.term_frequencies[i];
                let norm = self.catalog.norm(doc_id);
                let ordinal = match self.catalog.ordinal(doc_id) {
                    Some(o) if tf > 0 && norm > 0.0 => o,
                    _ => return Err(SearchError::BadPosting { term: term.to_string(), doc_id, tf }),
                };
                cosine[ordinal] += (1.0 + (tf as f64).log10()) / norm * weight;
                lists[ordinal].push(&entry.positions[i]);
            }
        }

        let terms = query_tf.len();
        let deadline = self.config.proximity_budget.map(|b| Instant::now() + b);
        let mut exhausted = false;
        let mut scored = Vec::new();
        for (ordinal, doc_lists) in lists.iter().enumerate() {
            if doc_lists.is_empty() {
                continue;
            }
            let mut score = cosine[ordinal];
            if doc_lists.len() > 1 && !exhausted {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    tracing::warn!(terms, "proximity budget exhausted, remaining documents scored by cosine only");
                    exhausted = true;
                } else {
                    let proximity = proximity_sum(doc_lists) / self.config.proximity_norm.divisor(terms, doc_lists.len());
                    score = alpha * score + (1.0 - alpha) * proximity;
                }
            }
            scored.push(ScoredDoc { doc_id: self.catalog.document_ids()[ordinal], score });
        }
        Ok(rank(scored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brute_force(a: &[u32], b: &[u32]) -> Option<u32> {
        a.iter().flat_map(|x| b.iter().map(move |y| x.abs_diff(*y))).min()
    }

    #[test]
    fn closest_pair_of_positions() {
        assert_eq!(min_distance(&[2, 9], &[5]), Some(3));
        assert_eq!(min_distance(&[1, 20, 40], &[17, 38, 60]), Some(2));
        assert_eq!(min_distance(&[], &[3]), None);
    }

    #[test]
    fn heap_order_breaks_ties_by_higher_doc_id() {
        let ranked = rank([
            ScoredDoc { doc_id: 1, score: 0.5 },
            ScoredDoc { doc_id: 7, score: 0.5 },
            ScoredDoc { doc_id: 3, score: 0.9 },
            ScoredDoc { doc_id: 4, score: 0.0 },
        ]);
        let ids: Vec<DocId> = ranked.iter().map(|d| d.doc_id).collect();
        assert_eq!(ids, vec![3, 7, 1]);
    }

    #[test]
    fn proximity_divisors() {
        assert_eq!(ProximityNorm::QueryTermPairs.divisor(4, 2), 6.0);
        assert_eq!(ProximityNorm::RealizedPairs.divisor(4, 2), 1.0);
    }

    #[test]
    fn proximity_sums_every_pair() {
        let a: &[u32] = &[0];
        let b: &[u32] = &[2];
        let c: &[u32] = &[6];
        // 1/2 + 1/6 + 1/4
        assert!((proximity_sum(&[a, b, c]) - (0.5 + 1.0 / 6.0 + 0.25)).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn sweep_matches_cross_product(
            a in prop::collection::btree_set(0u32..200, 1..12),
            b in prop::collection::btree_set(0u32..200, 1..12),
        ) {
            let a: Vec<u32> = a.into_iter().collect();
            let b: Vec<u32> = b.into_iter().collect();
            prop_assert_eq!(min_distance(&a, &b), brute_force(&a, &b));
        }
    }
}
