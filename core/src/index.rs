use crate::catalog::Catalog;
use crate::codec::{PostingsEntry, PostingsWriter, WordWidth};
use crate::error::IndexError;
use crate::persist::{ensure_parent, save_catalog, IndexPaths};
use crate::DocId;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Occurrences of one term inside one document.
#[derive(Debug, Default)]
struct TermHits {
    positions: Vec<u32>,
}

/// Per-document statistics, computed independently of every other document.
#[derive(Debug)]
struct DocumentStats {
    doc_id: DocId,
    // first-seen order within the document
    terms: Vec<(String, TermHits)>,
    norm: f64,
}

impl DocumentStats {
    fn collect<I>(doc_id: DocId, tokens: I) -> Self
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        let mut slot: HashMap<String, usize> = HashMap::new();
        let mut terms: Vec<(String, TermHits)> = Vec::new();
        for (term, pos) in tokens {
            let i = *slot.entry(term.clone()).or_insert_with(|| {
                terms.push((term, TermHits::default()));
                terms.len() - 1
            });
            terms[i].1.positions.push(pos as u32);
        }
        for (_, hits) in &mut terms {
            hits.positions.sort_unstable();
        }
        let norm = terms
            .iter()
            .map(|(_, hits)| {
                let w = 1.0 + (hits.positions.len() as f64).log10();
                w * w
            })
            .sum::<f64>()
            .sqrt();
        Self { doc_id, terms, norm }
    }
}

#[derive(Debug, Default)]
struct TermPostings {
    document_ids: Vec<DocId>,
    term_frequencies: Vec<u32>,
    positions: Vec<Vec<u32>>,
}

/// In-memory positional inverted index, filled one document at a time.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, TermPostings>,
    document_ids: Vec<DocId>,
    norms: Vec<f64>,
    seen: HashSet<DocId>,
    max_position: u64,
}

/// A finished index: catalog (offsets filled in once written) and postings in term-id order.
#[derive(Debug)]
pub struct BuiltIndex {
    pub catalog: Catalog,
    pub entries: Vec<PostingsEntry>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Build from documents given as plain token sequences; positions are token indices.
    pub fn build<I>(documents: I, width: WordWidth) -> Result<BuiltIndex, IndexError>
    where
        I: IntoIterator<Item = (DocId, Vec<String>)>,
    {
        let mut index = Self::new();
        for (doc_id, tokens) in documents {
            index.add_document(doc_id, tokens.into_iter().enumerate().map(|(p, t)| (t, p)));
        }
        index.finish(width)
    }

    /// Same result as [`InvertedIndex::build`] over positioned tokens, with per-document
    /// statistics computed on the rayon pool and merged in input order.
    pub fn build_parallel(documents: Vec<(DocId, Vec<(String, usize)>)>, width: WordWidth) -> Result<BuiltIndex, IndexError> {
        let stats: Vec<DocumentStats> = documents
            .into_par_iter()
            .map(|(doc_id, tokens)| DocumentStats::collect(doc_id, tokens))
            .collect();
        let mut index = Self::new();
        for doc in stats {
            index.merge(doc);
        }
        index.finish(width)
    }

    /// Add one document. Repeated ids are ignored after the first; a document without
    /// tokens is kept with norm 0.
    pub fn add_document<I>(&mut self, doc_id: DocId, tokens: I)
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        self.merge(DocumentStats::collect(doc_id, tokens));
    }

    fn merge(&mut self, doc: DocumentStats) {
        if !self.seen.insert(doc.doc_id) {
            tracing::warn!(doc_id = doc.doc_id, "duplicate document id, keeping the first occurrence");
            return;
        }
        self.document_ids.push(doc.doc_id);
        self.norms.push(doc.norm);
        for (term, hits) in doc.terms {
            if let Some(&last) = hits.positions.last() {
                self.max_position = self.max_position.max(last as u64);
            }
            let entry = self.postings.entry(term).or_default();
            if entry.document_ids.last() != Some(&doc.doc_id) {
                entry.document_ids.push(doc.doc_id);
                entry.term_frequencies.push(hits.positions.len() as u32);
                entry.positions.push(hits.positions);
            }
        }
    }

    pub fn num_docs(&self) -> usize { self.document_ids.len() }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    /// Sort the vocabulary, assign term ids and produce the catalog and entries.
    /// Fails before anything is written when an id, count, position or entry length exceeds
    /// the word width.
    pub fn finish(self, width: WordWidth) -> Result<BuiltIndex, IndexError> {
        let max = width.max_value();
        let check = |what: &'static str, value: u64| {
            if value > max {
                Err(IndexError::WidthOverflow { what, value, width: width.get(), max })
            } else {
                Ok(())
            }
        };
        if let Some(&doc_id) = self.document_ids.iter().max() {
            check("document id", doc_id as u64)?;
        }
        check("position", self.max_position)?;
        check("document count", self.document_ids.len() as u64)?;
        if !self.postings.is_empty() {
            check("term id", self.postings.len() as u64 - 1)?;
        }

        let mut postings: Vec<(String, TermPostings)> = self.postings.into_iter().collect();
        postings.sort_by(|a, b| a.0.cmp(&b.0));
        let vocabulary: Vec<String> = postings.iter().map(|(t, _)| t.clone()).collect();

        let mut catalog = Catalog::new(vocabulary, self.document_ids, width);
        for (ordinal, norm) in self.norms.into_iter().enumerate() {
            catalog.set_norm(ordinal, norm);
        }

        let mut entries = Vec::with_capacity(postings.len());
        for (term_id, (_, p)) in postings.into_iter().enumerate() {
            let term_id = term_id as u32;
            let cf: u64 = p.term_frequencies.iter().map(|&tf| tf as u64).sum();
            catalog.set_term_stats(term_id, p.document_ids.len() as u32, cf);
            entries.push(PostingsEntry {
                term_id,
                document_ids: p.document_ids,
                term_frequencies: p.term_frequencies,
                positions: p.positions,
            });
        }
        if let Some(longest) = entries.iter().map(PostingsEntry::word_len).max() {
            check("entry length", longest as u64)?;
        }
        tracing::info!(num_docs = catalog.num_docs(), num_terms = catalog.num_terms(), "index built");
        Ok(BuiltIndex { catalog, entries })
    }
}

impl BuiltIndex {
    /// Write all entries in term-id order and record each offset in the catalog.
    pub fn write_postings<W: Write>(&mut self, out: W) -> Result<W, IndexError> {
        let mut writer = PostingsWriter::new(out, self.catalog.word_width());
        for entry in &self.entries {
            let offset = writer.write_entry(entry)?;
            self.catalog.set_offset(entry.term_id, offset);
        }
        tracing::debug!(bytes = writer.position(), "postings written");
        Ok(writer.finish()?)
    }

    /// Persist the postings file, then the catalog that points into it. Postings go to a
    /// `.partial` sibling first and replace the old file only once fully written.
    pub fn save(&mut self, paths: &IndexPaths) -> Result<(), IndexError> {
        ensure_parent(&paths.postings)?;
        let mut partial = paths.postings.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        let written = File::create(&partial)
            .map_err(IndexError::from)
            .and_then(|f| self.write_postings(BufWriter::new(f)).map(drop));
        if let Err(err) = written {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
        fs::rename(&partial, &paths.postings)?;
        save_catalog(&paths.dictionary, &self.catalog)?;
        tracing::info!(
            dictionary = %paths.dictionary.display(),
            postings = %paths.postings.display(),
            "index saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(raw: &[(DocId, &str)]) -> Vec<(DocId, Vec<String>)> {
        raw.iter()
            .map(|(id, text)| (*id, text.split_whitespace().map(String::from).collect()))
            .collect()
    }

    #[test]
    fn postings_follow_input_order_with_positions() {
        let built = InvertedIndex::build(docs(&[(9, "b a b"), (4, "a c")]), WordWidth::DEFAULT).unwrap();
        let c = &built.catalog;
        assert_eq!(c.vocabulary(), &["a", "b", "c"]);
        assert_eq!(c.document_ids(), &[9, 4]);

        let a = &built.entries[0];
        assert_eq!(a.term_id, 0);
        assert_eq!(a.document_ids, vec![9, 4]);
        assert_eq!(a.term_frequencies, vec![1, 1]);
        assert_eq!(a.positions, vec![vec![1], vec![0]]);

        let b = &built.entries[1];
        assert_eq!(b.document_ids, vec![9]);
        assert_eq!(b.term_frequencies, vec![2]);
        assert_eq!(b.positions, vec![vec![0, 2]]);

        assert_eq!(c.document_frequency("a"), 2);
        assert_eq!(c.collection_frequency("b"), 2);
    }

    #[test]
    fn norms_use_log_weighted_frequencies() {
        let built = InvertedIndex::build(docs(&[(1, "x x y"), (2, "")]), WordWidth::DEFAULT).unwrap();
        let w = 1.0 + 2f64.log10();
        assert!((built.catalog.norm(1) - (w * w + 1.0).sqrt()).abs() < 1e-12);
        assert_eq!(built.catalog.norm(2), 0.0);
        assert_eq!(built.catalog.document_ids(), &[1, 2]);
    }

    #[test]
    fn duplicate_document_ids_keep_the_first() {
        let built = InvertedIndex::build(docs(&[(1, "x"), (1, "y")]), WordWidth::DEFAULT).unwrap();
        assert_eq!(built.catalog.vocabulary(), &["x"]);
        assert_eq!(built.catalog.num_docs(), 1);
    }

    #[test]
    fn width_ceiling_fails_fast() {
        let err = InvertedIndex::build(docs(&[(300, "x")]), WordWidth::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, IndexError::WidthOverflow { what: "document id", value: 300, .. }));

        let long = vec![(1, vec!["w".to_string(); 257])];
        let err = InvertedIndex::build(long, WordWidth::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, IndexError::WidthOverflow { what: "position", .. }));
    }

    #[test]
    fn oversized_entry_is_rejected_before_writing() {
        // one shared term across 200 documents needs 2*200 + 3 + 400 words
        let many: Vec<(DocId, Vec<String>)> = (0..200).map(|id| (id, vec!["lis".to_string()])).collect();
        let err = InvertedIndex::build(many, WordWidth::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, IndexError::WidthOverflow { what: "entry length", value: 803, .. }));
    }

    #[test]
    fn failed_save_leaves_existing_postings_alone() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("dictionary.txt"), dir.path().join("postings.txt"));
        fs::write(&paths.postings, b"old").unwrap();

        let mut built = InvertedIndex::build(docs(&[(1, "a b")]), WordWidth::DEFAULT).unwrap();
        // the writer rejects a repeated term partway through
        let dup = built.entries[0].clone();
        built.entries.push(dup);
        assert!(built.save(&paths).is_err());
        assert_eq!(fs::read(&paths.postings).unwrap(), b"old");
        assert!(!dir.path().join("postings.txt.partial").exists());

        let mut good = InvertedIndex::build(docs(&[(1, "a b")]), WordWidth::DEFAULT).unwrap();
        good.save(&paths).unwrap();
        assert_ne!(fs::read(&paths.postings).unwrap(), b"old");
    }

    #[test]
    fn positions_are_stored_ascending() {
        let mut index = InvertedIndex::new();
        index.add_document(3, vec![("x".to_string(), 7), ("y".to_string(), 1), ("x".to_string(), 2)]);
        let built = index.finish(WordWidth::DEFAULT).unwrap();
        assert_eq!(built.entries[0].positions, vec![vec![2, 7]]);
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let input = docs(&[(5, "q r q"), (2, "r s"), (8, "s q t")]);
        let positioned: Vec<(DocId, Vec<(String, usize)>)> = input
            .iter()
            .map(|(id, toks)| (*id, toks.iter().cloned().enumerate().map(|(p, t)| (t, p)).collect()))
            .collect();
        let mut seq = InvertedIndex::build(input, WordWidth::DEFAULT).unwrap();
        let mut par = InvertedIndex::build_parallel(positioned, WordWidth::DEFAULT).unwrap();
        let a = seq.write_postings(Vec::new()).unwrap();
        let b = par.write_postings(Vec::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(seq.catalog, par.catalog);
    }

    #[test]
    fn offsets_point_at_each_entry() {
        let mut built = InvertedIndex::build(docs(&[(1, "m n"), (2, "n")]), WordWidth::DEFAULT).unwrap();
        let bytes = built.write_postings(Vec::new()).unwrap();
        assert_eq!(built.catalog.lookup_offset("m"), Some(0));
        let m_len = (built.entries[0].word_len() * 3) as u64;
        assert_eq!(built.catalog.lookup_offset("n"), Some(m_len));
        assert_eq!(bytes.len() as u64, m_len + (built.entries[1].word_len() * 3) as u64);
    }
}
