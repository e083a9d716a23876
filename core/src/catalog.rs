use crate::codec::WordWidth;
use crate::error::CatalogError;
use crate::{DocId, TermId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Term and document directory for one index: ids, statistics and postings offsets.
///
/// Built by the indexer, then read-only for the lifetime of a search session.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    vocabulary: Vec<String>,
    term_to_id: HashMap<String, TermId>,
    document_ids: Vec<DocId>,
    doc_order: HashMap<DocId, usize>,
    // indexed by term id
    document_frequency: Vec<u32>,
    collection_frequency: Vec<u64>,
    term_offset: Vec<Option<u64>>,
    // indexed by document ordinal
    document_norm: Vec<f64>,
    word_width: WordWidth,
}

/// Persisted form of a catalog. Parallel arrays keep the encoding deterministic.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CatalogRecord {
    pub word_width: u8,
    pub vocabulary: Vec<String>,
    pub document_ids: Vec<DocId>,
    pub document_frequency: Vec<u32>,
    pub collection_frequency: Vec<u64>,
    pub term_offset: Vec<Option<u64>>,
    pub document_norm: Vec<f64>,
}

impl Catalog {
    /// Empty statistics for the given vocabulary (term id = position) and documents.
    pub fn new(vocabulary: Vec<String>, document_ids: Vec<DocId>, word_width: WordWidth) -> Self {
        let terms = vocabulary.len();
        let docs = document_ids.len();
        let term_to_id = vocabulary.iter().enumerate().map(|(i, t)| (t.clone(), i as TermId)).collect();
        let doc_order = document_ids.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        Self {
            vocabulary,
            term_to_id,
            document_ids,
            doc_order,
            document_frequency: vec![0; terms],
            collection_frequency: vec![0; terms],
            term_offset: vec![None; terms],
            document_norm: vec![0.0; docs],
            word_width,
        }
    }

    pub(crate) fn set_term_stats(&mut self, id: TermId, df: u32, cf: u64) {
        self.document_frequency[id as usize] = df;
        self.collection_frequency[id as usize] = cf;
    }

    pub(crate) fn set_norm(&mut self, ordinal: usize, norm: f64) {
        self.document_norm[ordinal] = norm;
    }

    pub(crate) fn set_offset(&mut self, id: TermId, offset: u64) {
        self.term_offset[id as usize] = Some(offset);
    }

    /// Byte offset of the term's postings entry.
    pub fn lookup_offset(&self, term: &str) -> Option<u64> {
        self.term_id(term).and_then(|id| self.term_offset[id as usize])
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.term_to_id.get(term).copied()
    }

    pub fn term(&self, id: TermId) -> Option<&str> {
        self.vocabulary.get(id as usize).map(String::as_str)
    }

    pub fn contains(&self, term: &str) -> bool { self.term_to_id.contains_key(term) }

    /// Number of documents containing `term`, 0 when out of vocabulary.
    pub fn document_frequency(&self, term: &str) -> u32 {
        self.term_id(term).map_or(0, |id| self.document_frequency[id as usize])
    }

    /// Total occurrences of `term` across the collection.
    pub fn collection_frequency(&self, term: &str) -> u64 {
        self.term_id(term).map_or(0, |id| self.collection_frequency[id as usize])
    }

    /// `log10(N / df)`, or 0 for a term no document contains.
    pub fn idf(&self, term: &str) -> f64 {
        match self.document_frequency(term) {
            0 => 0.0,
            df => (self.num_docs() as f64 / df as f64).log10(),
        }
    }

    /// Norm of the document's log-weighted term vector; 0 for unknown or empty documents.
    pub fn norm(&self, doc_id: DocId) -> f64 {
        self.ordinal(doc_id).map_or(0.0, |i| self.document_norm[i])
    }

    pub fn ordinal(&self, doc_id: DocId) -> Option<usize> {
        self.doc_order.get(&doc_id).copied()
    }

    pub fn num_docs(&self) -> usize { self.document_ids.len() }

    pub fn num_terms(&self) -> usize { self.vocabulary.len() }

    pub fn vocabulary(&self) -> &[String] { &self.vocabulary }

    pub fn document_ids(&self) -> &[DocId] { &self.document_ids }

    pub fn word_width(&self) -> WordWidth { self.word_width }

    pub(crate) fn to_record(&self) -> CatalogRecord {
        CatalogRecord {
            word_width: self.word_width.get(),
            vocabulary: self.vocabulary.clone(),
            document_ids: self.document_ids.clone(),
            document_frequency: self.document_frequency.clone(),
            collection_frequency: self.collection_frequency.clone(),
            term_offset: self.term_offset.clone(),
            document_norm: self.document_norm.clone(),
        }
    }

    pub(crate) fn from_record(record: CatalogRecord) -> Result<Self, CatalogError> {
        let word_width = WordWidth::new(record.word_width).map_err(|e| CatalogError::Malformed(e.to_string()))?;
        let terms = record.vocabulary.len();
        if record.document_frequency.len() != terms
            || record.collection_frequency.len() != terms
            || record.term_offset.len() != terms
        {
            return Err(CatalogError::Malformed(format!("per-term arrays do not match {terms} terms")));
        }
        if record.document_norm.len() != record.document_ids.len() {
            return Err(CatalogError::Malformed(format!(
                "{} norms for {} documents",
                record.document_norm.len(),
                record.document_ids.len()
            )));
        }
        let mut catalog = Catalog::new(record.vocabulary, record.document_ids, word_width);
        if catalog.term_to_id.len() != terms {
            return Err(CatalogError::Malformed("duplicate term in vocabulary".into()));
        }
        if catalog.doc_order.len() != catalog.document_ids.len() {
            return Err(CatalogError::Malformed("duplicate document id".into()));
        }
        catalog.document_frequency = record.document_frequency;
        catalog.collection_frequency = record.collection_frequency;
        catalog.term_offset = record.term_offset;
        catalog.document_norm = record.document_norm;
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> Catalog {
        let mut c = Catalog::new(vec!["appeal".into(), "court".into()], vec![40, 7], WordWidth::DEFAULT);
        c.set_term_stats(0, 1, 3);
        c.set_term_stats(1, 2, 2);
        c.set_norm(0, 1.5);
        c.set_offset(0, 0);
        c.set_offset(1, 27);
        c
    }

    #[test]
    fn lookups() {
        let c = tiny();
        assert_eq!(c.term_id("court"), Some(1));
        assert_eq!(c.term(0), Some("appeal"));
        assert_eq!(c.lookup_offset("court"), Some(27));
        assert_eq!(c.lookup_offset("tort"), None);
        assert_eq!(c.document_frequency("tort"), 0);
        assert_eq!(c.collection_frequency("appeal"), 3);
        assert_eq!(c.ordinal(7), Some(1));
        assert_eq!(c.norm(40), 1.5);
        assert_eq!(c.norm(99), 0.0);
    }

    #[test]
    fn idf_is_zero_for_ubiquitous_and_unknown_terms() {
        let c = tiny();
        assert_eq!(c.idf("court"), 0.0);
        assert_eq!(c.idf("tort"), 0.0);
        assert!((c.idf("appeal") - 2f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn record_rejects_ragged_arrays() {
        let mut record = tiny().to_record();
        record.document_norm.pop();
        assert!(matches!(Catalog::from_record(record), Err(CatalogError::Malformed(_))));
    }
}
