//! Lexical thesaurus used for query expansion.

use crate::tokenizer::normalize;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One sense of a word: its lemmas, primary lemma first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LexicalEntry {
    pub lemmas: Vec<String>,
}

impl LexicalEntry {
    pub fn new<I, S>(lemmas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lemmas: lemmas.into_iter().map(Into::into).collect() }
    }

    pub fn primary(&self) -> Option<&str> {
        self.lemmas.first().map(String::as_str)
    }
}

/// Read-only synonym source, loaded once and shared across queries.
pub trait Thesaurus: Send + Sync {
    /// Candidate entries for `term`; empty when the word is unknown.
    fn synonyms_of(&self, term: &str) -> Vec<LexicalEntry>;
}

/// A thesaurus that knows no words.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThesaurus;

impl Thesaurus for NoThesaurus {
    fn synonyms_of(&self, _term: &str) -> Vec<LexicalEntry> {
        Vec::new()
    }
}

/// Thesaurus held in memory, keyed by normalized word.
///
/// The JSON file form maps each word to a list of senses, each sense a list of lemmas:
/// `{"appeal": [["appeal", "entreaty", "prayer"], ["appeal", "collection"]]}`.
/// Keys go through [`normalize`] so lookups with indexed terms hit.
#[derive(Debug, Default, Clone)]
pub struct MapThesaurus {
    entries: HashMap<String, Vec<LexicalEntry>>,
}

impl MapThesaurus {
    pub fn new() -> Self { Self::default() }

    /// Add a sense under `word`; stopwords are not stored.
    pub fn insert(&mut self, word: &str, entry: LexicalEntry) {
        if let Some(key) = normalize(word) {
            self.entries.entry(key).or_default().push(entry);
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<LexicalEntry>> = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: HashMap<String, Vec<LexicalEntry>>) -> Self {
        let mut thesaurus = Self::new();
        for (word, senses) in raw {
            for entry in senses {
                thesaurus.insert(&word, entry);
            }
        }
        thesaurus
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("opening thesaurus {}", path.display()))?;
        let raw: HashMap<String, Vec<LexicalEntry>> = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing thesaurus {}", path.display()))?;
        let thesaurus = Self::from_raw(raw);
        tracing::info!(path = %path.display(), words = thesaurus.len(), "loaded thesaurus");
        Ok(thesaurus)
    }
}

impl Thesaurus for MapThesaurus {
    fn synonyms_of(&self, term: &str) -> Vec<LexicalEntry> {
        self.entries.get(term).cloned().unwrap_or_default()
    }
}
