pub mod catalog;
pub mod codec;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod search;
pub mod thesaurus;
pub mod tokenizer;

pub type TermId = u32;
pub type DocId = u32;

pub use catalog::Catalog;
pub use codec::{PostingsEntry, WordWidth};
pub use index::{BuiltIndex, InvertedIndex};
pub use query::{parse_query, Clause, ParsedQuery};
pub use search::{ProximityNorm, ScoredDoc, SearchConfig, SearchEngine};
pub use thesaurus::{LexicalEntry, MapThesaurus, NoThesaurus, Thesaurus};
