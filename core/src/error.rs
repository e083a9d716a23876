use crate::{DocId, TermId};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("word width must be between 1 and 4 bytes, got {0}")]
    InvalidWidth(u8),

    #[error("{field} value {value} does not fit in {width}-byte words")]
    Overflow { field: &'static str, value: u64, width: u8 },

    #[error("postings entry truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("postings entry inconsistent: {0}")]
    Inconsistent(String),

    #[error("term {0} written twice")]
    DuplicateTerm(TermId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not a catalog file (bad magic)")]
    BadMagic,

    #[error("unsupported catalog version {0}")]
    UnsupportedVersion(u8),

    #[error("catalog record malformed: {0}")]
    Malformed(String),

    #[error("catalog encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("{what} {value} exceeds the {width}-byte word ceiling of {max}")]
    WidthOverflow { what: &'static str, value: u64, width: u8, max: u64 },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("index corrupt at term {term:?}: {source}")]
    Corrupt {
        term: String,
        #[source]
        source: CodecError,
    },

    #[error("index corrupt: term {0:?} has no postings offset")]
    MissingOffset(String),

    #[error("index corrupt: term {term:?} has an invalid posting (document {doc_id}, frequency {tf})")]
    BadPosting { term: String, doc_id: DocId, tf: u32 },
}
