//! Query classification and Boolean clause structuring.
//!
//! A query is Boolean when it carries the literal `AND` operator or opens a quoted
//! phrase; anything else is free text. Boolean queries must read
//! `clause AND clause AND ... clause`, where a clause is one word or a quoted phrase.
//! Quotes may be written `"..."`, `“...”` or the ``` ``...'' ``` pair.

use crate::tokenizer::{normalize, WORD};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref QUERY_RE: Regex = Regex::new(&format!(r#"(?u)``|''|["“”]|{WORD}"#)).expect("valid regex");
}

pub const CONJUNCTION: &str = "AND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    /// A word and its normalized term; `None` for stopwords.
    Word { raw: String, term: Option<String> },
    OpenQuote,
    CloseQuote,
    And,
}

impl QueryToken {
    fn raw(&self) -> &str {
        match self {
            QueryToken::Word { raw, .. } => raw,
            QueryToken::OpenQuote => "``",
            QueryToken::CloseQuote => "''",
            QueryToken::And => CONJUNCTION,
        }
    }
}

/// One token-group of a Boolean query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Clause {
    Term(String),
    Phrase(Vec<String>),
}

impl Clause {
    pub fn terms(&self) -> &[String] {
        match self {
            Clause::Term(t) => std::slice::from_ref(t),
            Clause::Phrase(ts) => ts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedQuery {
    FreeText { tokens: Vec<String> },
    Boolean { clauses: Vec<Clause> },
    Error { raw_tokens: Vec<String> },
}

impl ParsedQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedQuery::FreeText { .. } => "free_text",
            ParsedQuery::Boolean { .. } => "boolean",
            ParsedQuery::Error { .. } => "error",
        }
    }
}

/// Split a raw query into words, quote markers and the conjunction operator.
pub fn lex(raw: &str) -> Vec<QueryToken> {
    let text = raw.nfkc().collect::<String>();
    let mut inside = false;
    let mut tokens = Vec::new();
    for mat in QUERY_RE.find_iter(&text) {
        let token = match mat.as_str() {
            "``" | "“" => QueryToken::OpenQuote,
            "''" | "”" => QueryToken::CloseQuote,
            "\"" if inside => QueryToken::CloseQuote,
            "\"" => QueryToken::OpenQuote,
            CONJUNCTION => QueryToken::And,
            word => QueryToken::Word { raw: word.to_string(), term: normalize(word) },
        };
        match token {
            QueryToken::OpenQuote => inside = true,
            QueryToken::CloseQuote => inside = false,
            _ => {}
        }
        tokens.push(token);
    }
    tokens
}

/// The normalized terms of a query string, stopwords and operators dropped.
pub fn tokenize_and_normalize(raw: &str) -> Vec<String> {
    lex(raw)
        .into_iter()
        .filter_map(|t| match t {
            QueryToken::Word { term, .. } => term,
            _ => None,
        })
        .collect()
}

pub fn parse_query(raw: &str) -> ParsedQuery {
    let tokens = lex(raw);
    let boolean = tokens.iter().any(|t| matches!(t, QueryToken::And | QueryToken::OpenQuote));
    if !boolean {
        let tokens = tokens
            .into_iter()
            .filter_map(|t| match t {
                QueryToken::Word { term, .. } => term,
                _ => None,
            })
            .collect();
        return ParsedQuery::FreeText { tokens };
    }
    match structure(&tokens) {
        Ok(clauses) => {
            tracing::debug!(clauses = clauses.len(), "boolean query");
            ParsedQuery::Boolean { clauses }
        }
        Err(reason) => {
            tracing::warn!(query = raw.trim(), reason, "malformed boolean query");
            ParsedQuery::Error { raw_tokens: tokens.iter().map(|t| t.raw().to_string()).collect() }
        }
    }
}

enum Slot {
    // None when every word of the group was a stopword
    Group(Option<Clause>),
    Marker,
}

fn structure(tokens: &[QueryToken]) -> Result<Vec<Clause>, &'static str> {
    let mut slots = Vec::new();
    let mut phrase: Option<Vec<String>> = None;
    for token in tokens {
        match (token, phrase.as_mut()) {
            (QueryToken::OpenQuote, None) => phrase = Some(Vec::new()),
            (QueryToken::OpenQuote, Some(_)) => return Err("quote opened inside a phrase"),
            (QueryToken::CloseQuote, Some(_)) => {
                let terms = phrase.take().unwrap_or_default();
                slots.push(Slot::Group((!terms.is_empty()).then_some(Clause::Phrase(terms))));
            }
            (QueryToken::CloseQuote, None) => return Err("closing quote without an opening one"),
            (QueryToken::And, None) => slots.push(Slot::Marker),
            (QueryToken::And, Some(_)) => {}
            (QueryToken::Word { term, .. }, Some(buf)) => buf.extend(term.clone()),
            (QueryToken::Word { term, .. }, None) => slots.push(Slot::Group(term.clone().map(Clause::Term))),
        }
    }
    if phrase.is_some() {
        return Err("unterminated phrase");
    }
    if slots.is_empty() {
        return Err("no clauses");
    }
    for (i, slot) in slots.iter().enumerate() {
        match (i % 2, slot) {
            (0, Slot::Marker) => return Err("operator where a clause was expected"),
            (1, Slot::Group(_)) => return Err("two clauses without an operator between them"),
            _ => {}
        }
    }
    if slots.len() % 2 == 0 {
        return Err("operator not followed by a clause");
    }
    Ok(slots
        .into_iter()
        .filter_map(|s| match s {
            Slot::Group(clause) => clause,
            Slot::Marker => None,
        })
        .collect())
}
