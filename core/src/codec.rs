//! Fixed-width binary postings file.
//!
//! Entries are stored back to back, every field one little-endian word of `W` bytes:
//!
//! ```text
//! entry_length | term_id | n | doc_id * n | tf * n | (count_i | pos * count_i) * n
//! ```
//!
//! `entry_length` counts words and includes itself. There is no header; the width is
//! recorded in the catalog.

use crate::error::CodecError;
use crate::{DocId, TermId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom, Write};

/// Byte width of one word in the postings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WordWidth(u8);

impl WordWidth {
    pub const DEFAULT: WordWidth = WordWidth(3);

    pub fn new(bytes: u8) -> Result<Self, CodecError> {
        if (1..=4).contains(&bytes) { Ok(WordWidth(bytes)) } else { Err(CodecError::InvalidWidth(bytes)) }
    }

    pub fn bytes(self) -> usize { self.0 as usize }

    pub fn get(self) -> u8 { self.0 }

    /// Largest value a word can hold, `2^(8W) - 1`.
    pub fn max_value(self) -> u64 { (1u64 << (8 * self.0 as u32)) - 1 }

    fn put(self, field: &'static str, value: u64, out: &mut Vec<u8>) -> Result<(), CodecError> {
        if value > self.max_value() {
            return Err(CodecError::Overflow { field, value, width: self.0 });
        }
        out.extend_from_slice(&value.to_le_bytes()[..self.bytes()]);
        Ok(())
    }

    fn read(self, bytes: &[u8]) -> u32 {
        let mut buf = [0u8; 4];
        buf[..bytes.len()].copy_from_slice(bytes);
        u32::from_le_bytes(buf)
    }
}

impl Default for WordWidth {
    fn default() -> Self { Self::DEFAULT }
}

/// One term's postings: parallel document, frequency and position lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostingsEntry {
    pub term_id: TermId,
    pub document_ids: Vec<DocId>,
    pub term_frequencies: Vec<u32>,
    pub positions: Vec<Vec<u32>>,
}

impl PostingsEntry {
    pub fn len(&self) -> usize { self.document_ids.len() }

    pub fn is_empty(&self) -> bool { self.document_ids.is_empty() }

    /// Word count of the encoded entry: `2n + 3 + sum(count_i + 1)`.
    pub fn word_len(&self) -> usize {
        let positions: usize = self.positions.iter().map(|p| p.len() + 1).sum();
        2 * self.document_ids.len() + 3 + positions
    }
}

/// Append the encoded form of `entry` to `out`.
pub fn encode_entry(entry: &PostingsEntry, width: WordWidth, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let n = entry.document_ids.len();
    if entry.term_frequencies.len() != n || entry.positions.len() != n {
        return Err(CodecError::Inconsistent(format!(
            "term {}: {} documents, {} frequencies, {} position lists",
            entry.term_id,
            n,
            entry.term_frequencies.len(),
            entry.positions.len()
        )));
    }
    let start = out.len();
    out.reserve(entry.word_len() * width.bytes());
    width.put("entry length", entry.word_len() as u64, out)?;
    width.put("term id", entry.term_id as u64, out)?;
    width.put("postings count", n as u64, out)?;
    for &doc_id in &entry.document_ids {
        width.put("document id", doc_id as u64, out)?;
    }
    for &tf in &entry.term_frequencies {
        width.put("term frequency", tf as u64, out)?;
    }
    for positions in &entry.positions {
        width.put("position count", positions.len() as u64, out)?;
        for &p in positions {
            width.put("position", p as u64, out)?;
        }
    }
    debug_assert_eq!(out.len() - start, entry.word_len() * width.bytes());
    Ok(())
}

/// Decode the body of an entry, i.e. everything after the `entry_length` word.
/// `body` must hold exactly `entry_length - 1` words.
pub fn decode_body(body: &[u8], entry_length: usize, width: WordWidth) -> Result<PostingsEntry, CodecError> {
    let w = width.bytes();
    if entry_length < 3 {
        return Err(CodecError::Inconsistent(format!("entry length {entry_length} below minimum of 3 words")));
    }
    let expected = (entry_length - 1) * w;
    if body.len() != expected {
        return Err(CodecError::Truncated { expected, found: body.len() });
    }
    let words = Words { body, width, at: 0 };
    decode_words(words)
}

struct Words<'a> {
    body: &'a [u8],
    width: WordWidth,
    at: usize,
}

impl Words<'_> {
    fn remaining(&self) -> usize { (self.body.len() - self.at) / self.width.bytes() }

    fn next(&mut self, field: &str) -> Result<u32, CodecError> {
        let w = self.width.bytes();
        let Some(bytes) = self.body.get(self.at..self.at + w) else {
            return Err(CodecError::Inconsistent(format!("ran out of words reading {field}")));
        };
        self.at += w;
        Ok(self.width.read(bytes))
    }

    fn take(&mut self, count: usize, field: &str) -> Result<Vec<u32>, CodecError> {
        if count > self.remaining() {
            return Err(CodecError::Inconsistent(format!(
                "{field} declares {count} words, {} left",
                self.remaining()
            )));
        }
        (0..count).map(|_| self.next(field)).collect()
    }
}

fn decode_words(mut words: Words<'_>) -> Result<PostingsEntry, CodecError> {
    let term_id = words.next("term id")?;
    let n = words.next("postings count")? as usize;
    let document_ids = words.take(n, "document ids")?;
    let term_frequencies = words.take(n, "term frequencies")?;
    let mut positions = Vec::with_capacity(n);
    for _ in 0..n {
        let count = words.next("position count")? as usize;
        positions.push(words.take(count, "positions")?);
    }
    if words.remaining() != 0 {
        return Err(CodecError::Inconsistent(format!(
            "term {term_id}: {} trailing words after {n} postings",
            words.remaining()
        )));
    }
    Ok(PostingsEntry { term_id, document_ids, term_frequencies, positions })
}

/// Writes entries back to back and reports the offset each one starts at.
pub struct PostingsWriter<W: Write> {
    out: W,
    width: WordWidth,
    offset: u64,
    written: HashSet<TermId>,
    buf: Vec<u8>,
}

impl<W: Write> PostingsWriter<W> {
    pub fn new(out: W, width: WordWidth) -> Self {
        Self { out, width, offset: 0, written: HashSet::new(), buf: Vec::new() }
    }

    /// Encode and write one entry, returning the byte offset of its `entry_length` word.
    pub fn write_entry(&mut self, entry: &PostingsEntry) -> Result<u64, CodecError> {
        if !self.written.insert(entry.term_id) {
            return Err(CodecError::DuplicateTerm(entry.term_id));
        }
        self.buf.clear();
        encode_entry(entry, self.width, &mut self.buf)?;
        self.out.write_all(&self.buf)?;
        let at = self.offset;
        self.offset += self.buf.len() as u64;
        Ok(at)
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 { self.offset }

    pub fn finish(mut self) -> Result<W, CodecError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Random-access reader over a postings file. The handle sits behind a lock held for one
/// seek-read-read sequence, so concurrent queries can share a reader.
pub struct PostingsReader<R> {
    inner: Mutex<R>,
    width: WordWidth,
}

impl<R: Read + Seek> PostingsReader<R> {
    pub fn new(inner: R, width: WordWidth) -> Self {
        Self { inner: Mutex::new(inner), width }
    }

    pub fn width(&self) -> WordWidth { self.width }

    /// Read and decode the entry starting at `offset`.
    pub fn read_at(&self, offset: u64) -> Result<PostingsEntry, CodecError> {
        let w = self.width.bytes();
        let body = {
            let mut file = self.inner.lock();
            file.seek(SeekFrom::Start(offset))?;
            let mut head = vec![0u8; w];
            read_full(&mut *file, &mut head)?;
            let entry_length = self.width.read(&head) as usize;
            if entry_length < 3 {
                return Err(CodecError::Inconsistent(format!("entry length {entry_length} at offset {offset}")));
            }
            // bounded by what the file holds, not by the claimed length
            let want = (entry_length - 1) as u64 * w as u64;
            let mut body = Vec::new();
            (&mut *file).take(want).read_to_end(&mut body)?;
            if (body.len() as u64) < want {
                return Err(CodecError::Truncated { expected: want as usize, found: body.len() });
            }
            body
        };
        let entry_length = body.len() / w + 1;
        decode_body(&body, entry_length, self.width)
    }

    pub fn into_inner(self) -> R { self.inner.into_inner() }
}

fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Err(CodecError::Truncated { expected: buf.len(), found: filled }),
            Ok(k) => filled += k,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
