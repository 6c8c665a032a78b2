// Y.Doc wrapper using yrs (y-crdt Rust bindings).
// Every local edit returns the binary update it produced so the caller can
// ship it to other replicas.
//
// Indexes and lengths are counted in characters (Unicode scalar values) and
// translated to the document's byte offsets here, so no caller-supplied
// index can land inside a multi-byte character.

use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, ReadTxn, Text, Transact, Update};

use crate::error::BufferError;

pub struct YDoc {
    doc: Doc,
}

impl YDoc {
    pub fn new() -> Self {
        Self { doc: Doc::new() }
    }

    /// Create a document with a specific client ID (for deterministic testing).
    pub fn with_client_id(client_id: u64) -> Self {
        let options = yrs::Options { client_id, ..Default::default() };
        Self { doc: Doc::with_options(options) }
    }

    /// Apply an incremental binary update from another replica.
    pub fn apply_update(&self, data: &[u8]) -> Result<(), BufferError> {
        let update = Update::decode_v1(data).map_err(|err| BufferError::Codec(err.to_string()))?;
        self.doc
            .transact_mut()
            .apply_update(update)
            .map_err(|err| BufferError::Codec(err.to_string()))
    }

    pub fn text(&self, name: &str) -> String {
        let text = self.doc.get_or_insert_text(name);
        text.get_string(&self.doc.transact())
    }

    /// Length in characters.
    pub fn len(&self, name: &str) -> u32 {
        char_len(&self.text(name))
    }

    /// Insert `content` at `index` and return the resulting update.
    pub fn insert(&self, name: &str, index: u32, content: &str) -> Result<Vec<u8>, BufferError> {
        let text = self.doc.get_or_insert_text(name);
        let before = self.doc.transact().state_vector();
        {
            let mut txn = self.doc.transact_mut();
            let current = text.get_string(&txn);
            let offset = byte_offset(&current, index)
                .ok_or(BufferError::OutOfRange { index, len: char_len(&current) })?;
            text.insert(&mut txn, offset, content);
        }
        Ok(self.doc.transact().encode_diff_v1(&before))
    }

    /// Remove `count` characters starting at `index` and return the update.
    pub fn remove(&self, name: &str, index: u32, count: u32) -> Result<Vec<u8>, BufferError> {
        let text = self.doc.get_or_insert_text(name);
        let before = self.doc.transact().state_vector();
        {
            let mut txn = self.doc.transact_mut();
            let current = text.get_string(&txn);
            let end = index.saturating_add(count);
            let out_of_range = || BufferError::OutOfRange { index: end, len: char_len(&current) };
            let start = byte_offset(&current, index).ok_or_else(out_of_range)?;
            let stop = byte_offset(&current, end).ok_or_else(out_of_range)?;
            text.remove_range(&mut txn, start, stop - start);
        }
        Ok(self.doc.transact().encode_diff_v1(&before))
    }
}

fn char_len(s: &str) -> u32 {
    s.chars().count() as u32
}

/// Byte offset of the `index`-th character; `index == len` maps to the end.
fn byte_offset(s: &str, index: u32) -> Option<u32> {
    s.char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(s.len()))
        .nth(index as usize)
        .map(|offset| offset as u32)
}

impl Default for YDoc {
    fn default() -> Self {
        Self::new()
    }
}
