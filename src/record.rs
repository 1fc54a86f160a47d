use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Comparison function applied to record keys. The default compares keys as
/// raw unsigned byte sequences.
pub type KeyOrder = fn(&[u8], &[u8]) -> Ordering;

/// Lexicographic unsigned-byte comparison of two keys.
pub fn default_key_order(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// One indexed line of the input file.
///
/// The `key` is the concatenation, in the configured field order, of the
/// selected field values, each followed by a single NUL byte. A header line
/// carries an empty key so that it sorts before every data line. `offset` and
/// `length` locate the original bytes of the line, including its newline
/// sequence, within the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub key: Vec<u8>,
    pub offset: u64,
    pub length: u32,
}

impl IndexedRecord {
    pub fn new(key: Vec<u8>, offset: u64, length: u32) -> IndexedRecord {
        IndexedRecord {
            key,
            offset,
            length,
        }
    }
}
