//! String interning pool — dictionary encoding for string columns
//!
//! Every string column stores dense `u32` identifiers into a pool instead of
//! owning text. Equality scans over categorical columns then reduce to integer
//! compares on contiguous buffers, and duplicated strings are stored once.

use std::collections::HashMap;
use std::mem;

/// Dense identifier of an interned string.
pub type StringId = u32;

/// Sentinel for "no string". Never returned by `intern`.
pub const INVALID_ID: StringId = u32::MAX;

/// Append-only text → id dictionary with the inverse vector.
///
/// Identifiers are handed out in insertion order and are stable for the
/// lifetime of the pool. They are never valid across pools.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: Vec<String>,
    ids: HashMap<String, StringId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            strings: Vec::with_capacity(1024),
            ids: HashMap::with_capacity(1024),
        }
    }

    /// Intern a string, returning its id. Idempotent: a known string returns
    /// the prior id without growing storage.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.ids.get(s) {
            return id;
        }
        let id = self.strings.len() as StringId;
        self.strings.push(s.to_owned());
        self.ids.insert(s.to_owned(), id);
        id
    }

    /// Resolve an id. Out-of-range ids (including `INVALID_ID`) resolve to
    /// the empty string; this accessor never fails.
    pub fn get(&self, id: StringId) -> &str {
        self.strings
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_valid(&self, id: StringId) -> bool {
        (id as usize) < self.strings.len()
    }

    /// Number of unique strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.strings.reserve(additional);
        self.ids.reserve(additional);
    }

    pub fn clear(&mut self) {
        self.strings.clear();
        self.ids.clear();
    }

    /// Best-effort byte count of pool storage.
    pub fn memory_usage(&self) -> usize {
        let mut total = 0;
        for s in &self.strings {
            total += s.capacity();
        }
        total += self.ids.len() * (mem::size_of::<String>() + mem::size_of::<StringId>());
        total
    }
}
