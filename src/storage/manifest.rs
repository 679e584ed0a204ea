//! Ordered manifest of page references, the unit a copy-on-write mutation replaces
//! wholesale: a writer never edits a page file in place, it writes new pages and
//! produces a new manifest naming them.

use crate::errors::{Error, Result};
use crate::types::Key;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};

/// One page's slot in a manifest: its id plus the inclusive key range it covers,
/// enough to binary-search the manifest without opening every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page_id: u64,
    pub first_key: Key,
    pub last_key: Key,
    pub entry_count: u64,
}

/// An ordered, immutable list of page references. Every structural mutation
/// (insert, split, merge) is expressed as `with_replaced_range`, which returns a
/// new `Manifest` rather than editing this one in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u64,
    pub pages: Vec<PageRef>,
}

impl Manifest {
    #[must_use]
    pub fn empty() -> Self {
        Self { version: 0, pages: Vec::new() }
    }

    /// # Errors
    /// Returns `Error::Encode` if the manifest cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_to_vec(self, standard())?)
    }

    /// # Errors
    /// Returns `Error::Decode` if `bytes` is not a well-formed manifest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(decode_from_slice(bytes, standard())?.0)
    }

    /// Binary-search for the index of the page whose key range contains `key`,
    /// or the page immediately preceding where `key` would sort if none contains it.
    #[must_use]
    pub fn page_index_for(&self, key: &Key) -> Option<usize> {
        if self.pages.is_empty() {
            return None;
        }
        match self.pages.binary_search_by(|p| p.first_key.cmp(key)) {
            Ok(idx) => Some(idx),
            Err(0) => None,
            Err(idx) => Some(idx - 1),
        }
    }

    /// The index a new page covering `key` should be inserted at, so `pages`
    /// stays sorted by `first_key`.
    #[must_use]
    pub fn insertion_cursor(&self, key: &Key) -> usize {
        self.pages.partition_point(|p| p.first_key <= *key)
    }

    /// Replace `pages[range]` with `replacement`, bumping the version. This is the
    /// sole mutation primitive: every insert, split, or compaction goes through it
    /// and returns a brand new manifest instead of touching `self`.
    ///
    /// # Errors
    /// Returns `Error::InvalidRange` if `range` is out of bounds.
    pub fn with_replaced_range(&self, range: std::ops::Range<usize>, replacement: Vec<PageRef>) -> Result<Self> {
        if range.start > range.end || range.end > self.pages.len() {
            return Err(Error::InvalidRange(format!(
                "range {range:?} out of bounds for manifest with {} pages",
                self.pages.len()
            )));
        }
        let mut pages = self.pages.clone();
        pages.splice(range, replacement);
        Ok(Self { version: self.version + 1, pages })
    }

    /// Ordered scan of page ids covering `[start, end)`, honoring direction.
    #[must_use]
    pub fn scan_range(&self, start: Option<&Key>, end: Option<&Key>, descending: bool) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .pages
            .iter()
            .filter(|p| start.is_none_or(|s| &p.last_key >= s) && end.is_none_or(|e| &p.first_key < e))
            .map(|p| p.page_id)
            .collect();
        if descending {
            ids.reverse();
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: u64, first: i64, last: i64) -> PageRef {
        PageRef { page_id: id, first_key: Key::I64(first), last_key: Key::I64(last), entry_count: 1 }
    }

    #[test]
    fn page_index_for_finds_covering_page() {
        let manifest = Manifest { version: 0, pages: vec![page(1, 0, 9), page(2, 10, 19)] };
        assert_eq!(manifest.page_index_for(&Key::I64(15)), Some(1));
        assert_eq!(manifest.page_index_for(&Key::I64(5)), Some(0));
    }

    #[test]
    fn insertion_cursor_keeps_pages_sorted() {
        let manifest = Manifest { version: 0, pages: vec![page(1, 0, 9), page(2, 10, 19)] };
        assert_eq!(manifest.insertion_cursor(&Key::I64(25)), 2);
        assert_eq!(manifest.insertion_cursor(&Key::I64(-5)), 0);
    }

    #[test]
    fn with_replaced_range_produces_new_version_and_leaves_original_untouched() {
        let manifest = Manifest { version: 3, pages: vec![page(1, 0, 9)] };
        let next = manifest.with_replaced_range(0..1, vec![page(1, 0, 4), page(2, 5, 9)]).unwrap();
        assert_eq!(next.version, 4);
        assert_eq!(next.pages.len(), 2);
        assert_eq!(manifest.pages.len(), 1);
    }

    #[test]
    fn manifest_bytes_roundtrip() {
        let manifest = Manifest { version: 7, pages: vec![page(1, 0, 9)] };
        let bytes = manifest.to_bytes().unwrap();
        let decoded = Manifest::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.version, 7);
        assert_eq!(decoded.pages, manifest.pages);
    }
}
