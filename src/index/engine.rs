//! The copy-on-write index engine: a sorted run of pages named by a manifest, where
//! every insert allocates fresh pages and produces a new manifest rather than
//! mutating a page already on disk. A single level of flat, sorted pages split on
//! overflow, matching the manifest's page-range model directly.

use crate::errors::{Error, Result};
use crate::storage::manifest::{Manifest, PageRef};
use crate::storage::page::{decode_page, encode_page, page_byte_size};
use crate::types::{Key, ScanDirection};
use std::collections::HashMap;
use std::path::PathBuf;

/// Durable storage for one page's raw, already-framed bytes, keyed by page id. An
/// index engine is generic over this so tests can run entirely in memory while the
/// real datastore backs it with files under `Pages/`.
pub trait PageStore {
    /// # Errors
    /// Returns `Error::PageNotFound` if no page with this id has been written.
    fn load(&self, page_id: u64) -> Result<Vec<u8>>;

    /// # Errors
    /// Implementations may surface I/O failures as `Error::Io`.
    fn store(&mut self, page_id: u64, bytes: Vec<u8>) -> Result<()>;

    fn allocate_page_id(&mut self) -> u64;
}

/// An in-memory `PageStore`, useful for tests and as the backing store while
/// migrations are staged before a commit swings the durable manifest.
#[derive(Debug, Default)]
pub struct InMemoryPageStore {
    pages: HashMap<u64, Vec<u8>>,
    next_id: u64,
}

impl PageStore for InMemoryPageStore {
    fn load(&self, page_id: u64) -> Result<Vec<u8>> {
        self.pages.get(&page_id).cloned().ok_or_else(|| Error::PageNotFound(page_id.to_string()))
    }

    fn store(&mut self, page_id: u64, bytes: Vec<u8>) -> Result<()> {
        self.pages.insert(page_id, bytes);
        Ok(())
    }

    fn allocate_page_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A `PageStore` backed by one file per page under a datastore's `Pages/`
/// directory, written through `fsutil::atomic_write` so a reader never observes a
/// half-written page.
#[derive(Debug)]
pub struct FilePageStore {
    dir: PathBuf,
    next_id: u64,
}

impl FilePageStore {
    /// Open (creating if necessary) the page directory at `dir`, recovering
    /// `next_id` from the highest page id already present so ids never collide
    /// across a process restart.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        let mut next_id = 0u64;
        for entry in std::fs::read_dir(&dir)?.flatten() {
            if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) {
                next_id = next_id.max(id);
            }
        }
        Ok(Self { dir, next_id })
    }

    fn page_path(&self, page_id: u64) -> PathBuf {
        self.dir.join(page_id.to_string())
    }
}

impl PageStore for FilePageStore {
    fn load(&self, page_id: u64) -> Result<Vec<u8>> {
        std::fs::read(self.page_path(page_id)).map_err(|_| Error::PageNotFound(page_id.to_string()))
    }

    fn store(&mut self, page_id: u64, bytes: Vec<u8>) -> Result<()> {
        crate::utils::fsutil::atomic_write(&self.page_path(page_id), &bytes)?;
        Ok(())
    }

    fn allocate_page_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A CoW index over one manifest: binary search to locate a page, an insertion
/// cursor for new keys, and split-on-overflow mutation. A page is serialized
/// through `storage::page::encode_page`/`decode_page` (the ASCII entry codec
/// framed into head/slice/tail blocks) and split once its framed byte size
/// exceeds `max_page_bytes`, not once it accumulates some fixed entry count.
#[derive(Debug, Clone)]
pub struct IndexEngine {
    pub manifest: Manifest,
    pub max_page_bytes: usize,
}

impl IndexEngine {
    #[must_use]
    pub fn new(max_page_bytes: usize) -> Self {
        Self { manifest: Manifest::empty(), max_page_bytes }
    }

    #[must_use]
    pub fn from_manifest(manifest: Manifest, max_page_bytes: usize) -> Self {
        Self { manifest, max_page_bytes }
    }

    fn load_entries(&self, store: &impl PageStore, page_id: u64) -> Result<Vec<(Key, Vec<u8>)>> {
        decode_page(&store.load(page_id)?)
    }

    fn store_entries(&self, store: &mut impl PageStore, page_id: u64, version: u64, entries: &[(Key, Vec<u8>)]) -> Result<()> {
        store.store(page_id, encode_page(page_id, version, entries, self.max_page_bytes)?)
    }

    /// Look up the value stored for `key`, if any.
    ///
    /// # Errors
    /// Returns an error if the page the manifest names is missing from `store`.
    pub fn get(&self, store: &impl PageStore, key: &Key) -> Result<Option<Vec<u8>>> {
        let Some(idx) = self.manifest.page_index_for(key) else { return Ok(None) };
        let entries = self.load_entries(store, self.manifest.pages[idx].page_id)?;
        Ok(entries.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    /// Insert or overwrite `key`, CoW-splitting the owning page if its framed
    /// byte size overflows `max_page_bytes`. Returns the new manifest; the
    /// engine adopts it.
    ///
    /// # Errors
    /// Returns an error if the affected page cannot be read or the new pages cannot be written.
    pub fn insert(&mut self, store: &mut impl PageStore, key: Key, value: Vec<u8>) -> Result<()> {
        let idx = self.manifest.page_index_for(&key);
        let mut entries = match idx {
            Some(i) => self.load_entries(store, self.manifest.pages[i].page_id)?,
            None => Vec::new(),
        };
        match entries.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(pos) => entries[pos].1 = value,
            Err(pos) => entries.insert(pos, (key, value)),
        }

        let next_version = self.manifest.version + 1;
        let replacement = if entries.len() > 1 && page_byte_size(&entries, self.max_page_bytes) > self.max_page_bytes {
            let mid = entries.len() / 2;
            let right_entries = entries.split_off(mid);
            let left_id = store.allocate_page_id();
            let right_id = store.allocate_page_id();
            self.store_entries(store, left_id, next_version, &entries)?;
            self.store_entries(store, right_id, next_version, &right_entries)?;
            vec![page_ref(left_id, &entries), page_ref(right_id, &right_entries)]
        } else {
            let new_id = store.allocate_page_id();
            self.store_entries(store, new_id, next_version, &entries)?;
            vec![page_ref(new_id, &entries)]
        };

        self.manifest = match idx {
            Some(i) => self.manifest.with_replaced_range(i..i + 1, replacement)?,
            None => self.manifest.with_replaced_range(0..0, replacement)?,
        };
        Ok(())
    }

    /// Remove `key` if present, rewriting its owning page. A no-op (no manifest
    /// change) if the key isn't found.
    ///
    /// # Errors
    /// Returns an error if the affected page cannot be read or rewritten.
    pub fn remove(&mut self, store: &mut impl PageStore, key: &Key) -> Result<bool> {
        let Some(idx) = self.manifest.page_index_for(key) else { return Ok(false) };
        let mut entries = self.load_entries(store, self.manifest.pages[idx].page_id)?;
        let Ok(pos) = entries.binary_search_by(|(k, _)| k.cmp(key)) else { return Ok(false) };
        entries.remove(pos);

        let replacement = if entries.is_empty() {
            vec![]
        } else {
            let new_id = store.allocate_page_id();
            self.store_entries(store, new_id, self.manifest.version + 1, &entries)?;
            vec![page_ref(new_id, &entries)]
        };
        self.manifest = self.manifest.with_replaced_range(idx..idx + 1, replacement)?;
        Ok(true)
    }

    /// Ordered scan over `[start, end)`, honoring `direction`.
    ///
    /// # Errors
    /// Returns an error if a page named by the manifest is missing from `store`.
    pub fn scan(
        &self,
        store: &impl PageStore,
        start: Option<&Key>,
        end: Option<&Key>,
        direction: ScanDirection,
    ) -> Result<Vec<(Key, Vec<u8>)>> {
        let descending = matches!(direction, ScanDirection::Descending);
        let page_ids = self.manifest.scan_range(start, end, descending);
        let mut out = Vec::new();
        for page_id in page_ids {
            let mut entries = self.load_entries(store, page_id)?;
            if descending {
                entries.reverse();
            }
            for (k, v) in entries {
                if start.is_some_and(|s| &k < s) || end.is_some_and(|e| &k >= e) {
                    continue;
                }
                out.push((k, v));
            }
        }
        Ok(out)
    }
}

fn page_ref(page_id: u64, entries: &[(Key, Vec<u8>)]) -> PageRef {
    let first_key = entries.first().map_or(Key::Bytes(Vec::new()), |(k, _)| k.clone());
    let last_key = entries.last().map_or(Key::Bytes(Vec::new()), |(k, _)| k.clone());
    PageRef { page_id, first_key, last_key, entry_count: entries.len() as u64 }
}
