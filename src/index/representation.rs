//! Secondary-index storage representations, each backed by the same CoW
//! `IndexEngine` every index uses, since manifest-ordered pages already give
//! ordered lookup for free. `MultiValued`/`SingleValued` store only instance
//! keys under an indexed value (a `Reference` index); `DirectValued` duplicates
//! the instance's content alongside its key (a `Direct` index), trading space
//! for skipping a primary-index lookup on read.

use crate::errors::Result;
use crate::index::engine::{IndexEngine, PageStore};
use crate::types::Key;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};

/// A secondary-index representation: maps an indexed value to the instance keys
/// that produced it, and supports removing one instance key's contribution
/// without disturbing the others sharing that value.
pub trait IndexRepresentation {
    /// # Errors
    /// Returns an error if the underlying page engine fails to read or write.
    fn insert(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()>;

    /// # Errors
    /// Returns an error if the underlying page engine fails to read or write.
    fn remove(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()>;

    /// # Errors
    /// Returns an error if the underlying page engine fails to read.
    fn lookup(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Vec<Key>>;
}

/// The general representation: every cardinality (one-to-one, one-to-many,
/// many-to-one, many-to-many) can store its instance keys as a list under the
/// indexed value; only the *validation* a caller layers on top differs.
#[derive(Debug, Clone)]
pub struct MultiValued {
    pub engine: IndexEngine,
}

impl MultiValued {
    #[must_use]
    pub fn new(max_page_bytes: usize) -> Self {
        Self { engine: IndexEngine::new(max_page_bytes) }
    }

    fn load(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Vec<Key>> {
        match self.engine.get(store, indexed_value)? {
            Some(bytes) => Ok(decode_from_slice::<Vec<Key>, _>(&bytes, standard())?.0),
            None => Ok(Vec::new()),
        }
    }
}

impl IndexRepresentation for MultiValued {
    fn insert(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()> {
        let mut keys = self.load(store, indexed_value)?;
        if !keys.contains(instance_key) {
            keys.push(instance_key.clone());
        }
        let bytes = encode_to_vec(&keys, standard())?;
        self.engine.insert(store, indexed_value.clone(), bytes)
    }

    fn remove(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()> {
        let mut keys = self.load(store, indexed_value)?;
        keys.retain(|k| k != instance_key);
        if keys.is_empty() {
            self.engine.remove(store, indexed_value)?;
        } else {
            let bytes = encode_to_vec(&keys, standard())?;
            self.engine.insert(store, indexed_value.clone(), bytes)?;
        }
        Ok(())
    }

    fn lookup(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Vec<Key>> {
        self.load(store, indexed_value)
    }
}

/// A wrapper over a `MultiValued` representation for cardinalities that guarantee
/// at most one instance key per indexed value (one-to-one, many-to-one),
/// offering a convenience accessor that skips the `Vec` indirection.
#[derive(Debug, Clone)]
pub struct SingleValued(pub MultiValued);

impl SingleValued {
    #[must_use]
    pub fn new(max_page_bytes: usize) -> Self {
        Self(MultiValued::new(max_page_bytes))
    }

    /// # Errors
    /// Returns an error if more than one instance key is recorded under `indexed_value`,
    /// which would mean the cardinality this representation is guarding was violated.
    pub fn lookup_one(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Option<Key>> {
        let mut keys = self.0.lookup(store, indexed_value)?;
        match keys.len() {
            0 => Ok(None),
            1 => Ok(Some(keys.remove(0))),
            _ => Err(crate::errors::Error::Corrupt(format!(
                "single-valued index holds {} instance keys for one indexed value",
                keys.len()
            ))),
        }
    }
}

impl IndexRepresentation for SingleValued {
    fn insert(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()> {
        self.0.insert(store, instance_key, indexed_value)
    }

    fn remove(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()> {
        self.0.remove(store, instance_key, indexed_value)
    }

    fn lookup(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Vec<Key>> {
        self.0.lookup(store, indexed_value)
    }
}

/// A `Direct`-storage-kind representation: maps an indexed value to the
/// instance key/content pairs that produced it, so a lookup never needs a
/// second trip through the primary index.
#[derive(Debug, Clone)]
pub struct DirectValued {
    pub engine: IndexEngine,
}

impl DirectValued {
    #[must_use]
    pub fn new(max_page_bytes: usize) -> Self {
        Self { engine: IndexEngine::new(max_page_bytes) }
    }

    fn load(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Vec<(Key, Vec<u8>)>> {
        match self.engine.get(store, indexed_value)? {
            Some(bytes) => Ok(decode_from_slice::<Vec<(Key, Vec<u8>)>, _>(&bytes, standard())?.0),
            None => Ok(Vec::new()),
        }
    }

    /// Record `instance_key`'s current `content` under `indexed_value`,
    /// replacing any content already recorded for that instance key.
    ///
    /// # Errors
    /// Returns an error if the underlying page engine fails to read or write.
    pub fn insert(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key, content: &[u8]) -> Result<()> {
        let mut entries = self.load(store, indexed_value)?;
        entries.retain(|(k, _)| k != instance_key);
        entries.push((instance_key.clone(), content.to_vec()));
        let bytes = encode_to_vec(&entries, standard())?;
        self.engine.insert(store, indexed_value.clone(), bytes)
    }

    /// # Errors
    /// Returns an error if the underlying page engine fails to read or write.
    pub fn remove(&mut self, store: &mut impl PageStore, instance_key: &Key, indexed_value: &Key) -> Result<()> {
        let mut entries = self.load(store, indexed_value)?;
        entries.retain(|(k, _)| k != instance_key);
        if entries.is_empty() {
            self.engine.remove(store, indexed_value)?;
        } else {
            let bytes = encode_to_vec(&entries, standard())?;
            self.engine.insert(store, indexed_value.clone(), bytes)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error if the underlying page engine fails to read.
    pub fn lookup_content(&self, store: &impl PageStore, indexed_value: &Key) -> Result<Vec<(Key, Vec<u8>)>> {
        self.load(store, indexed_value)
    }
}
