//! A datastore root: the named tuple of manifest pointers and schema state that a
//! commit swings atomically. Like a manifest, a root is never edited in place —
//! mutating a datastore always produces a new, dated root file.

use crate::errors::Result;
use crate::ids::DatedId;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The committed state of one datastore at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreRoot {
    pub id: String,
    /// Version of the primary index manifest this root points at.
    pub primary_manifest_version: u64,
    /// Named secondary index manifests, keyed by the index name the caller declared.
    pub secondary_manifest_versions: BTreeMap<String, u64>,
    /// A tag for the primary key's type, compared during warm-up to detect an
    /// identifier-shape change.
    pub identifier_kind: String,
    /// Each secondary index's shape tag as of this root, keyed by index name,
    /// compared during warm-up against what's declared live.
    pub secondary_index_kinds: BTreeMap<String, String>,
    pub schema_descriptor: serde_json::Value,
    pub size: u64,
}

impl DatastoreRoot {
    #[must_use]
    pub fn new(id: String, schema_descriptor: serde_json::Value) -> Self {
        Self {
            id,
            primary_manifest_version: 0,
            secondary_manifest_versions: BTreeMap::new(),
            identifier_kind: String::new(),
            secondary_index_kinds: BTreeMap::new(),
            schema_descriptor,
            size: 0,
        }
    }

    #[must_use]
    pub fn with_identifier_kind(mut self, identifier_kind: impl Into<String>) -> Self {
        self.identifier_kind = identifier_kind.into();
        self
    }

    #[must_use]
    pub fn with_secondary_index_kinds(mut self, kinds: BTreeMap<String, String>) -> Self {
        self.secondary_index_kinds = kinds;
        self
    }

    /// Produce a new root with the primary manifest pointer advanced and the size
    /// delta applied. The receiver is left untouched.
    #[must_use]
    pub fn with_primary_manifest(&self, version: u64, size_delta: i64) -> Self {
        let mut next = self.clone();
        next.primary_manifest_version = version;
        next.size = next.size.saturating_add_signed(size_delta);
        next
    }

    /// Produce a new root with one named secondary index's manifest pointer advanced.
    #[must_use]
    pub fn with_secondary_manifest(&self, name: &str, version: u64) -> Self {
        let mut next = self.clone();
        next.secondary_manifest_versions.insert(name.to_string(), version);
        next
    }

    /// # Errors
    /// Returns `Error::Encode` if the root cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_to_vec(self, standard())?)
    }

    /// # Errors
    /// Returns `Error::Decode` if `bytes` is not a well-formed root.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(decode_from_slice(bytes, standard())?.0)
    }

    /// A fresh dated filename for persisting this root, so every mutation writes
    /// a brand new file rather than overwriting the previous commit's root.
    #[must_use]
    pub fn dated_filename() -> String {
        format!("{}.root", DatedId::new())
    }
}
