//! A datastore: one primary index plus any number of caller-declared secondary
//! indexes sharing its page store.

use crate::errors::{Error, Result};
use crate::index::descriptor::{IndexSpec, StorageKind};
use crate::index::engine::IndexEngine;
use crate::index::representation::{DirectValued, MultiValued, SingleValued};
use std::collections::HashMap;

/// A secondary index's storage representation, chosen per `IndexSpec` at
/// construction time: `Reference`/`SingleValued` index only instance keys,
/// `Direct` duplicates instance content alongside its key.
pub enum SecondaryIndex {
    Reference(MultiValued),
    SingleValued(SingleValued),
    Direct(DirectValued),
}

/// Build the representation `spec` declares, sharing the same page-byte budget
/// every index on this datastore uses.
#[must_use]
pub fn build_secondary_index(spec: &IndexSpec, max_page_bytes: usize) -> SecondaryIndex {
    match spec.storage_kind {
        StorageKind::Direct => SecondaryIndex::Direct(DirectValued::new(max_page_bytes)),
        StorageKind::Reference if spec.unique => SecondaryIndex::SingleValued(SingleValued::new(max_page_bytes)),
        StorageKind::Reference => SecondaryIndex::Reference(MultiValued::new(max_page_bytes)),
    }
}

/// One named, independently indexed store within a persistence root.
pub struct Datastore {
    pub name: String,
    pub schema_descriptor: serde_json::Value,
    /// A caller-declared tag for the primary key's type (e.g. `"uuid"`,
    /// `"i64"`), compared during warm-up to detect an identifier-shape change
    /// that would force a primary rebuild.
    pub identifier_kind: String,
    pub primary: IndexEngine,
    pub secondary: HashMap<String, (IndexSpec, SecondaryIndex)>,
}

impl Datastore {
    /// Create a datastore with its declared secondary indexes built up front.
    /// Caller-declared indexes replace reflection: warm-up never has to guess
    /// what a schema's secondary indexes should be.
    ///
    /// # Errors
    /// Returns `Error::DuplicateIndexName` if `declared` names the same index twice.
    pub fn new(
        name: impl Into<String>,
        schema_descriptor: serde_json::Value,
        identifier_kind: impl Into<String>,
        max_page_bytes: usize,
        declared: Vec<IndexSpec>,
    ) -> Result<Self> {
        let mut secondary = HashMap::new();
        for spec in declared {
            if secondary.contains_key(&spec.name) {
                return Err(Error::DuplicateIndexName(spec.name));
            }
            let representation = build_secondary_index(&spec, max_page_bytes);
            secondary.insert(spec.name.clone(), (spec, representation));
        }
        Ok(Self {
            name: name.into(),
            schema_descriptor,
            identifier_kind: identifier_kind.into(),
            primary: IndexEngine::new(max_page_bytes),
            secondary,
        })
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<&str> {
        self.secondary.keys().map(String::as_str).collect()
    }

    /// Drop a secondary index entirely, e.g. acting on a migration plan that
    /// found it persisted but no longer live-declared.
    pub fn drop_index(&mut self, name: &str) {
        self.secondary.remove(name);
    }

    /// Each declared secondary index's shape tag, keyed by name, as recorded in
    /// a persisted root for the next warm-up to compare against.
    #[must_use]
    pub fn index_kind_tags(&self) -> std::collections::BTreeMap<String, String> {
        self.secondary.iter().map(|(name, (spec, _))| (name.clone(), spec.kind_tag())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::descriptor::Cardinality;
    use serde_json::json;

    #[test]
    fn duplicate_declared_index_name_is_rejected() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne), IndexSpec::new("by_email", Cardinality::OneToMany)];
        let result = Datastore::new("users", json!({}), "uuid", 64, declared);
        assert!(matches!(result, Err(Error::DuplicateIndexName(name)) if name == "by_email"));
    }

    #[test]
    fn distinct_declared_indexes_are_all_built() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne), IndexSpec::new("by_tag", Cardinality::OneToMany)];
        let datastore = Datastore::new("users", json!({}), "uuid", 64, declared).unwrap();
        let mut names = datastore.index_names();
        names.sort_unstable();
        assert_eq!(names, vec!["by_email", "by_tag"]);
    }

    #[test]
    fn drop_index_removes_a_declared_index() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne)];
        let mut datastore = Datastore::new("users", json!({}), "uuid", 64, declared).unwrap();
        datastore.drop_index("by_email");
        assert!(datastore.index_names().is_empty());
    }

    #[test]
    fn direct_storage_kind_builds_a_direct_valued_representation() {
        use crate::index::descriptor::StorageKind;
        let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne).with_storage_kind(StorageKind::Direct)];
        let datastore = Datastore::new("docs", json!({}), "uuid", 64, declared).unwrap();
        assert!(matches!(datastore.secondary["by_owner"].1, SecondaryIndex::Direct(_)));
    }
}
