//! Schema warm-up and index migration: reconcile the schema a datastore last
//! persisted against the one the caller declares live, index by index, and
//! stream the primary index once to rebuild whatever disagrees.
//!
//! A migration forced to restart mid-flight (the caller calls `force_restart`
//! while a rebuild is in progress) drops whatever partial index state it had
//! accumulated and requeues the same plan, re-entering
//! `MigrationProgress::Evaluating` rather than trying to resume a partial rebuild.
//! Declared index shape never changes mid-migration, so restarting from scratch is
//! always correct and the caller isn't expected to diff old vs. new partial state.

use crate::datastore::core::{build_secondary_index, SecondaryIndex};
use crate::errors::{Error, Result};
use crate::index::descriptor::IndexSpec;
use crate::index::engine::PageStore;
use crate::types::{Key, ScanDirection, VersionOrd, VersionTag};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Progress reported while a migration streams the primary index to rebuild
/// secondary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationProgress {
    Evaluating,
    Working { current: u64, total: u64 },
    Complete { total: u64 },
}

/// What a datastore last persisted: the schema version it committed under, the
/// tag of the primary key's type, and every secondary index's shape tag keyed
/// by name.
#[derive(Debug, Clone)]
pub struct PersistedSchema {
    pub version: VersionTag,
    pub identifier_kind: String,
    pub indexes: BTreeMap<String, String>,
}

/// What the caller declares live: the newest schema version this build
/// supports, the primary key's type tag, and every secondary index it declares.
#[derive(Debug, Clone, Copy)]
pub struct LiveSchema<'a> {
    pub max_supported_version: &'a VersionTag,
    pub identifier_kind: &'a str,
    pub declared: &'a [IndexSpec],
}

/// What warm-up decided needs to happen: whether the primary index itself must
/// be rebuilt (an identifier-type change), which secondary indexes need a full
/// rebuild, and which persisted indexes are no longer live-declared at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub rebuild_primary: bool,
    pub indexes_to_rebuild: Vec<String>,
    pub indexes_to_delete: Vec<String>,
}

impl MigrationPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.rebuild_primary && self.indexes_to_rebuild.is_empty() && self.indexes_to_delete.is_empty()
    }

    /// Drop any partial rebuild progress and requeue the same set of indexes,
    /// as if warm-up were entered fresh.
    #[must_use]
    pub fn force_restart(&self) -> Self {
        self.clone()
    }
}

/// Compare a datastore's persisted schema against what the caller declares
/// live, index by index. An identifier-kind change forces a full rebuild
/// (primary and every secondary index, since nothing downstream of the
/// primary key can be trusted); otherwise each declared index is rebuilt only
/// if its shape tag disagrees with what was persisted, and any persisted index
/// no longer declared live is marked for deletion rather than rebuild.
///
/// # Errors
/// Returns `Error::IncompatibleVersion` if `persisted.version` is newer than
/// `live.max_supported_version`, since this build cannot safely read it.
pub fn warm_up(persisted: &PersistedSchema, live: &LiveSchema<'_>, version_ord: &impl VersionOrd) -> Result<MigrationPlan> {
    if version_ord.version_cmp(&persisted.version, live.max_supported_version) == Ordering::Greater {
        return Err(Error::IncompatibleVersion);
    }

    let rebuild_primary = persisted.identifier_kind != live.identifier_kind;
    crate::dev6!("warm_up: identifier_kind persisted={:?} live={:?} rebuild_primary={rebuild_primary}", persisted.identifier_kind, live.identifier_kind);

    if rebuild_primary {
        let indexes_to_rebuild = live.declared.iter().map(|spec| spec.name.clone()).collect();
        return Ok(MigrationPlan { rebuild_primary: true, indexes_to_rebuild, indexes_to_delete: Vec::new() });
    }

    let mut indexes_to_rebuild = Vec::new();
    for spec in live.declared {
        let live_tag = spec.kind_tag();
        let matches = persisted.indexes.get(&spec.name) == Some(&live_tag);
        crate::dev6!("warm_up: index {:?} persisted={:?} live={live_tag:?} matches={matches}", spec.name, persisted.indexes.get(&spec.name));
        if !matches {
            indexes_to_rebuild.push(spec.name.clone());
        }
    }

    let declared_names: std::collections::HashSet<&str> = live.declared.iter().map(|spec| spec.name.as_str()).collect();
    let indexes_to_delete: Vec<String> = persisted.indexes.keys().filter(|name| !declared_names.contains(name.as_str())).cloned().collect();
    for name in &indexes_to_delete {
        crate::dev6!("warm_up: index {name:?} persisted but not live-declared, marking for deletion");
    }

    Ok(MigrationPlan { rebuild_primary: false, indexes_to_rebuild, indexes_to_delete })
}

/// Stream every primary entry once, extracting indexed values for each index in
/// `plan` and rebuilding it from scratch. `extract` maps a primary entry's raw
/// content to the `(index_name, indexed_value)` pairs it contributes; `declared`
/// supplies each rebuilt index's shape so the right representation is built.
///
/// # Errors
/// Returns an error if the primary index or any freshly written secondary page fails.
pub fn rebuild_indexes(
    store: &mut impl PageStore,
    primary_entries: &[(Key, Vec<u8>)],
    plan: &MigrationPlan,
    max_page_bytes: usize,
    declared: &[IndexSpec],
    extract: impl Fn(&Key, &[u8]) -> Vec<(String, Key)>,
    mut on_progress: impl FnMut(MigrationProgress),
) -> Result<HashMap<String, SecondaryIndex>> {
    on_progress(MigrationProgress::Evaluating);
    let total = primary_entries.len() as u64;
    let mut rebuilt: HashMap<String, SecondaryIndex> = plan
        .indexes_to_rebuild
        .iter()
        .filter_map(|name| declared.iter().find(|spec| &spec.name == name))
        .map(|spec| (spec.name.clone(), build_secondary_index(spec, max_page_bytes)))
        .collect();

    for (current, (instance_key, content)) in primary_entries.iter().enumerate() {
        for (index_name, indexed_value) in extract(instance_key, content) {
            if let Some(representation) = rebuilt.get_mut(&index_name) {
                match representation {
                    SecondaryIndex::Reference(rep) => {
                        crate::index::representation::IndexRepresentation::insert(rep, store, instance_key, &indexed_value)?;
                    }
                    SecondaryIndex::SingleValued(rep) => {
                        crate::index::representation::IndexRepresentation::insert(rep, store, instance_key, &indexed_value)?;
                    }
                    SecondaryIndex::Direct(rep) => rep.insert(store, instance_key, &indexed_value, content)?,
                }
            }
        }
        on_progress(MigrationProgress::Working { current: current as u64 + 1, total });
    }

    on_progress(MigrationProgress::Complete { total });
    Ok(rebuilt)
}

/// Convenience wrapper that streams the primary index's full ascending scan
/// before handing entries to `rebuild_indexes`.
///
/// # Errors
/// Returns an error if scanning the primary index fails.
pub fn rebuild_indexes_from_primary(
    store: &mut impl PageStore,
    primary: &crate::index::engine::IndexEngine,
    plan: &MigrationPlan,
    max_page_bytes: usize,
    declared: &[IndexSpec],
    extract: impl Fn(&Key, &[u8]) -> Vec<(String, Key)>,
    on_progress: impl FnMut(MigrationProgress),
) -> Result<HashMap<String, SecondaryIndex>> {
    let entries = primary.scan(store, None, None, ScanDirection::Ascending)?;
    rebuild_indexes(store, &entries, plan, max_page_bytes, declared, extract, on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::descriptor::{Cardinality, StorageKind};
    use crate::types::NaturalVersionOrd;
    use serde_json::json;

    fn persisted(version: i64, identifier_kind: &str, indexes: &[(&str, &str)]) -> PersistedSchema {
        PersistedSchema {
            version: json!(version),
            identifier_kind: identifier_kind.to_string(),
            indexes: indexes.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn matching_schema_needs_no_migration() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne)];
        let p = persisted(3, "uuid", &[("by_email", "OneToOne:Reference")]);
        let live = LiveSchema { max_supported_version: &json!(3), identifier_kind: "uuid", declared: &declared };
        let plan = warm_up(&p, &live, &NaturalVersionOrd).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn identifier_kind_change_forces_a_full_rebuild() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne), IndexSpec::new("by_tag", Cardinality::OneToMany)];
        let p = persisted(3, "i64", &[("by_email", "OneToOne:Reference"), ("by_tag", "OneToMany:Reference")]);
        let live = LiveSchema { max_supported_version: &json!(3), identifier_kind: "uuid", declared: &declared };
        let plan = warm_up(&p, &live, &NaturalVersionOrd).unwrap();
        assert!(plan.rebuild_primary);
        assert_eq!(plan.indexes_to_rebuild, vec!["by_email".to_string(), "by_tag".to_string()]);
    }

    #[test]
    fn a_changed_index_kind_queues_only_that_index() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne), IndexSpec::new("by_tag", Cardinality::OneToMany)];
        let p = persisted(3, "uuid", &[("by_email", "OneToOne:Reference"), ("by_tag", "OneToOne:Reference")]);
        let live = LiveSchema { max_supported_version: &json!(3), identifier_kind: "uuid", declared: &declared };
        let plan = warm_up(&p, &live, &NaturalVersionOrd).unwrap();
        assert!(!plan.rebuild_primary);
        assert_eq!(plan.indexes_to_rebuild, vec!["by_tag".to_string()]);
    }

    #[test]
    fn a_persisted_index_no_longer_declared_is_marked_for_deletion() {
        let declared = vec![IndexSpec::new("by_email", Cardinality::OneToOne)];
        let p = persisted(3, "uuid", &[("by_email", "OneToOne:Reference"), ("by_legacy_tag", "OneToMany:Reference")]);
        let live = LiveSchema { max_supported_version: &json!(3), identifier_kind: "uuid", declared: &declared };
        let plan = warm_up(&p, &live, &NaturalVersionOrd).unwrap();
        assert_eq!(plan.indexes_to_delete, vec!["by_legacy_tag".to_string()]);
        assert!(plan.indexes_to_rebuild.is_empty());
    }

    #[test]
    fn a_persisted_version_newer_than_supported_is_incompatible() {
        let live = LiveSchema { max_supported_version: &json!(2), identifier_kind: "uuid", declared: &[] };
        let p = persisted(3, "uuid", &[]);
        let result = warm_up(&p, &live, &NaturalVersionOrd);
        assert!(matches!(result, Err(Error::IncompatibleVersion)));
    }

    #[test]
    fn force_restart_requeues_the_same_plan() {
        let plan = MigrationPlan { rebuild_primary: false, indexes_to_rebuild: vec!["by_email".into()], indexes_to_delete: vec![] };
        assert_eq!(plan.force_restart(), plan);
    }

    #[test]
    fn rebuild_indexes_streams_progress_to_completion() {
        use crate::index::engine::InMemoryPageStore;
        let mut store = InMemoryPageStore::default();
        let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne)];
        let plan = MigrationPlan { rebuild_primary: false, indexes_to_rebuild: vec!["by_owner".into()], indexes_to_delete: vec![] };
        let entries = vec![
            (Key::Str("doc-1".into()), b"alice".to_vec()),
            (Key::Str("doc-2".into()), b"bob".to_vec()),
        ];
        let mut seen = Vec::new();
        let rebuilt = rebuild_indexes(
            &mut store,
            &entries,
            &plan,
            64,
            &declared,
            |_key, content| vec![("by_owner".to_string(), Key::Bytes(content.to_vec()))],
            |progress| seen.push(progress),
        )
        .unwrap();

        assert!(matches!(seen.first(), Some(MigrationProgress::Evaluating)));
        assert!(matches!(seen.last(), Some(MigrationProgress::Complete { total: 2 })));
        let SecondaryIndex::Reference(owner_index) = &rebuilt["by_owner"] else { panic!("expected a reference index") };
        let owners = crate::index::representation::IndexRepresentation::lookup(owner_index, &store, &Key::Bytes(b"alice".to_vec())).unwrap();
        assert_eq!(owners, vec![Key::Str("doc-1".into())]);
    }

    #[test]
    fn rebuild_indexes_builds_a_direct_representation_when_declared() {
        use crate::index::engine::InMemoryPageStore;
        let mut store = InMemoryPageStore::default();
        let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne).with_storage_kind(StorageKind::Direct)];
        let plan = MigrationPlan { rebuild_primary: false, indexes_to_rebuild: vec!["by_owner".into()], indexes_to_delete: vec![] };
        let entries = vec![(Key::Str("doc-1".into()), b"alice".to_vec())];
        let rebuilt = rebuild_indexes(
            &mut store,
            &entries,
            &plan,
            64,
            &declared,
            |_key, content| vec![("by_owner".to_string(), Key::Bytes(content.to_vec()))],
            |_| {},
        )
        .unwrap();

        let SecondaryIndex::Direct(owner_index) = &rebuilt["by_owner"] else { panic!("expected a direct index") };
        let found = owner_index.lookup_content(&store, &Key::Bytes(b"alice".to_vec())).unwrap();
        assert_eq!(found, vec![(Key::Str("doc-1".into()), b"alice".to_vec())]);
    }
}
