//! Serializing a datastore's current state to disk: every index's manifest under
//! its own named directory, then a fresh, dated root naming them all. Like every
//! other mutation in this crate, a commit never rewrites a file in place — it
//! always writes new, dated files and only then swings the pointer that names them.

use crate::datastore::core::{Datastore, SecondaryIndex};
use crate::errors::Result;
use crate::ids::DatedId;
use crate::index::descriptor::StorageKind;
use crate::index::engine::IndexEngine;
use crate::paths;
use crate::storage::root::DatastoreRoot;
use crate::utils::fsutil;
use std::collections::BTreeMap;
use std::path::Path;

fn engine_of(representation: &SecondaryIndex) -> &IndexEngine {
    match representation {
        SecondaryIndex::Reference(rep) => &rep.engine,
        SecondaryIndex::SingleValued(rep) => &rep.0.engine,
        SecondaryIndex::Direct(rep) => &rep.engine,
    }
}

/// Write `datastore`'s primary manifest, every secondary index's manifest, and a
/// new dated root naming them all, under `dir` (a datastore's directory within a
/// snapshot). Returns the root's filename, the value a committed `Iteration`
/// records for this datastore.
///
/// # Errors
/// Returns an error if any manifest or the root itself fails to serialize or write.
pub fn write_state(dir: &Path, datastore: &Datastore) -> Result<String> {
    let primary_dir = paths::primary_index(dir);
    std::fs::create_dir_all(&primary_dir)?;
    let primary_filename = format!("{}.manifest", DatedId::new());
    fsutil::atomic_write(&primary_dir.join(&primary_filename), &datastore.primary.manifest.to_bytes()?)?;

    let mut secondary_manifest_versions = BTreeMap::new();
    for (name, (spec, representation)) in &datastore.secondary {
        let index_dir = match spec.storage_kind {
            StorageKind::Direct => paths::direct_index(dir, name),
            StorageKind::Reference => paths::reference_index(dir, name),
        };
        std::fs::create_dir_all(&index_dir)?;
        let engine = engine_of(representation);
        let filename = format!("{}.manifest", DatedId::new());
        fsutil::atomic_write(&index_dir.join(&filename), &engine.manifest.to_bytes()?)?;
        secondary_manifest_versions.insert(name.clone(), engine.manifest.version);
    }

    let mut root = DatastoreRoot::new(datastore.name.clone(), datastore.schema_descriptor.clone())
        .with_primary_manifest(datastore.primary.manifest.version, 0)
        .with_identifier_kind(datastore.identifier_kind.clone())
        .with_secondary_index_kinds(datastore.index_kind_tags());
    for (name, version) in secondary_manifest_versions {
        root = root.with_secondary_manifest(&name, version);
    }

    let root_dir = paths::datastore_root(dir);
    std::fs::create_dir_all(&root_dir)?;
    let root_filename = DatastoreRoot::dated_filename();
    fsutil::atomic_write(&root_dir.join(&root_filename), &root.to_bytes()?)?;
    Ok(root_filename)
}
