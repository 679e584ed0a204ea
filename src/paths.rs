//! Path construction for the on-disk persistence layout, kept in one place rather
//! than inlining `join` calls at every call site.

use crate::ids::DatedId;
use std::path::{Path, PathBuf};

#[must_use]
pub fn info_json(root: &Path) -> PathBuf {
    root.join("Info.json")
}

#[must_use]
pub fn snapshot_dir(root: &Path, id: &DatedId) -> PathBuf {
    let ts = id.timestamp().unwrap_or_else(|_| chrono::Utc::now());
    root.join("Snapshots")
        .join(ts.format("%Y").to_string())
        .join(ts.format("%m-%d").to_string())
        .join(ts.format("%H-%M").to_string())
        .join(format!("{id}.snapshot"))
}

#[must_use]
pub fn snapshot_manifest(snapshot: &Path) -> PathBuf {
    snapshot.join("Manifest.json")
}

#[must_use]
pub fn snapshot_inbox(snapshot: &Path) -> PathBuf {
    snapshot.join("Inbox")
}

#[must_use]
pub fn datastore_dir(snapshot: &Path, datastore_id: &str) -> PathBuf {
    snapshot.join("Datastores").join(datastore_id)
}

#[must_use]
pub fn datastore_root(datastore: &Path) -> PathBuf {
    datastore.join("Root")
}

#[must_use]
pub fn primary_index(datastore: &Path) -> PathBuf {
    datastore.join("PrimaryIndex")
}

#[must_use]
pub fn direct_index(datastore: &Path, name: &str) -> PathBuf {
    datastore.join("DirectIndex").join(name)
}

#[must_use]
pub fn reference_index(datastore: &Path, name: &str) -> PathBuf {
    datastore.join("ReferenceIndex").join(name)
}

#[must_use]
pub fn pages_dir(datastore: &Path) -> PathBuf {
    datastore.join("Pages")
}

#[must_use]
pub fn page_file(datastore: &Path, page_id: &str) -> PathBuf {
    pages_dir(datastore).join(page_id)
}

#[must_use]
pub fn iterations_dir(snapshot: &Path) -> PathBuf {
    snapshot.join("Iterations")
}
