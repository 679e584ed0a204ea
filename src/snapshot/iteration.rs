//! The commit history of a snapshot: an immutable, DAG-linked chain of iterations,
//! each naming the current root per datastore plus what pages it added and
//! removed. The "current" pointer is swung atomically via `fsutil::atomic_write`'s
//! write-temp-file-then-rename dance.

use crate::errors::{Error, Result};
use crate::ids::DatedId;
use crate::utils::fsutil;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// One committed point in a snapshot's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub id: String,
    pub parent: Option<String>,
    /// Datastore name to the filename of its root as of this iteration.
    pub datastore_roots: BTreeMap<String, String>,
    /// Datastore name to page ids newly written in this iteration.
    pub added_pages: BTreeMap<String, Vec<u64>>,
    /// Datastore name to page ids no longer referenced as of this iteration.
    pub removed_pages: BTreeMap<String, Vec<u64>>,
}

impl Iteration {
    #[must_use]
    pub fn new(parent: Option<&Iteration>) -> Self {
        Self {
            id: DatedId::new().to_string(),
            parent: parent.map(|p| p.id.clone()),
            datastore_roots: parent.map(|p| p.datastore_roots.clone()).unwrap_or_default(),
            added_pages: BTreeMap::new(),
            removed_pages: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_datastore_root(mut self, datastore: &str, root_filename: &str) -> Self {
        self.datastore_roots.insert(datastore.to_string(), root_filename.to_string());
        self
    }

    #[must_use]
    pub fn with_added_pages(mut self, datastore: &str, page_ids: Vec<u64>) -> Self {
        self.added_pages.entry(datastore.to_string()).or_default().extend(page_ids);
        self
    }

    #[must_use]
    pub fn with_removed_pages(mut self, datastore: &str, page_ids: Vec<u64>) -> Self {
        self.removed_pages.entry(datastore.to_string()).or_default().extend(page_ids);
        self
    }
}

const HEAD_FILE: &str = "HEAD";

/// Manages the on-disk iteration chain under one snapshot's `Iterations/` directory.
#[derive(Debug, Clone)]
pub struct IterationLog {
    dir: PathBuf,
}

impl IterationLog {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The path an iteration with this id is (or would be) committed to.
    #[must_use]
    pub fn iteration_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn head_path(&self) -> PathBuf {
        self.dir.join(HEAD_FILE)
    }

    /// Persist `iteration` to disk, then atomically swing the `HEAD` pointer to it.
    /// The iteration file itself is never overwritten once written.
    ///
    /// # Errors
    /// Returns an error if serialization or either atomic write fails.
    pub fn commit(&self, iteration: &Iteration) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(iteration)?;
        fsutil::atomic_write(&self.iteration_path(&iteration.id), &bytes)?;
        fsutil::atomic_write(&self.head_path(), iteration.id.as_bytes())?;
        Ok(())
    }

    /// Load the iteration the `HEAD` pointer currently names, if any has been committed.
    ///
    /// # Errors
    /// Returns an error if the pointer or the iteration it names can't be read.
    pub fn head(&self) -> Result<Option<Iteration>> {
        match std::fs::read_to_string(self.head_path()) {
            Ok(id) => Ok(Some(self.read(id.trim())?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Load one iteration by id.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if no such iteration file exists or it fails to parse.
    pub fn read(&self, id: &str) -> Result<Iteration> {
        let path = self.iteration_path(id);
        let bytes = std::fs::read(&path).map_err(|_| Error::Corrupt(format!("no iteration file for id {id:?}")))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Walk the DAG from `from` back to its root, inclusive, oldest last.
    ///
    /// # Errors
    /// Returns an error if any ancestor named in the chain cannot be read.
    pub fn ancestry(&self, from: &Iteration) -> Result<Vec<Iteration>> {
        let mut chain = vec![from.clone()];
        let mut current = from.clone();
        while let Some(parent_id) = current.parent.clone() {
            let parent = self.read(&parent_id)?;
            chain.push(parent.clone());
            current = parent;
        }
        Ok(chain)
    }
}

impl FromStr for Iteration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
