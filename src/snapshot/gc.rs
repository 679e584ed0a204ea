//! Garbage collection: decide which iterations to retain, then walk their page
//! references to find everything still reachable so the rest can be deleted, and
//! finally enact that plan by actually removing the collectible files.

use crate::config::Retention;
use crate::errors::{Error, Result};
use crate::snapshot::iteration::{Iteration, IterationLog};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

/// The outcome of a collection pass: what to keep, and what's safe to delete.
#[derive(Debug, Clone, Default)]
pub struct CollectionPlan {
    pub retained_iterations: Vec<String>,
    pub reachable_pages: HashMap<String, BTreeSet<u64>>,
    pub collectible_iterations: Vec<String>,
}

/// Walk `chain` (newest first, as returned by `IterationLog::ancestry`) and decide
/// which iterations `retention` keeps, then union the page ids reachable from the
/// retained set per datastore.
#[must_use]
pub fn plan(chain: &[Iteration], retention: Retention) -> CollectionPlan {
    let keep_count = match retention {
        Retention::KeepAll => chain.len(),
        Retention::KeepLatest(k) => k.min(chain.len()),
    };
    let (retained, collectible) = chain.split_at(keep_count);

    let mut reachable: HashMap<String, BTreeSet<u64>> = HashMap::new();
    for iteration in retained.iter().rev() {
        for (datastore, pages) in &iteration.added_pages {
            reachable.entry(datastore.clone()).or_default().extend(pages.iter().copied());
        }
        for (datastore, pages) in &iteration.removed_pages {
            if let Some(set) = reachable.get_mut(datastore) {
                for page in pages {
                    set.remove(page);
                }
            }
        }
    }

    CollectionPlan {
        retained_iterations: retained.iter().map(|i| i.id.clone()).collect(),
        reachable_pages: reachable,
        collectible_iterations: collectible.iter().map(|i| i.id.clone()).collect(),
    }
}

/// Build a plan by reading the full ancestry from a log's current head.
///
/// # Errors
/// Returns an error if the iteration chain cannot be read.
pub fn plan_from_log(log: &IterationLog, retention: Retention) -> Result<Option<CollectionPlan>> {
    let Some(head) = log.head()? else { return Ok(None) };
    let chain = log.ancestry(&head)?;
    Ok(Some(plan(&chain, retention)))
}

/// Enact `plan`: delete every collectible iteration file from `log`, then delete
/// every page file under each named datastore's `Pages/` directory that isn't in
/// `plan.reachable_pages`. A datastore absent from `datastore_dirs` or with no
/// `Pages/` directory yet is skipped rather than treated as an error.
///
/// # Errors
/// Returns an error if an iteration or page file exists but cannot be removed.
pub fn enact(log: &IterationLog, datastore_dirs: &HashMap<String, PathBuf>, plan: &CollectionPlan) -> Result<()> {
    for id in &plan.collectible_iterations {
        let path = log.iteration_path(id);
        crate::dev6!("gc::enact: removing collectible iteration {id:?} at {path:?}");
        remove_file_if_present(&path)?;
    }

    for (datastore, dir) in datastore_dirs {
        let pages_dir = crate::paths::pages_dir(dir);
        let Ok(entries) = std::fs::read_dir(&pages_dir) else { continue };
        let reachable = plan.reachable_pages.get(datastore);
        for entry in entries.flatten() {
            let Some(page_id) = entry.file_name().to_str().and_then(|s| s.parse::<u64>().ok()) else { continue };
            if reachable.is_some_and(|set| set.contains(&page_id)) {
                continue;
            }
            crate::dev6!("gc::enact: removing unreachable page {page_id} for datastore {datastore:?}");
            remove_file_if_present(&entry.path())?;
        }
    }
    Ok(())
}

fn remove_file_if_present(path: &std::path::Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
