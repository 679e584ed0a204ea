//! A copy-on-write, page-oriented persistence core: named datastores, each with a
//! primary index and any number of caller-declared secondary indexes, committed
//! through a single-writer/many-reader transaction coordinator and observed
//! through a per-datastore event bus.

pub mod config;
pub mod datastore;
pub mod errors;
pub mod ids;
pub mod index;
pub mod observation;
pub mod paths;
pub mod snapshot;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod utils;

use crate::config::Config;
use crate::datastore::core::Datastore;
use crate::errors::{Error, Result};
use crate::index::descriptor::IndexSpec;
use crate::index::engine::FilePageStore;
use crate::observation::bus::ObservationBus;
use crate::observation::event::Event;
use crate::observation::event::EventKind;
use crate::snapshot::iteration::{Iteration, IterationLog};
use crate::transaction::coordinator::TransactionCoordinator;
use crate::types::Key;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Information persisted once at a root's creation and never rewritten.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RootInfo {
    created_at: String,
}

/// The top-level handle applications open against a persistence root on disk.
/// Owns the transaction coordinator, the observation bus, and every registered
/// datastore's in-memory index state. Writes buffer their observation events
/// until `commit_iteration` durably records them, so a subscriber never sees an
/// event for a write that a crash could still roll back.
pub struct Persistence {
    root: PathBuf,
    config: Config,
    coordinator: TransactionCoordinator,
    bus: ObservationBus,
    datastores: Mutex<HashMap<String, Datastore>>,
    page_stores: Mutex<HashMap<String, FilePageStore>>,
    pending_events: Mutex<Vec<Event>>,
    snapshot_dir: PathBuf,
    iterations: IterationLog,
}

impl Persistence {
    /// Open (creating if necessary) a persistence root at `root` with `config`.
    ///
    /// # Errors
    /// Returns an error if the root's directory structure or `Info.json` can't be written.
    pub fn open(root: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let info_path = paths::info_json(&root);
        if !info_path.exists() {
            let info = RootInfo { created_at: ids::DatedId::new().to_string() };
            utils::fsutil::atomic_write(&info_path, &serde_json::to_vec_pretty(&info)?)?;
        }
        utils::logger::init_for_persistence(&root).map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let snapshot_dir = root.join("Snapshots").join("_root");
        Ok(Self {
            iterations: IterationLog::new(paths::iterations_dir(&snapshot_dir)),
            root,
            config,
            coordinator: TransactionCoordinator::new(),
            bus: ObservationBus::default(),
            datastores: Mutex::new(HashMap::new()),
            page_stores: Mutex::new(HashMap::new()),
            pending_events: Mutex::new(Vec::new()),
            snapshot_dir,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a new datastore with its secondary indexes declared up front,
    /// backing it with a real `Pages/` directory under the snapshot root.
    ///
    /// # Errors
    /// Returns `Error::DuplicateIndexName` if `declared` names an index twice,
    /// or an error if the datastore's page directory can't be opened.
    pub fn register_datastore(
        &self,
        name: impl Into<String>,
        schema_descriptor: serde_json::Value,
        identifier_kind: impl Into<String>,
        declared: Vec<IndexSpec>,
    ) -> Result<()> {
        let name = name.into();
        let datastore = Datastore::new(name.clone(), schema_descriptor, identifier_kind, self.config.page_size, declared)?;
        let datastore_dir = paths::datastore_dir(&self.snapshot_dir, &name);
        let page_store = FilePageStore::open(paths::pages_dir(&datastore_dir))?;
        self.datastores.lock().insert(name.clone(), datastore);
        self.page_stores.lock().insert(name, page_store);
        Ok(())
    }

    /// Subscribe to commit events for `datastore`. The returned receiver
    /// buffers unboundedly — a slow subscriber never causes another
    /// subscriber's events to be dropped.
    #[must_use]
    pub fn subscribe(&self, datastore: &str) -> tokio::sync::mpsc::UnboundedReceiver<Event> {
        self.bus.subscribe(datastore)
    }

    /// Write `content` under `instance_key` in `datastore`, updating any named
    /// secondary indexes, inside one admitted write transaction. The resulting
    /// observation event is buffered, not published, until `commit_iteration`
    /// makes this write durable.
    ///
    /// # Errors
    /// Returns `Error::DatastoreKeyNotFound` if no such datastore is registered,
    /// `Error::MissingIndex` if `index_values` names an undeclared index, or
    /// propagates a nested-transaction or page-store failure.
    pub async fn put(
        &self,
        datastore: &str,
        instance_key: Key,
        content: Vec<u8>,
        index_values: &[(String, Key)],
    ) -> Result<EventKind> {
        let guard = self.coordinator.begin_write().await?;
        let mut datastores = self.datastores.lock();
        let store_entry = datastores.get_mut(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        let mut page_stores = self.page_stores.lock();
        let pages = page_stores.get_mut(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        let event = datastore::ops::put(store_entry, pages, instance_key, content, index_values, guard.commit())?;
        let kind = event.kind;
        self.pending_events.lock().push(event);
        Ok(kind)
    }

    /// Remove `instance_key` from `datastore`, retracting it from any named
    /// secondary indexes, inside one admitted write transaction. The resulting
    /// observation event (if the key was present) is buffered until
    /// `commit_iteration`.
    ///
    /// # Errors
    /// Returns `Error::DatastoreKeyNotFound` if no such datastore is registered,
    /// or propagates a nested-transaction or page-store failure.
    pub async fn remove(&self, datastore: &str, instance_key: &Key, index_values: &[(String, Key)]) -> Result<bool> {
        let guard = self.coordinator.begin_write().await?;
        let mut datastores = self.datastores.lock();
        let store_entry = datastores.get_mut(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        let mut page_stores = self.page_stores.lock();
        let pages = page_stores.get_mut(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        let event = datastore::ops::remove(store_entry, pages, instance_key, index_values, guard.commit())?;
        let removed = event.is_some();
        if let Some(event) = event {
            self.pending_events.lock().push(event);
        }
        Ok(removed)
    }

    /// Read `instance_key`'s content from `datastore`, pinned to the currently
    /// committed version.
    ///
    /// # Errors
    /// Returns `Error::DatastoreKeyNotFound` if no such datastore is registered.
    pub fn get(&self, datastore: &str, instance_key: &Key) -> Result<Option<Vec<u8>>> {
        let _read = self.coordinator.begin_read();
        let datastores = self.datastores.lock();
        let store_entry = datastores.get(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        let page_stores = self.page_stores.lock();
        let pages = page_stores.get(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        datastore::ops::get(store_entry, pages, instance_key)
    }

    /// Look up instance keys a named secondary index records for `indexed_value`.
    ///
    /// # Errors
    /// Returns `Error::DatastoreKeyNotFound` or `Error::MissingIndex` as appropriate.
    pub fn lookup(&self, datastore: &str, index_name: &str, indexed_value: &Key) -> Result<Vec<Key>> {
        let _read = self.coordinator.begin_read();
        let datastores = self.datastores.lock();
        let store_entry = datastores.get(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        let page_stores = self.page_stores.lock();
        let pages = page_stores.get(datastore).ok_or_else(|| Error::DatastoreKeyNotFound(datastore.to_string()))?;
        datastore::ops::lookup(store_entry, pages, index_name, indexed_value)
    }

    /// Commit a new snapshot iteration: write every registered datastore's
    /// current primary/secondary manifests and a fresh root to disk, link the
    /// iteration to its parent, swing `HEAD` to it, and only then flush every
    /// event buffered since the last commit to the observation bus.
    ///
    /// # Errors
    /// Returns an error if a datastore's state or the iteration log cannot be written.
    pub fn commit_iteration(&self) -> Result<Iteration> {
        let parent = self.iterations.head()?;
        let mut iteration = Iteration::new(parent.as_ref());

        let datastores = self.datastores.lock();
        for (name, datastore) in datastores.iter() {
            let datastore_dir = paths::datastore_dir(&self.snapshot_dir, name);
            let root_filename = datastore::persist::write_state(&datastore_dir, datastore)?;
            crate::dev6!("commit_iteration: wrote root {root_filename:?} for datastore {name:?}");
            iteration = iteration.with_datastore_root(name, &root_filename);
        }
        drop(datastores);

        self.iterations.commit(&iteration)?;

        let events: Vec<Event> = self.pending_events.lock().drain(..).collect();
        crate::dev6!("commit_iteration: flushing {} buffered event(s) after durable commit", events.len());
        for event in events {
            self.bus.publish(event);
        }

        Ok(iteration)
    }
}
