//! The datastore write/read path: persist to the primary index, then update every
//! secondary index the caller named values for, then hand back the event the
//! write produced. Callers buffer that event and publish it only once the write
//! is durably committed — this module never touches the observation bus itself.

use crate::datastore::core::{Datastore, SecondaryIndex};
use crate::errors::{Error, Result};
use crate::index::engine::PageStore;
use crate::index::representation::IndexRepresentation;
use crate::observation::event::{Event, EventKind};
use crate::types::Key;

/// Insert or overwrite `instance_key`'s content, updating every named secondary
/// index entry in `index_values`, and return the `Created`/`Updated` event the
/// write produced.
///
/// # Errors
/// Returns `Error::MissingIndex` if `index_values` names an index the datastore
/// doesn't declare, or propagates a page-store I/O failure.
pub fn put(
    datastore: &mut Datastore,
    store: &mut impl PageStore,
    instance_key: Key,
    content: Vec<u8>,
    index_values: &[(String, Key)],
    committed_version: u64,
) -> Result<Event> {
    let existed = datastore.primary.get(store, &instance_key)?.is_some();
    let content_for_direct = content.clone();
    datastore.primary.insert(store, instance_key.clone(), content)?;

    for (name, value) in index_values {
        let (_, representation) = datastore.secondary.get_mut(name).ok_or_else(|| Error::MissingIndex(name.clone()))?;
        match representation {
            SecondaryIndex::Reference(rep) => rep.insert(store, &instance_key, value)?,
            SecondaryIndex::SingleValued(rep) => rep.insert(store, &instance_key, value)?,
            SecondaryIndex::Direct(rep) => rep.insert(store, &instance_key, value, &content_for_direct)?,
        }
    }

    let kind = if existed { EventKind::Updated } else { EventKind::Created };
    Ok(Event { datastore: datastore.name.clone(), kind, instance_key, committed_version })
}

/// Remove `instance_key`, retracting it from every named secondary index entry
/// in `index_values`. Returns the `Deleted` event the write produced, or `None`
/// if the key wasn't present in the primary index.
///
/// # Errors
/// Returns an error if the primary or a named secondary index fails to update.
pub fn remove(
    datastore: &mut Datastore,
    store: &mut impl PageStore,
    instance_key: &Key,
    index_values: &[(String, Key)],
    committed_version: u64,
) -> Result<Option<Event>> {
    let removed = datastore.primary.remove(store, instance_key)?;
    if !removed {
        return Ok(None);
    }

    for (name, value) in index_values {
        if let Some((_, representation)) = datastore.secondary.get_mut(name) {
            match representation {
                SecondaryIndex::Reference(rep) => rep.remove(store, instance_key, value)?,
                SecondaryIndex::SingleValued(rep) => rep.remove(store, instance_key, value)?,
                SecondaryIndex::Direct(rep) => rep.remove(store, instance_key, value)?,
            }
        }
    }

    Ok(Some(Event {
        datastore: datastore.name.clone(),
        kind: EventKind::Deleted,
        instance_key: instance_key.clone(),
        committed_version,
    }))
}

/// Fetch an instance's content by key.
///
/// # Errors
/// Returns an error if the primary index's owning page is missing from `store`.
pub fn get(datastore: &Datastore, store: &impl PageStore, key: &Key) -> Result<Option<Vec<u8>>> {
    datastore.primary.get(store, key)
}

/// Look up the instance keys a named `Reference`/`SingleValued` secondary index
/// records for `indexed_value`.
///
/// # Errors
/// Returns `Error::MissingIndex` if no such index is declared, or
/// `Error::InvalidRange` if it's a `Direct` index (use `lookup_direct` instead).
pub fn lookup(datastore: &Datastore, store: &impl PageStore, index_name: &str, indexed_value: &Key) -> Result<Vec<Key>> {
    let (_, representation) = datastore.secondary.get(index_name).ok_or_else(|| Error::MissingIndex(index_name.to_string()))?;
    match representation {
        SecondaryIndex::Reference(rep) => rep.lookup(store, indexed_value),
        SecondaryIndex::SingleValued(rep) => rep.lookup(store, indexed_value),
        SecondaryIndex::Direct(_) => Err(Error::InvalidRange(format!("index {index_name:?} is a direct index; use lookup_direct"))),
    }
}

/// Look up the instance key/content pairs a named `Direct` secondary index
/// records for `indexed_value`, skipping a separate primary-index trip.
///
/// # Errors
/// Returns `Error::MissingIndex` if no such index is declared, or
/// `Error::InvalidRange` if it isn't a `Direct` index.
pub fn lookup_direct(datastore: &Datastore, store: &impl PageStore, index_name: &str, indexed_value: &Key) -> Result<Vec<(Key, Vec<u8>)>> {
    let (_, representation) = datastore.secondary.get(index_name).ok_or_else(|| Error::MissingIndex(index_name.to_string()))?;
    match representation {
        SecondaryIndex::Direct(rep) => rep.lookup_content(store, indexed_value),
        _ => Err(Error::InvalidRange(format!("index {index_name:?} is not a direct index"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::descriptor::{Cardinality, IndexSpec, StorageKind};
    use crate::index::engine::InMemoryPageStore;
    use serde_json::json;

    fn setup(declared: Vec<IndexSpec>) -> (Datastore, InMemoryPageStore) {
        let datastore = Datastore::new("docs", json!({}), "uuid", 64, declared).unwrap();
        (datastore, InMemoryPageStore::default())
    }

    #[test]
    fn put_emits_created_then_updated() {
        let (mut datastore, mut store) = setup(vec![IndexSpec::new("by_owner", Cardinality::ManyToOne)]);
        let key = Key::Str("doc-1".into());
        let index_values = [("by_owner".to_string(), Key::Str("alice".into()))];

        let event = put(&mut datastore, &mut store, key.clone(), b"v1".to_vec(), &index_values, 1).unwrap();
        assert_eq!(event.kind, EventKind::Created);
        let event = put(&mut datastore, &mut store, key.clone(), b"v2".to_vec(), &index_values, 2).unwrap();
        assert_eq!(event.kind, EventKind::Updated);

        assert_eq!(get(&datastore, &store, &key).unwrap(), Some(b"v2".to_vec()));
        assert_eq!(lookup(&datastore, &store, "by_owner", &Key::Str("alice".into())).unwrap(), vec![key]);
    }

    #[test]
    fn remove_retracts_from_secondary_index_and_reports_deleted() {
        let (mut datastore, mut store) = setup(vec![IndexSpec::new("by_owner", Cardinality::ManyToOne)]);
        let key = Key::Str("doc-1".into());
        let index_values = [("by_owner".to_string(), Key::Str("alice".into()))];
        put(&mut datastore, &mut store, key.clone(), b"v1".to_vec(), &index_values, 1).unwrap();

        let event = remove(&mut datastore, &mut store, &key, &index_values, 2).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Deleted);
        assert_eq!(get(&datastore, &store, &key).unwrap(), None);
        assert!(lookup(&datastore, &store, "by_owner", &Key::Str("alice".into())).unwrap().is_empty());
    }

    #[test]
    fn remove_of_an_absent_key_reports_no_event() {
        let (mut datastore, mut store) = setup(vec![]);
        let key = Key::Str("missing".into());
        assert!(remove(&mut datastore, &mut store, &key, &[], 1).unwrap().is_none());
    }

    #[test]
    fn put_with_undeclared_index_name_fails() {
        let (mut datastore, mut store) = setup(vec![]);
        let key = Key::Str("doc-1".into());
        let index_values = [("by_tag".to_string(), Key::Str("x".into()))];
        let result = put(&mut datastore, &mut store, key, b"v1".to_vec(), &index_values, 1);
        assert!(matches!(result, Err(Error::MissingIndex(name)) if name == "by_tag"));
    }

    #[test]
    fn direct_index_duplicates_content_for_lookup_without_a_primary_trip() {
        let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne).with_storage_kind(StorageKind::Direct)];
        let (mut datastore, mut store) = setup(declared);
        let key = Key::Str("doc-1".into());
        let index_values = [("by_owner".to_string(), Key::Str("alice".into()))];
        put(&mut datastore, &mut store, key.clone(), b"payload".to_vec(), &index_values, 1).unwrap();

        let found = lookup_direct(&datastore, &store, "by_owner", &Key::Str("alice".into())).unwrap();
        assert_eq!(found, vec![(key, b"payload".to_vec())]);
    }
}
