use cowstore::datastore::core::SecondaryIndex;
use cowstore::datastore::migration::{rebuild_indexes_from_primary, warm_up, LiveSchema, MigrationProgress, PersistedSchema};
use cowstore::index::descriptor::{Cardinality, IndexSpec};
use cowstore::index::engine::{IndexEngine, InMemoryPageStore};
use cowstore::index::representation::IndexRepresentation;
use cowstore::types::{Key, NaturalVersionOrd};
use serde_json::json;
use std::collections::BTreeMap;

#[test]
fn a_schema_version_bump_triggers_a_full_rebuild_from_a_populated_primary_index() {
    let mut store = InMemoryPageStore::default();
    let mut primary = IndexEngine::new(64);
    primary.insert(&mut store, Key::Str("doc-1".into()), b"{\"owner\":\"alice\"}".to_vec()).unwrap();
    primary.insert(&mut store, Key::Str("doc-2".into()), b"{\"owner\":\"bob\"}".to_vec()).unwrap();
    primary.insert(&mut store, Key::Str("doc-3".into()), b"{\"owner\":\"alice\"}".to_vec()).unwrap();

    let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne)];
    let persisted = PersistedSchema { version: json!(1), identifier_kind: "uuid".to_string(), indexes: BTreeMap::new() };
    let live = LiveSchema { max_supported_version: &json!(2), identifier_kind: "uuid", declared: &declared };
    let plan = warm_up(&persisted, &live, &NaturalVersionOrd).unwrap();
    assert_eq!(plan.indexes_to_rebuild, vec!["by_owner".to_string()]);

    let mut progress = Vec::new();
    let rebuilt = rebuild_indexes_from_primary(
        &mut store,
        &primary,
        &plan,
        64,
        &declared,
        |_key, content| {
            let owner = content.windows(5).position(|w| w == b"alice").map_or("bob", |_| "alice");
            vec![("by_owner".to_string(), Key::Str(owner.to_string()))]
        },
        |p| progress.push(p),
    )
    .unwrap();

    assert!(matches!(progress.last(), Some(MigrationProgress::Complete { total: 3 })));

    let SecondaryIndex::Reference(by_owner) = &rebuilt["by_owner"] else { panic!("expected a reference index") };
    let mut alice_docs = IndexRepresentation::lookup(by_owner, &store, &Key::Str("alice".into())).unwrap();
    alice_docs.sort();
    assert_eq!(alice_docs, vec![Key::Str("doc-1".into()), Key::Str("doc-3".into())]);
}

#[test]
fn identical_schema_skips_migration_entirely() {
    let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne)];
    let indexes = BTreeMap::from([("by_owner".to_string(), "ManyToOne:Reference".to_string())]);
    let persisted = PersistedSchema { version: json!(4), identifier_kind: "uuid".to_string(), indexes };
    let live = LiveSchema { max_supported_version: &json!(4), identifier_kind: "uuid", declared: &declared };
    let plan = warm_up(&persisted, &live, &NaturalVersionOrd).unwrap();
    assert!(plan.is_empty());
}

#[test]
fn force_restart_after_partial_progress_requeues_the_identical_plan() {
    let declared = vec![IndexSpec::new("by_owner", Cardinality::ManyToOne), IndexSpec::new("by_tag", Cardinality::OneToMany)];
    let persisted = PersistedSchema { version: json!(1), identifier_kind: "uuid".to_string(), indexes: BTreeMap::new() };
    let live = LiveSchema { max_supported_version: &json!(2), identifier_kind: "uuid", declared: &declared };
    let plan = warm_up(&persisted, &live, &NaturalVersionOrd).unwrap();
    let restarted = plan.force_restart();
    assert_eq!(plan, restarted);
}

#[test]
fn a_persisted_version_ahead_of_this_build_is_rejected() {
    let persisted = PersistedSchema { version: json!(9), identifier_kind: "uuid".to_string(), indexes: BTreeMap::new() };
    let live = LiveSchema { max_supported_version: &json!(2), identifier_kind: "uuid", declared: &[] };
    assert!(warm_up(&persisted, &live, &NaturalVersionOrd).is_err());
}
