use cowstore::config::Retention;
use cowstore::snapshot::gc::plan_from_log;
use cowstore::snapshot::iteration::{Iteration, IterationLog};

#[test]
fn plan_from_log_reflects_a_real_committed_chain() {
    let dir = tempfile::tempdir().unwrap();
    let log = IterationLog::new(dir.path().to_path_buf());

    let first = Iteration::new(None)
        .with_datastore_root("users", "root-a")
        .with_added_pages("users", vec![1, 2, 3]);
    log.commit(&first).unwrap();

    let second = Iteration::new(Some(&first))
        .with_datastore_root("users", "root-b")
        .with_added_pages("users", vec![4])
        .with_removed_pages("users", vec![1]);
    log.commit(&second).unwrap();

    let third = Iteration::new(Some(&second))
        .with_datastore_root("users", "root-c")
        .with_added_pages("users", vec![5]);
    log.commit(&third).unwrap();

    let plan = plan_from_log(&log, Retention::KeepAll).unwrap().unwrap();
    assert_eq!(plan.retained_iterations, vec![third.id.clone(), second.id.clone(), first.id.clone()]);
    assert!(plan.collectible_iterations.is_empty());
    assert_eq!(plan.reachable_pages["users"], std::collections::BTreeSet::from([2, 3, 4, 5]));
}

#[test]
fn keep_latest_one_against_a_real_log_collects_older_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let log = IterationLog::new(dir.path().to_path_buf());

    let first = Iteration::new(None).with_added_pages("orders", vec![1]);
    log.commit(&first).unwrap();
    let second = Iteration::new(Some(&first)).with_added_pages("orders", vec![2]);
    log.commit(&second).unwrap();

    let plan = plan_from_log(&log, Retention::KeepLatest(1)).unwrap().unwrap();
    assert_eq!(plan.retained_iterations, vec![second.id]);
    assert_eq!(plan.collectible_iterations, vec![first.id]);
    assert_eq!(plan.reachable_pages["orders"], std::collections::BTreeSet::from([2]));
}

#[test]
fn an_empty_log_has_no_plan() {
    let dir = tempfile::tempdir().unwrap();
    let log = IterationLog::new(dir.path().to_path_buf());
    assert!(plan_from_log(&log, Retention::KeepAll).unwrap().is_none());
}
