use gsync_dataset::{KeyValue, Value};
use gsync_reconcile::*;
use gsync_testkit::{date, layer, parcels, value_of, DATE, KEY};

fn gated() -> MergeOptions {
    MergeOptions::date_gated(KEY, DATE)
}

#[test]
fn scenario_field_return_with_newer_dates() {
    // Main layer has A1; the field copy renamed A1 and added A2.
    let mut target = layer(parcels("main", &[("A1", "x", "2024-01-01")]));
    let source = parcels(
        "field",
        &[("A1", "y", "2024-06-01"), ("A2", "z", "2024-01-01")],
    );

    let report = synchronize(&source, &mut target, &gated()).unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.stale_skipped, 0);
    assert_eq!(target.dataset().len(), 2);
    assert_eq!(value_of(&target, "A1", "name"), Some(Value::from("y")));
    assert_eq!(value_of(&target, "A1", DATE), Some(date("2024-06-01")));

    let a1 = report.update_for(&KeyValue::from("A1")).unwrap();
    let changed = a1.field(DATE).unwrap();
    assert_eq!(changed.old, date("2024-01-01"));
    assert_eq!(changed.new, date("2024-06-01"));
}

#[test]
fn older_or_equal_source_date_is_skipped() {
    let mut target = layer(parcels(
        "main",
        &[("A1", "kept", "2024-06-01"), ("A2", "kept too", "2024-06-01")],
    ));
    let source = parcels(
        "field",
        &[("A1", "older", "2024-01-01"), ("A2", "same day", "2024-06-01")],
    );
    let before = target.dataset().clone();

    let report = synchronize(&source, &mut target, &gated()).unwrap();

    assert!(report.is_noop());
    assert_eq!(report.stale_skipped, 2);
    assert_eq!(target.dataset(), &before);
}

#[test]
fn null_dates_follow_the_documented_rule() {
    let mut target = layer(parcels(
        "main",
        &[("A1", "a", "2024-01-01"), ("A2", "b", "")],
    ));
    // A1: null source date never wins. A2: any date beats a null target date.
    let source = parcels("field", &[("A1", "a2", ""), ("A2", "b2", "2020-01-01")]);

    let report = synchronize(&source, &mut target, &gated()).unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.stale_skipped, 1);
    assert_eq!(value_of(&target, "A1", "name"), Some(Value::from("a")));
    assert_eq!(value_of(&target, "A2", "name"), Some(Value::from("b2")));
}

#[test]
fn same_data_applies_without_gating() {
    let mut target = layer(parcels("main", &[("A1", "kept", "2024-06-01")]));
    let source = parcels("field", &[("A1", "older", "2024-01-01")]);

    let report = synchronize(&source, &mut target, &MergeOptions::plain(KEY)).unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(value_of(&target, "A1", "name"), Some(Value::from("older")));
}

#[test]
fn missing_date_field_blocks_the_merge() {
    let mut target = layer(parcels("main", &[("A1", "a", "2024-01-01")]));
    let source = parcels("field", &[("A1", "b", "2024-06-01")]);

    let err = synchronize(&source, &mut target, &MergeOptions::date_gated(KEY, "modified"))
        .unwrap_err();

    let SyncError::Blocked(issues) = err else {
        panic!("expected a blocked gate, got {err:?}");
    };
    assert_eq!(issues.len(), 2);
    assert!(issues
        .iter()
        .all(|i| matches!(i, GateIssue::MissingDateField { field, .. } if field == "modified")));
    assert_eq!(value_of(&target, "A1", "name"), Some(Value::from("a")));
}
