use gsync_dataset::{KeyValue, Layer};
use gsync_reconcile::*;
use gsync_testkit::{keys_of, layer, parcels, KEY};

#[test]
fn scenario_disjoint_keys_insert_every_source_record() {
    let source = parcels(
        "field",
        &[("A2", "b", "2024-01-01"), ("A3", "c", ""), ("A4", "d", "2023-05-01")],
    );
    let mut target = layer(parcels("main", &[("A1", "a", "2024-01-01")]));

    let report = merge(&source, &mut target, &MergeOptions::plain(KEY)).unwrap();

    assert_eq!(report.inserted, source.len());
    assert_eq!(report.updated, 0);
    assert!(report.updated_records.is_empty());
    assert!(report.failures.is_empty());
    assert!(!target.is_editing());
    assert_eq!(
        keys_of(&target, KEY),
        vec![
            KeyValue::from("A1"),
            KeyValue::from("A2"),
            KeyValue::from("A3"),
            KeyValue::from("A4"),
        ]
    );
}

#[test]
fn inserted_records_keep_their_key_and_values() {
    let source = parcels("field", &[("B7", "new parcel", "2024-02-02")]);
    let mut target = layer(parcels("main", &[]));

    merge(&source, &mut target, &MergeOptions::plain(KEY)).unwrap();

    assert_eq!(target.dataset().records(), source.records());
}
