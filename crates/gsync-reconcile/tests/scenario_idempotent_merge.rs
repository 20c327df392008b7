use gsync_dataset::{KeyValue, Value};
use gsync_reconcile::*;
use gsync_testkit::{layer, parcels, value_of, KEY};

fn source() -> gsync_dataset::Dataset {
    parcels(
        "field",
        &[
            ("A1", "renamed", "2024-06-01"),
            ("A2", "same", "2024-01-01"),
            ("A9", "fresh", "2024-06-01"),
        ],
    )
}

fn target() -> gsync_dataset::MemoryLayer {
    layer(parcels(
        "main",
        &[("A1", "original", "2024-01-01"), ("A2", "same", "2024-01-01")],
    ))
}

#[test]
fn equal_records_are_not_counted() {
    let mut t = target();
    let report = merge(&source(), &mut t, &MergeOptions::plain(KEY)).unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert!(report.update_for(&KeyValue::from("A2")).is_none());

    let a1 = report.update_for(&KeyValue::from("A1")).unwrap();
    let changed: Vec<&str> = a1.fields.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(changed, ["name", "date_maj"], "schema order, not alphabetical");
    let name = a1.field("name").unwrap();
    assert_eq!(name.old, Value::from("original"));
    assert_eq!(name.new, Value::from("renamed"));
    assert_eq!(value_of(&t, "A1", "name"), Some(Value::from("renamed")));
}

#[test]
fn scenario_second_merge_is_a_noop() {
    let mut t = target();
    let opts = MergeOptions::plain(KEY);

    let first = merge(&source(), &mut t, &opts).unwrap();
    assert!(!first.is_noop());
    let after_first = t.dataset().clone();

    let second = merge(&source(), &mut t, &opts).unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 0);
    assert!(second.is_noop());
    assert_eq!(t.dataset(), &after_first);
}

#[test]
fn key_value_is_never_rewritten() {
    let mut t = target();
    merge(&source(), &mut t, &MergeOptions::plain(KEY)).unwrap();
    let keys: Vec<String> = t
        .dataset()
        .column(KEY)
        .unwrap()
        .map(ToString::to_string)
        .collect();
    assert_eq!(keys, vec!["A1", "A2", "A9"]);
}
