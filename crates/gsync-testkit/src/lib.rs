//! Test fixtures for the synchronization crates.
//!
//! - builders for the field-return "parcels" layout (`IDU`, `name`, `date_maj`)
//! - [`FlakyLayer`]: a [`Layer`] wrapper that refuses chosen operations
//!
//! Builders panic on malformed input; they are for tests only.

use chrono::NaiveDate;
use gsync_dataset::{
    Dataset, FieldType, Geometry, GeometryType, KeyValue, Layer, MemoryLayer, Record, Schema, Value,
};

mod flaky;

pub use flaky::FlakyLayer;

pub const KEY: &str = "IDU";
pub const DATE: &str = "date_maj";

/// `IDU: String, name: String, date_maj: Date`
pub fn parcels_schema() -> Schema {
    Schema::of(&[
        (KEY, FieldType::String),
        ("name", FieldType::String),
        (DATE, FieldType::Date),
    ])
}

/// Parse `YYYY-MM-DD`; empty text is null.
pub fn date(ymd: &str) -> Value {
    if ymd.is_empty() {
        return Value::Null;
    }
    let d = NaiveDate::parse_from_str(ymd, "%Y-%m-%d")
        .unwrap_or_else(|e| panic!("bad fixture date '{ymd}': {e}"));
    Value::Date(d)
}

pub fn parcel(idu: &str, name: &str, date_maj: &str) -> Record {
    Record::new(vec![Value::from(idu), Value::from(name), date(date_maj)])
}

/// Parcels dataset from `(IDU, name, date_maj)` rows.
pub fn parcels(name: &str, rows: &[(&str, &str, &str)]) -> Dataset {
    dataset(
        name,
        parcels_schema(),
        rows.iter().map(|(i, n, d)| parcel(i, n, d)).collect(),
    )
}

/// Point parcels: rows carry a WKT geometry as fourth element.
pub fn point_parcels(name: &str, rows: &[(&str, &str, &str, &str)]) -> Dataset {
    let mut ds = Dataset::new(name, parcels_schema()).with_geometry_type(GeometryType::Point);
    for (i, n, d, wkt) in rows {
        let rec = parcel(i, n, d).with_geometry(Geometry::from_wkt(wkt));
        ds.push(rec)
            .unwrap_or_else(|e| panic!("bad fixture row {i}: {e}"));
    }
    ds
}

pub fn dataset(name: &str, schema: Schema, rows: Vec<Record>) -> Dataset {
    let mut ds = Dataset::new(name, schema);
    for (n, rec) in rows.into_iter().enumerate() {
        ds.push(rec)
            .unwrap_or_else(|e| panic!("bad fixture row #{n}: {e}"));
    }
    ds
}

pub fn layer(ds: Dataset) -> MemoryLayer {
    MemoryLayer::new(ds)
}

/// Key values of the visible features, sorted.
pub fn keys_of<L: Layer + ?Sized>(layer: &L, key_field: &str) -> Vec<KeyValue> {
    let idx = layer
        .schema()
        .index_of(key_field)
        .unwrap_or_else(|| panic!("no field '{key_field}'"));
    let mut keys: Vec<KeyValue> = layer
        .features()
        .map(|(_, r)| r.value_at(idx).to_key())
        .collect();
    keys.sort();
    keys
}

/// Value of `field` on the visible feature whose `IDU` is `key`.
pub fn value_of<L: Layer + ?Sized>(layer: &L, key: &str, field: &str) -> Option<Value> {
    let schema = layer.schema();
    let k = schema.index_of(KEY)?;
    let f = schema.index_of(field)?;
    let wanted = KeyValue::from(key);
    layer
        .features()
        .find(|(_, r)| r.value_at(k).to_key() == wanted)
        .map(|(_, r)| r.value_at(f).clone())
}
