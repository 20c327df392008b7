//! Hashing determinism of the layered configuration.
//!
//! GREEN when:
//! - the same inputs give the same hash;
//! - key order inside a document does not change the hash;
//! - different values give different hashes;
//! - an overlay actually overrides the base.

use gsync_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
sync:
  key_field: "IDU"
  date_field: "date_maj"
  gate_by_date: false
  ignored_fields: ["fid"]
source:
  accepted_extensions: [".json", ".csv"]
"#;

const BASE_YAML_REORDERED: &str = r#"
source:
  accepted_extensions: [".json", ".csv"]
sync:
  ignored_fields: ["fid"]
  gate_by_date: false
  date_field: "date_maj"
  key_field: "IDU"
"#;

const OVERLAY_YAML: &str = r#"
sync:
  gate_by_date: true
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(original.config_hash, reordered.config_hash);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "sync:\n  key_field: \"ID\"\n"]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_changes_typed_view() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert!(!base.sync_config().unwrap().gate_by_date);
    let cfg = merged.sync_config().unwrap();
    assert!(cfg.gate_by_date);
    assert_eq!(cfg.key_field, "IDU", "sibling keys survive the overlay");
    assert_ne!(base.config_hash, merged.config_hash);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
