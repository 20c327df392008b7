use gsync_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const WITH_TYPO: &str = r#"
sync:
  key_field: "IDU"
  gate_by_dat: true
viewer:
  theme: dark
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[WITH_TYPO]).unwrap();

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/sync/gate_by_dat".to_string(), "/viewer/theme".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[WITH_TYPO]).unwrap();

    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();

    let msg = format!("{err:?}");
    assert!(msg.contains("CONFIG_UNUSED_KEYS"));
    assert!(msg.contains("/sync/gate_by_dat"));
}

#[test]
fn list_entries_are_covered_by_their_parent_key() {
    let yaml = r#"
sync:
  ignored_fields: ["fid", "ogc_fid"]
source:
  accepted_extensions: [".csv"]
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.consumed_prefixes.len(), 5);
}
