//! Layered YAML configuration for the synchronization tools.
//!
//! Documents are merged in order (later documents override earlier ones),
//! converted to JSON, canonicalized and hashed. The hash identifies the
//! effective configuration in logs and reports.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

mod consumption;
mod sync;

pub use consumption::{consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};
pub use sync::SyncConfig;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// No document at all: every typed setting takes its default.
    pub fn empty() -> Self {
        let config_json = serde_json::json!({});
        let canonical_json = config_json.to_string();
        Self {
            config_hash: sha256_hex(canonical_json.as_bytes()),
            canonical_json,
            config_json,
        }
    }

    pub fn sync_config(&self) -> Result<SyncConfig> {
        SyncConfig::from_config_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (n, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml (layer #{n})"))?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty document parses as null; it contributes nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Compact JSON with object keys in sorted order at every level.
fn canonicalize_json(v: &Value) -> Result<String> {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).context("canonical json serialize failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layers_override_scalars_and_keep_siblings() {
        let cfg = load_layered_yaml_from_strings(&[
            "sync:\n  key_field: IDU\n  gate_by_date: false\n",
            "sync:\n  gate_by_date: true\n",
        ])
        .unwrap();
        assert_eq!(cfg.config_json["sync"]["key_field"], "IDU");
        assert_eq!(cfg.config_json["sync"]["gate_by_date"], true);
    }

    #[test]
    fn empty_document_is_ignored() {
        let a = load_layered_yaml_from_strings(&["sync:\n  key_field: IDU\n", ""]).unwrap();
        let b = load_layered_yaml_from_strings(&["sync:\n  key_field: IDU\n"]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let cfg = load_layered_yaml_from_strings(&["b: 1\na: {d: 2, c: 3}\n"]).unwrap();
        assert_eq!(cfg.canonical_json, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn empty_config_hash_matches_empty_object() {
        let loaded = load_layered_yaml_from_strings(&[]).unwrap();
        assert_eq!(LoadedConfig::empty().config_hash, loaded.config_hash);
    }
}
