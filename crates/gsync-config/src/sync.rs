use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

/// Typed view of the synchronization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConfig {
    pub key_field: String,
    pub date_field: String,
    pub gate_by_date: bool,
    pub ignored_fields: Vec<String>,
    /// Lower-case, with leading dot.
    pub accepted_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            key_field: "IDU".to_string(),
            date_field: "date_maj".to_string(),
            gate_by_date: false,
            ignored_fields: vec!["fid".to_string()],
            accepted_extensions: vec![".json".to_string(), ".csv".to_string()],
        }
    }
}

impl SyncConfig {
    /// Read the consumed pointers; absent keys keep their defaults.
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let mut out = Self::default();

        if let Some(v) = read_str(config, "/sync/key_field")? {
            if v.trim().is_empty() {
                bail!("CONFIG_INVALID: /sync/key_field must not be empty");
            }
            out.key_field = v;
        }
        if let Some(v) = read_str(config, "/sync/date_field")? {
            out.date_field = v;
        }
        if let Some(v) = config.pointer("/sync/gate_by_date") {
            out.gate_by_date = v.as_bool().ok_or_else(|| {
                anyhow::anyhow!("CONFIG_INVALID: /sync/gate_by_date must be a boolean")
            })?;
        }
        if let Some(v) = read_str_list(config, "/sync/ignored_fields")? {
            out.ignored_fields = v;
        }
        if let Some(v) = read_str_list(config, "/source/accepted_extensions")? {
            out.accepted_extensions = v.iter().map(|e| normalize_extension(e)).collect();
        }

        if out.gate_by_date && out.date_field.trim().is_empty() {
            bail!("CONFIG_INVALID: /sync/gate_by_date requires /sync/date_field");
        }
        Ok(out)
    }

    /// `true` when `path` ends with one of the accepted extensions.
    pub fn accepts(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.accepted_extensions.iter().any(|ext| lower.ends_with(ext))
    }
}

fn normalize_extension(e: &str) -> String {
    let e = e.trim().to_ascii_lowercase();
    if e.starts_with('.') {
        e
    } else {
        format!(".{e}")
    }
}

fn read_str(config: &Value, ptr: &str) -> Result<Option<String>> {
    match config.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => bail!("CONFIG_INVALID: {ptr} must be a string"),
    }
}

fn read_str_list(config: &Value, ptr: &str) -> Result<Option<Vec<String>>> {
    match config.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                _ => bail!("CONFIG_INVALID: {ptr} must be a list of strings"),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(_) => bail!("CONFIG_INVALID: {ptr} must be a list of strings"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_to_empty_config() {
        let cfg = SyncConfig::from_config_json(&json!({})).unwrap();
        assert_eq!(cfg, SyncConfig::default());
        assert_eq!(cfg.key_field, "IDU");
        assert_eq!(cfg.ignored_fields, vec!["fid"]);
    }

    #[test]
    fn extensions_are_normalized() {
        let cfg = SyncConfig::from_config_json(&json!({
            "source": {"accepted_extensions": ["CSV", ".Json"]}
        }))
        .unwrap();
        assert_eq!(cfg.accepted_extensions, vec![".csv", ".json"]);
        assert!(cfg.accepts("field/Parcels.CSV"));
        assert!(!cfg.accepts("field/parcels.shp"));
    }

    #[test]
    fn wrong_types_are_rejected() {
        let err = SyncConfig::from_config_json(&json!({"sync": {"gate_by_date": "yes"}}))
            .unwrap_err();
        assert!(err.to_string().contains("/sync/gate_by_date"));

        let err = SyncConfig::from_config_json(&json!({"sync": {"ignored_fields": [1]}}))
            .unwrap_err();
        assert!(err.to_string().contains("/sync/ignored_fields"));
    }

    #[test]
    fn gating_needs_a_date_field() {
        let err = SyncConfig::from_config_json(&json!({
            "sync": {"gate_by_date": true, "date_field": ""}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("requires /sync/date_field"));
    }
}
