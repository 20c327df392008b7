//! Command handler modules for gsync-cli.
//!
//! Shared utilities used by multiple commands live here.
//! Command-specific logic lives in the submodules.

pub mod fields;
pub mod sync;

use std::path::Path;

use anyhow::{bail, Result};
use gsync_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, SyncConfig, UnusedKeyPolicy,
};
use gsync_reconcile::MergeOptions;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config (defaults only when no path is given) and warn about
/// keys nothing reads.
pub fn load_config(paths: &[String]) -> Result<(LoadedConfig, SyncConfig)> {
    let loaded = if paths.is_empty() {
        LoadedConfig::empty()
    } else {
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        load_layered_yaml(&refs)?
    };

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &unused.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not used by gsync");
    }

    let sync = loaded.sync_config()?;
    debug!(config_hash = %loaded.config_hash, "configuration loaded");
    Ok((loaded, sync))
}

/// Refuse a source file whose extension the configuration does not accept.
pub fn check_source_format(path: &Path, cfg: &SyncConfig) -> Result<()> {
    if cfg.accepts(&path.to_string_lossy()) {
        return Ok(());
    }
    bail!(
        "unsupported source format '{}'. accepted: {}",
        path.display(),
        cfg.accepted_extensions.join(", ")
    )
}

/// Command-line choices that override the configuration.
#[derive(Debug, Default, Clone)]
pub struct OptionFlags<'a> {
    pub key: Option<&'a str>,
    pub date_field: Option<&'a str>,
    pub gate_by_date: bool,
    pub ignore: &'a [String],
}

/// Merge options from config defaults plus flags.
///
/// Flags win over config; `--gate-by-date` can only switch gating on.
/// Ignored fields are the config list plus `--ignore`, minus the key.
pub fn resolve_options(cfg: &SyncConfig, flags: &OptionFlags<'_>) -> Result<MergeOptions> {
    let key = flags.key.unwrap_or(&cfg.key_field);
    let date_field = flags.date_field.unwrap_or(&cfg.date_field);
    let gate = flags.gate_by_date || cfg.gate_by_date;

    let ignored: Vec<String> = cfg
        .ignored_fields
        .iter()
        .chain(flags.ignore)
        .filter(|f| f.as_str() != key)
        .cloned()
        .collect();

    let options = MergeOptions::from_flags(key, Some(date_field), gate)?.ignoring(ignored)?;
    debug!(?options, "merge options resolved");
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsync_reconcile::ComparisonPolicy;

    #[test]
    fn flags_override_config() {
        let cfg = SyncConfig::default();
        let ignore = vec!["ogc_fid".to_string()];
        let flags = OptionFlags {
            key: Some("parcel_id"),
            date_field: Some("modified"),
            gate_by_date: true,
            ignore: &ignore,
        };
        let options = resolve_options(&cfg, &flags).unwrap();
        assert_eq!(options.key_field, "parcel_id");
        assert_eq!(
            options.policy,
            ComparisonPolicy::DateGated {
                date_field: "modified".to_string()
            }
        );
        assert_eq!(options.ignored_fields, vec!["fid", "ogc_fid"]);
    }

    #[test]
    fn key_is_never_ignored() {
        let cfg = SyncConfig::default();
        let flags = OptionFlags {
            key: Some("fid"),
            ..OptionFlags::default()
        };
        let options = resolve_options(&cfg, &flags).unwrap();
        assert!(options.ignored_fields.is_empty());
        assert_eq!(options.policy, ComparisonPolicy::Plain);
    }

    #[test]
    fn source_format_follows_config() {
        let cfg = SyncConfig::default();
        assert!(check_source_format(Path::new("field/parcels.csv"), &cfg).is_ok());
        let err = check_source_format(Path::new("field/parcels.shp"), &cfg).unwrap_err();
        assert!(err.to_string().contains("accepted: .json, .csv"));
    }
}
