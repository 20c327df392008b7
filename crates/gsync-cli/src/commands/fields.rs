use std::path::Path;

use anyhow::Result;
use gsync_reconcile::{date_field_candidates, key_field_candidates};

use super::load_config;
use crate::layer_file;

/// List the fields a user may pick as key or as modification date.
///
/// `preferred` (default: the configured key field) is listed first when the
/// layer has it, whatever its type.
pub fn fields(
    layer: &Path,
    preferred: Option<&str>,
    config_paths: &[String],
    json: bool,
) -> Result<()> {
    let (_, cfg) = load_config(config_paths)?;
    let preferred = preferred.unwrap_or(&cfg.key_field);

    let file = layer_file::load(layer)?;
    let schema = file.dataset.schema();
    let keys = key_field_candidates(schema, preferred);
    let dates = date_field_candidates(schema);

    if json {
        let out = serde_json::json!({
            "layer": file.dataset.name(),
            "key_candidates": keys,
            "date_candidates": dates,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("layer={}", file.dataset.name());
        println!("key_candidates={}", keys.join(","));
        println!("date_candidates={}", dates.join(","));
    }
    Ok(())
}
