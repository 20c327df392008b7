use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use gsync_dataset::{Dataset, Layer, MemoryLayer};
use gsync_reconcile::{check_merge_gate, synchronize, MergeGate, MergeOptions, SyncError};
use tracing::info;

use super::{check_source_format, load_config, resolve_options, OptionFlags};
use crate::layer_file::{self, LayerFile};

/// Inputs shared by `check` and `merge`.
#[derive(Debug, Clone)]
pub struct SyncInputs {
    pub source: PathBuf,
    pub target: PathBuf,
    pub key: Option<String>,
    pub date_field: Option<String>,
    pub gate_by_date: bool,
    pub ignore: Vec<String>,
    /// Replaces the filter stored in the target document.
    pub filter: Option<String>,
    pub config_paths: Vec<String>,
    pub json: bool,
}

struct Loaded {
    source: Dataset,
    target: LayerFile,
    options: MergeOptions,
}

fn load_inputs(inputs: &SyncInputs) -> Result<Loaded> {
    let (_, cfg) = load_config(&inputs.config_paths)?;
    check_source_format(&inputs.source, &cfg)?;

    let source = layer_file::load(&inputs.source)?.dataset;
    let mut target = layer_file::load(&inputs.target)?;
    if let Some(f) = &inputs.filter {
        target.filter = Some(f.clone());
    }

    let flags = OptionFlags {
        key: inputs.key.as_deref(),
        date_field: inputs.date_field.as_deref(),
        gate_by_date: inputs.gate_by_date,
        ignore: &inputs.ignore,
    };
    let options = resolve_options(&cfg, &flags)?;

    info!(
        source = source.name(),
        source_records = source.len(),
        target = target.dataset.name(),
        target_records = target.dataset.len(),
        "layers loaded"
    );
    Ok(Loaded {
        source,
        target,
        options,
    })
}

/// Run the merge gate only. Nothing is written.
pub fn check(inputs: &SyncInputs) -> Result<()> {
    let Loaded {
        source,
        target,
        options,
    } = load_inputs(inputs)?;

    // The gate sees the whole target, filter or not.
    let gate = check_merge_gate(&source, &target.dataset, &options);

    if inputs.json {
        println!("{}", serde_json::to_string_pretty(&gate)?);
    } else {
        match &gate {
            MergeGate::Permitted => {
                println!("gate=PERMITTED");
                println!("key_field={}", options.key_field);
                println!("source_records={}", source.len());
                println!("target_records={}", target.dataset.len());
            }
            MergeGate::Blocked { issues } => {
                println!("gate=BLOCKED");
                for issue in issues {
                    println!("- {issue}");
                }
            }
        }
    }

    if gate.is_blocked() {
        bail!("merge blocked: {} issue(s)", gate.issues().len());
    }
    Ok(())
}

/// Gate, merge and save the target.
///
/// The target is written to `out` (default: in place) only when the merge
/// committed and `dry_run` is off.
pub fn merge(inputs: &SyncInputs, out: Option<&Path>, dry_run: bool) -> Result<()> {
    let Loaded {
        source,
        target,
        options,
    } = load_inputs(inputs)?;

    let mut layer = MemoryLayer::new(target.dataset);
    if let Some(f) = target.filter {
        layer = layer
            .with_filter(f)
            .context("target filter is not valid for the target layer")?;
    }

    let report = match synchronize(&source, &mut layer, &options) {
        Ok(report) => report,
        Err(SyncError::Blocked(issues)) => {
            for issue in &issues {
                eprintln!("- {issue}");
            }
            bail!(
                "merge blocked: {} issue(s); target not modified",
                issues.len()
            );
        }
        Err(SyncError::Merge(e)) => {
            return Err(e).context("merge failed; target not modified");
        }
    };

    if dry_run {
        info!("dry run, target not saved");
    } else {
        let dest = out.unwrap_or(&inputs.target);
        layer_file::save(dest, layer.dataset(), layer.subset_filter())?;
        info!(path = %dest.display(), records = layer.dataset().len(), "target saved");
    }

    if inputs.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print!("{report}");
    }
    Ok(())
}
