//! Merge gate.
//!
//! Every merge of a source into a target MUST pass the gate first:
//!
//! 1. structure: identical field sequences ([`check_structure`]);
//! 2. key: present and unique in both datasets ([`validate_keys`]);
//! 3. date gating: the date field exists on both sides.
//!
//! All checks run and every issue is reported, so the user can fix the data
//! in one round. Nothing here mutates either dataset.

use std::fmt;

use gsync_dataset::{Dataset, Layer};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{merge_unfiltered, MergeError, MergeOptions};
use crate::keys::{validate_keys, DatasetRole, KeyIssue};
use crate::structure::{check_structure, StructureCheck};
use crate::suspend::SuspendedFilter;
use crate::types::ChangeReport;

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// One reason a merge may not proceed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum GateIssue {
    Structure { mismatch: StructureCheck },
    Key { issue: KeyIssue },
    MissingDateField { dataset: DatasetRole, field: String },
}

impl fmt::Display for GateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure { mismatch } => {
                write!(f, "source and target have different structures: {mismatch}")
            }
            Self::Key { issue } => write!(f, "{issue}"),
            Self::MissingDateField { dataset, field } => {
                write!(f, "date field '{field}' does not exist in the {dataset} dataset")
            }
        }
    }
}

/// Result of a gate check.
///
/// A merge may not run unless [`MergeGate::Permitted`] is returned.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeGate {
    Permitted,
    Blocked { issues: Vec<GateIssue> },
}

impl MergeGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, MergeGate::Permitted)
    }

    pub fn is_blocked(&self) -> bool {
        !self.is_permitted()
    }

    pub fn issues(&self) -> &[GateIssue] {
        match self {
            MergeGate::Permitted => &[],
            MergeGate::Blocked { issues } => issues,
        }
    }
}

/// Run every pre-merge check on `source` and `target`.
pub fn check_merge_gate(source: &Dataset, target: &Dataset, options: &MergeOptions) -> MergeGate {
    let mut issues = Vec::new();

    let structure = check_structure(target.schema(), source.schema());
    if !structure.is_identical() {
        issues.push(GateIssue::Structure {
            mismatch: structure,
        });
    }

    if let Err(e) = validate_keys(source, target, &options.key_field) {
        issues.extend(e.issues.into_iter().map(|issue| GateIssue::Key { issue }));
    }

    if let Some(date_field) = options.policy.date_field() {
        for (role, ds) in [(DatasetRole::Source, source), (DatasetRole::Target, target)] {
            if !ds.schema().contains(date_field) {
                issues.push(GateIssue::MissingDateField {
                    dataset: role,
                    field: date_field.to_string(),
                });
            }
        }
    }

    if issues.is_empty() {
        MergeGate::Permitted
    } else {
        MergeGate::Blocked { issues }
    }
}

// ---------------------------------------------------------------------------
// Gated entry point
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum SyncError {
    /// The gate refused the merge; the target was not touched.
    Blocked(Vec<GateIssue>),
    Merge(MergeError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked(issues) => {
                write!(f, "synchronization refused:")?;
                for issue in issues {
                    write!(f, "\n  - {issue}")?;
                }
                Ok(())
            }
            Self::Merge(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Blocked(_) => None,
            Self::Merge(e) => Some(e),
        }
    }
}

impl From<MergeError> for SyncError {
    fn from(e: MergeError) -> Self {
        SyncError::Merge(e)
    }
}

/// Gate then merge, with the target filter suspended for both steps.
///
/// The gate sees the whole target, so a duplicate hidden by the filter still
/// blocks the merge.
pub fn synchronize<L: Layer + ?Sized>(
    source: &Dataset,
    target: &mut L,
    options: &MergeOptions,
) -> Result<ChangeReport, SyncError> {
    let mut target = SuspendedFilter::new(target).map_err(MergeError::FilterSuspend)?;

    let snapshot = target.snapshot();
    if let MergeGate::Blocked { issues } = check_merge_gate(source, &snapshot, options) {
        for issue in &issues {
            warn!(source = source.name(), target = snapshot.name(), "{issue}");
        }
        return Err(SyncError::Blocked(issues));
    }
    info!(
        source = source.name(),
        target = snapshot.name(),
        key = %options.key_field,
        "merge gate passed"
    );
    drop(snapshot);

    Ok(merge_unfiltered(source, &mut *target, options)?)
}
