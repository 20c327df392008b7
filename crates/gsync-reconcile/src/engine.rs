use std::collections::HashMap;
use std::fmt;

use gsync_dataset::{Dataset, FeatureId, KeyValue, Layer, LayerError, Record, Value};
use tracing::{debug, info, warn};

use crate::policy::{compare_records, Comparison, ComparisonPolicy, FieldPlan};
use crate::suspend::SuspendedFilter;
use crate::types::{ChangeReport, FailureKind, RecordFailure};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How a merge matches and compares records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    pub key_field: String,
    pub policy: ComparisonPolicy,
    /// Provider-managed fields (e.g. `fid`): never compared, never written.
    pub ignored_fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOptionsError {
    /// Date gating was requested without naming the date field.
    MissingDateField,
    /// The key field was also listed as ignored.
    KeyFieldIgnored(String),
}

impl fmt::Display for MergeOptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDateField => write!(f, "date gating requires a date field"),
            Self::KeyFieldIgnored(k) => write!(f, "key field '{k}' cannot be ignored"),
        }
    }
}

impl std::error::Error for MergeOptionsError {}

impl MergeOptions {
    pub fn plain(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            policy: ComparisonPolicy::Plain,
            ignored_fields: Vec::new(),
        }
    }

    pub fn date_gated(key_field: impl Into<String>, date_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            policy: ComparisonPolicy::DateGated {
                date_field: date_field.into(),
            },
            ignored_fields: Vec::new(),
        }
    }

    /// Build from the collaborator's raw choices.
    ///
    /// `date_field` is only used when `gate_by_date` is set.
    pub fn from_flags(
        key_field: &str,
        date_field: Option<&str>,
        gate_by_date: bool,
    ) -> Result<Self, MergeOptionsError> {
        match (gate_by_date, date_field) {
            (false, _) => Ok(Self::plain(key_field)),
            (true, Some(d)) if !d.trim().is_empty() => Ok(Self::date_gated(key_field, d)),
            (true, _) => Err(MergeOptionsError::MissingDateField),
        }
    }

    pub fn ignoring<I, S>(mut self, fields: I) -> Result<Self, MergeOptionsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for f in fields {
            let f = f.into();
            if f == self.key_field {
                return Err(MergeOptionsError::KeyFieldIgnored(f));
            }
            if !self.ignored_fields.contains(&f) {
                self.ignored_fields.push(f);
            }
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal merge outcomes. Per-record refusals are not errors; they land in
/// [`ChangeReport::failures`].
#[derive(Clone, Debug, PartialEq)]
pub enum MergeError {
    /// A field named by the options is absent from the source schema.
    UnknownField(String),
    /// The target filter could not be cleared before the merge.
    FilterSuspend(LayerError),
    /// The target refused to open an edit session.
    StartEditing(LayerError),
    /// The final commit failed. Every pending edit was rolled back; `report`
    /// describes what would have been applied and must not be trusted.
    Commit {
        report: ChangeReport,
        source: LayerError,
    },
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "field '{name}' does not exist"),
            Self::FilterSuspend(e) => write!(f, "cannot suspend target filter: {e}"),
            Self::StartEditing(e) => write!(f, "cannot start editing target: {e}"),
            Self::Commit { report, source } => write!(
                f,
                "commit failed, changes discarded \
                 ({} insert(s), {} update(s) not applied): {source}",
                report.inserted, report.updated
            ),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnknownField(_) => None,
            Self::FilterSuspend(e) | Self::StartEditing(e) => Some(e),
            Self::Commit { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge `source` into `target`.
///
/// Preconditions (checked by [`crate::check_merge_gate`], not here): both
/// schemas are identical and the key field is unique on both sides.
///
/// The target's row filter is suspended for the duration of the call and
/// restored on every exit path.
pub fn merge<L: Layer + ?Sized>(
    source: &Dataset,
    target: &mut L,
    options: &MergeOptions,
) -> Result<ChangeReport, MergeError> {
    let mut target = SuspendedFilter::new(target).map_err(MergeError::FilterSuspend)?;
    merge_unfiltered(source, &mut *target, options)
}

/// Merge body. The caller guarantees the target filter is already suspended.
pub(crate) fn merge_unfiltered<L: Layer + ?Sized>(
    source: &Dataset,
    target: &mut L,
    options: &MergeOptions,
) -> Result<ChangeReport, MergeError> {
    let plan = resolve_plan(source, target, options)?;

    target.start_editing().map_err(MergeError::StartEditing)?;

    // 1) Key index over the target, one pass.
    let index: HashMap<KeyValue, (FeatureId, Record)> = target
        .features()
        .map(|(id, rec)| (rec.value_at(plan.key).to_key(), (id, rec.clone())))
        .collect();
    debug!(target = target.name(), indexed = index.len(), "target index built");

    // 2) Classify and apply each source record.
    let mut report = ChangeReport::empty();
    for src in source.records() {
        let key = src.value_at(plan.key).to_key();
        match index.get(&key) {
            None => insert_record(target, &plan, src, key, &mut report),
            Some((id, current)) => {
                update_record(target, source, &plan, src, (*id, current), key, &mut report)
            }
        }
    }

    // 3) One commit for the whole batch.
    if let Err(e) = target.commit_changes() {
        warn!(target = target.name(), error = %e, "commit failed, rolling back");
        target.rollback();
        return Err(MergeError::Commit { report, source: e });
    }

    info!(
        target = target.name(),
        source = source.name(),
        inserted = report.inserted,
        updated = report.updated,
        stale_skipped = report.stale_skipped,
        failures = report.failures.len(),
        "merge committed"
    );
    Ok(report)
}

fn resolve_plan<L: Layer + ?Sized>(
    source: &Dataset,
    target: &L,
    options: &MergeOptions,
) -> Result<FieldPlan, MergeError> {
    let schema = source.schema();
    let index_of = |name: &str| {
        schema
            .index_of(name)
            .ok_or_else(|| MergeError::UnknownField(name.to_string()))
    };

    let key = index_of(&options.key_field)?;
    let date = options.policy.date_field().map(index_of).transpose()?;
    let ignored = options
        .ignored_fields
        .iter()
        .filter_map(|f| schema.index_of(f))
        .collect::<Vec<_>>();
    let compared = (0..schema.len())
        .filter(|i| *i != key && !ignored.contains(i))
        .collect();

    Ok(FieldPlan {
        key,
        date,
        compared,
        ignored,
        geometry: source.has_geometry() && target.geometry_type().is_some(),
    })
}

fn insert_record<L: Layer + ?Sized>(
    target: &mut L,
    plan: &FieldPlan,
    src: &Record,
    key: KeyValue,
    report: &mut ChangeReport,
) {
    let mut rec = Record::new(src.values().to_vec());
    for &idx in &plan.ignored {
        rec.set(idx, Value::Null);
    }
    if plan.geometry {
        rec.set_geometry(src.geometry().cloned());
    }

    match target.add_record(rec) {
        Ok(id) => {
            debug!(key = %key, feature = id, "inserted");
            report.inserted += 1;
        }
        Err(e) => {
            warn!(key = %key, error = %e, "cannot add record to target");
            report.failures.push(RecordFailure {
                key,
                kind: FailureKind::Insert,
                reason: e.to_string(),
            });
        }
    }
}

fn update_record<L: Layer + ?Sized>(
    target: &mut L,
    source: &Dataset,
    plan: &FieldPlan,
    src: &Record,
    (id, current): (FeatureId, &Record),
    key: KeyValue,
    report: &mut ChangeReport,
) {
    let update = match compare_records(source.schema(), plan, src, current) {
        Comparison::Unchanged => return,
        Comparison::Stale => {
            debug!(key = %key, "source not newer than target, skipped");
            report.stale_skipped += 1;
            return;
        }
        Comparison::Changed(update) => update,
    };

    // Key and ignored fields keep the target's values.
    let mut rec = current.clone();
    for &idx in &plan.compared {
        rec.set(idx, src.value_at(idx).clone());
    }
    if plan.geometry {
        rec.set_geometry(src.geometry().cloned());
    }

    match target.update_record(id, rec) {
        Ok(()) => {
            debug!(key = %key, feature = id, fields = update.fields.len(), "updated");
            report.updated += 1;
            report.updated_records.insert(key, update);
        }
        Err(e) => {
            warn!(key = %key, error = %e, "cannot update target record");
            report.failures.push(RecordFailure {
                key,
                kind: FailureKind::Update,
                reason: e.to_string(),
            });
        }
    }
}
