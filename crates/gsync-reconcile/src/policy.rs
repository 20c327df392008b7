//! Change detection between a source record and its matched target record.

use gsync_dataset::{Record, Schema};

use crate::types::{FieldChange, GeometryChange, RecordUpdate};

/// Which source records may overwrite their target counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComparisonPolicy {
    /// Any differing field triggers an update.
    Plain,
    /// Only records whose `date_field` is strictly newer than the target's
    /// are compared; older or equal ones are skipped entirely.
    DateGated { date_field: String },
}

impl ComparisonPolicy {
    pub fn date_field(&self) -> Option<&str> {
        match self {
            ComparisonPolicy::Plain => None,
            ComparisonPolicy::DateGated { date_field } => Some(date_field),
        }
    }
}

/// Outcome of comparing one update candidate.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    /// Nothing differs.
    Unchanged,
    /// The date gate refused the record; no field was compared.
    Stale,
    /// At least one field or the geometry differs.
    Changed(RecordUpdate),
}

impl Comparison {
    pub fn update_required(&self) -> bool {
        matches!(self, Comparison::Changed(_))
    }
}

/// Positions resolved once per merge.
#[derive(Clone, Debug)]
pub(crate) struct FieldPlan {
    pub key: usize,
    pub date: Option<usize>,
    /// Fields compared and copied on update (everything but key and ignored).
    pub compared: Vec<usize>,
    /// Fields never written by the merge.
    pub ignored: Vec<usize>,
    pub geometry: bool,
}

/// Compare `source` against its matched `target` along `plan`.
pub(crate) fn compare_records(
    schema: &Schema,
    plan: &FieldPlan,
    source: &Record,
    target: &Record,
) -> Comparison {
    if let Some(date_idx) = plan.date {
        let s = source.value_at(date_idx);
        let t = target.value_at(date_idx);
        // A dated source beats an undated target; an undated source never wins.
        let newer = match (s.is_null(), t.is_null()) {
            (true, _) => false,
            (false, true) => true,
            (false, false) => s.is_after(t),
        };
        if !newer {
            return Comparison::Stale;
        }
    }

    // `compared` is in schema order, so the changes are too.
    let mut fields = Vec::new();
    for &idx in &plan.compared {
        let s = source.value_at(idx);
        let t = target.value_at(idx);
        if s != t {
            fields.push(FieldChange {
                field: schema.fields()[idx].name.clone(),
                old: t.clone(),
                new: s.clone(),
            });
        }
    }

    let geometry = if plan.geometry && source.geometry() != target.geometry() {
        Some(GeometryChange {
            old: target.geometry().cloned(),
            new: source.geometry().cloned(),
        })
    } else {
        None
    };

    let update = RecordUpdate { fields, geometry };
    if update.is_empty() {
        Comparison::Unchanged
    } else {
        Comparison::Changed(update)
    }
}
