use std::collections::BTreeMap;
use std::fmt;

use gsync_dataset::{Geometry, KeyValue, Value};
use serde::Serialize;

/// Old and new value of one attribute.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Old and new geometry of one record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeometryChange {
    pub old: Option<Geometry>,
    pub new: Option<Geometry>,
}

/// Everything that changed on one updated record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RecordUpdate {
    /// Changed attributes, in schema order.
    pub fields: Vec<FieldChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryChange>,
}

impl RecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.geometry.is_none()
    }

    pub fn field(&self, name: &str) -> Option<&FieldChange> {
        self.fields.iter().find(|c| c.field == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Insert,
    Update,
}

/// A source record the target refused. Non-fatal: the merge continued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub key: KeyValue,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChangeReport {
    pub inserted: usize,
    pub updated: usize,
    /// Key value -> what changed. Only keys counted in `updated` appear here.
    pub updated_records: BTreeMap<KeyValue, RecordUpdate>,
    /// Update candidates the date gate refused (target as new or newer).
    pub stale_skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl ChangeReport {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` when the merge changed nothing in the target.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }

    /// What changed on the record keyed `key`, if it was updated.
    pub fn update_for(&self, key: &KeyValue) -> Option<&RecordUpdate> {
        self.updated_records.get(key)
    }

    pub fn failed_inserts(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == FailureKind::Insert)
            .count()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Synchronization complete.")?;
        writeln!(f)?;
        writeln!(f, "Inserted records: {}", self.inserted)?;
        writeln!(f, "Updated records: {}", self.updated)?;
        if self.stale_skipped > 0 {
            writeln!(
                f,
                "Skipped (target as recent or newer): {}",
                self.stale_skipped
            )?;
        }

        if self.updated_records.is_empty() {
            writeln!(f)?;
            writeln!(f, "No field updated.")?;
        } else {
            writeln!(f)?;
            writeln!(f, "Updated fields:")?;
            for (key, update) in &self.updated_records {
                writeln!(f)?;
                writeln!(f, "- {key}:")?;
                for change in &update.fields {
                    writeln!(
                        f,
                        "    {} : '{}' -> '{}'",
                        change.field, change.old, change.new
                    )?;
                }
                if let Some(g) = &update.geometry {
                    writeln!(
                        f,
                        "    geometry : '{}' -> '{}'",
                        display_geometry(g.old.as_ref()),
                        display_geometry(g.new.as_ref())
                    )?;
                }
            }
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Rejected records: {}", self.failures.len())?;
            for failure in &self.failures {
                let verb = match failure.kind {
                    FailureKind::Insert => "insert",
                    FailureKind::Update => "update",
                };
                writeln!(f, "- {} ({verb}): {}", failure.key, failure.reason)?;
            }
        }
        Ok(())
    }
}

fn display_geometry(g: Option<&Geometry>) -> String {
    g.map_or_else(|| "NULL".to_string(), |g| g.wkt().to_string())
}
