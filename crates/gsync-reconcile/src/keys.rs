//! Unique-identifier checks.
//!
//! The key field must exist in both datasets and hold unique values in each.
//! Both datasets are always examined so a single call reports every problem.

use std::collections::HashMap;
use std::fmt;

use gsync_dataset::{Dataset, KeyValue, Schema, Value};
use serde::Serialize;

/// Which side of the merge a diagnostic refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Source,
    Target,
}

impl DatasetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetRole::Source => "source",
            DatasetRole::Target => "target",
        }
    }
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One key problem in one dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyIssue {
    MissingKeyField {
        dataset: DatasetRole,
        field: String,
    },
    /// Every value occurring two or more times, in first-occurrence order.
    DuplicateKeyValues {
        dataset: DatasetRole,
        field: String,
        values: Vec<Value>,
    },
}

impl fmt::Display for KeyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeyField { dataset, field } => {
                write!(f, "field '{field}' does not exist in the {dataset} dataset")
            }
            Self::DuplicateKeyValues {
                dataset,
                field,
                values,
            } => {
                let list: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                write!(
                    f,
                    "values of '{field}' are not unique in the {dataset} dataset; \
                     duplicated values: [{}]",
                    list.join(", ")
                )
            }
        }
    }
}

/// Key validation failed; `issues` lists every problem found.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyValidationError {
    pub issues: Vec<KeyIssue>,
}

impl KeyValidationError {
    /// Duplicated values reported for `role`, empty if none.
    pub fn duplicates(&self, role: DatasetRole) -> &[Value] {
        self.issues
            .iter()
            .find_map(|i| match i {
                KeyIssue::DuplicateKeyValues {
                    dataset, values, ..
                } if *dataset == role => Some(values.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn is_missing_in(&self, role: DatasetRole) -> bool {
        self.issues.iter().any(
            |i| matches!(i, KeyIssue::MissingKeyField { dataset, .. } if *dataset == role),
        )
    }
}

impl fmt::Display for KeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for KeyValidationError {}

/// Confirmation that the key exists and is unique on both sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyCheck {
    pub field: String,
    pub source_records: usize,
    pub target_records: usize,
}

/// Check the key field on both datasets.
pub fn validate_keys(
    source: &Dataset,
    target: &Dataset,
    key_field: &str,
) -> Result<KeyCheck, KeyValidationError> {
    let mut issues = Vec::new();
    for (role, ds) in [(DatasetRole::Source, source), (DatasetRole::Target, target)] {
        if let Some(issue) = check_one(role, ds, key_field) {
            issues.push(issue);
        }
    }

    if !issues.is_empty() {
        return Err(KeyValidationError { issues });
    }
    Ok(KeyCheck {
        field: key_field.to_string(),
        source_records: source.len(),
        target_records: target.len(),
    })
}

fn check_one(role: DatasetRole, ds: &Dataset, key_field: &str) -> Option<KeyIssue> {
    let Some(values) = ds.column(key_field) else {
        return Some(KeyIssue::MissingKeyField {
            dataset: role,
            field: key_field.to_string(),
        });
    };

    let duplicates = duplicated_values(values);
    if duplicates.is_empty() {
        None
    } else {
        Some(KeyIssue::DuplicateKeyValues {
            dataset: role,
            field: key_field.to_string(),
            values: duplicates,
        })
    }
}

/// Values occurring at least twice, each listed once, in first-occurrence order.
pub fn duplicated_values<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    // key -> (first occurrence, count)
    let mut seen: HashMap<KeyValue, (&'a Value, usize)> = HashMap::new();
    let mut order: Vec<KeyValue> = Vec::new();
    for v in values {
        let key = v.to_key();
        let entry = seen.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (v, 0)
        });
        entry.1 += 1;
    }

    order
        .into_iter()
        .filter_map(|k| {
            let (v, n) = seen[&k];
            (n > 1).then(|| v.clone())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Field choice helpers
// ---------------------------------------------------------------------------

/// Fields a user may pick as key: text, integer or real fields.
///
/// `preferred` is listed first when the schema has it, whatever its type.
pub fn key_field_candidates(schema: &Schema, preferred: &str) -> Vec<String> {
    let mut out = Vec::new();
    if schema.contains(preferred) {
        out.push(preferred.to_string());
    }
    out.extend(
        schema
            .fields()
            .iter()
            .filter(|f| f.name != preferred && f.field_type.is_key_candidate())
            .map(|f| f.name.clone()),
    );
    out
}

/// Fields usable as last-modified stamp: date and datetime fields.
pub fn date_field_candidates(schema: &Schema) -> Vec<String> {
    schema
        .fields()
        .iter()
        .filter(|f| f.field_type.is_temporal())
        .map(|f| f.name.clone())
        .collect()
}
