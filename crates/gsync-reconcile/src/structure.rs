//! Structural compatibility of two schemas.
//!
//! Two datasets are compatible iff their schemas are equal as sequences:
//! same length, and at every position the same field name and the same
//! declared type name. Order matters.

use std::fmt;

use gsync_dataset::Schema;
use serde::Serialize;

/// First structural difference found, or `Identical`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureCheck {
    Identical,
    FieldCountMismatch {
        target: usize,
        source: usize,
    },
    NameMismatch {
        index: usize,
        target: String,
        source: String,
    },
    TypeMismatch {
        index: usize,
        field: String,
        target: String,
        source: String,
    },
}

impl StructureCheck {
    pub fn is_identical(&self) -> bool {
        matches!(self, StructureCheck::Identical)
    }
}

impl fmt::Display for StructureCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identical => write!(f, "layer structures are identical"),
            Self::FieldCountMismatch { target, source } => write!(
                f,
                "field count differs: target has {target}, source has {source}"
            ),
            Self::NameMismatch {
                index,
                target,
                source,
            } => write!(
                f,
                "field names differ at position {index}: {target} vs {source}"
            ),
            Self::TypeMismatch {
                index,
                field,
                target,
                source,
            } => write!(
                f,
                "field types differ at position {index} ('{field}'): {target} vs {source}"
            ),
        }
    }
}

/// Compare schemas positionally and report the first mismatch.
pub fn check_structure(target: &Schema, source: &Schema) -> StructureCheck {
    if target.len() != source.len() {
        return StructureCheck::FieldCountMismatch {
            target: target.len(),
            source: source.len(),
        };
    }

    for (index, (t, s)) in target.fields().iter().zip(source.fields()).enumerate() {
        if t.name != s.name {
            return StructureCheck::NameMismatch {
                index,
                target: t.name.clone(),
                source: s.name.clone(),
            };
        }
        if t.field_type.type_name() != s.field_type.type_name() {
            return StructureCheck::TypeMismatch {
                index,
                field: t.name.clone(),
                target: t.field_type.type_name().to_string(),
                source: s.field_type.type_name().to_string(),
            };
        }
    }

    StructureCheck::Identical
}

/// Boolean form of [`check_structure`].
pub fn validate_structure(target: &Schema, source: &Schema) -> bool {
    check_structure(target, source).is_identical()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsync_dataset::FieldType;

    #[test]
    fn identical_schemas_pass() {
        let s = Schema::of(&[("IDU", FieldType::String), ("n", FieldType::Integer)]);
        assert!(validate_structure(&s, &s.clone()));
    }

    #[test]
    fn order_matters() {
        let t = Schema::of(&[("IDU", FieldType::String), ("name", FieldType::String)]);
        let s = Schema::of(&[("name", FieldType::String), ("IDU", FieldType::String)]);
        assert_eq!(
            check_structure(&t, &s),
            StructureCheck::NameMismatch {
                index: 0,
                target: "IDU".to_string(),
                source: "name".to_string(),
            }
        );
    }

    #[test]
    fn type_names_must_match() {
        let t = Schema::of(&[("IDU", FieldType::String), ("n", FieldType::Integer)]);
        let s = Schema::of(&[("IDU", FieldType::String), ("n", FieldType::Real)]);
        let check = check_structure(&t, &s);
        assert_eq!(
            check.to_string(),
            "field types differ at position 1 ('n'): Integer vs Real"
        );
    }
}
