//! Typed attribute values.
//!
//! # Equality
//! [`Value`] equality is type-aware rather than structural:
//! - numeric values compare by magnitude (`Integer(1) == Real(1.0)`);
//! - `Date` and `DateTime` compare after promoting the date to midnight;
//! - `Null` only equals `Null`;
//! - two NaN reals are equal, so a NaN in both datasets is not a change.
//!
//! [`KeyValue`] is the hashable, totally ordered projection used to index
//! records by their unique identifier.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};

use crate::schema::FieldType;

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Display form of datetimes; `%.f` prints nothing for whole seconds.
const DATETIME_DISPLAY: &str = "%Y-%m-%dT%H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A single attribute value.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short label of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Partial ordering across compatible families.
    ///
    /// Returns `None` when the values cannot be ordered (text vs number,
    /// anything vs null, NaN).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Real(b)) => (*a as f64).partial_cmp(b),
            (Value::Real(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::DateTime(b)) => Some(midnight(*a).cmp(b)),
            (Value::DateTime(a), Value::Date(b)) => Some(a.cmp(&midnight(*b))),
            _ => None,
        }
    }

    /// `true` if `self` is strictly greater than `other`.
    pub fn is_after(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    /// Parse raw text into the declared field type.
    ///
    /// Empty input is not special-cased here; callers decide whether an empty
    /// cell means null.
    pub fn parse_as(field_type: FieldType, raw: &str) -> Result<Value, ParseValueError> {
        let err = || ParseValueError {
            field_type,
            raw: raw.to_string(),
        };
        let t = raw.trim();
        match field_type {
            FieldType::String => Ok(Value::Text(raw.to_string())),
            FieldType::Integer => t.parse::<i64>().map(Value::Integer).map_err(|_| err()),
            FieldType::Real => t.parse::<f64>().map(Value::Real).map_err(|_| err()),
            FieldType::Date => {
                if let Ok(d) = NaiveDate::parse_from_str(t, DATE_FORMAT) {
                    return Ok(Value::Date(d));
                }
                // Accept a full timestamp for a date column and keep the date part.
                parse_datetime(t)
                    .map(|dt| Value::Date(dt.date()))
                    .ok_or_else(err)
            }
            FieldType::DateTime => {
                if let Some(dt) = parse_datetime(t) {
                    return Ok(Value::DateTime(dt));
                }
                NaiveDate::parse_from_str(t, DATE_FORMAT)
                    .map(|d| Value::DateTime(midnight(d)))
                    .map_err(|_| err())
            }
        }
    }

    /// `true` if the value may be stored in a field of `field_type`.
    ///
    /// Null fits everywhere; an integer fits a real field.
    pub fn fits(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (Value::Null, _)
                | (Value::Text(_), FieldType::String)
                | (Value::Integer(_), FieldType::Integer)
                | (Value::Integer(_), FieldType::Real)
                | (Value::Real(_), FieldType::Real)
                | (Value::Date(_), FieldType::Date)
                | (Value::DateTime(_), FieldType::DateTime)
        )
    }

    /// Widen the value to the storage representation of `field_type`.
    pub fn coerce_to(self, field_type: FieldType) -> Value {
        match (self, field_type) {
            (Value::Integer(i), FieldType::Real) => Value::Real(i as f64),
            (v, _) => v,
        }
    }

    /// Projection used for indexing by unique identifier.
    pub fn to_key(&self) -> KeyValue {
        match self {
            Value::Null => KeyValue::Null,
            Value::Text(s) => KeyValue::Text(s.clone()),
            Value::Integer(i) => KeyValue::Integer(*i),
            // Whole reals key like integers so 3 and 3.0 land on the same record.
            Value::Real(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                KeyValue::Integer(*f as i64)
            }
            Value::Real(f) => KeyValue::Real(RealKey(*f)),
            Value::Date(d) => KeyValue::DateTime(midnight(*d)),
            Value::DateTime(dt) => KeyValue::DateTime(*dt),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Real(a), Value::Real(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

// ---------------------------------------------------------------------------
// Parse error
// ---------------------------------------------------------------------------

/// Raw text could not be read as the declared field type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseValueError {
    pub field_type: FieldType,
    pub raw: String,
}

impl fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot read '{}' as {}",
            self.raw,
            self.field_type.type_name()
        )
    }
}

impl std::error::Error for ParseValueError {}

// ---------------------------------------------------------------------------
// Key projection
// ---------------------------------------------------------------------------

/// Real number usable as a map key (total order over the bit pattern).
#[derive(Clone, Copy, Debug)]
pub struct RealKey(pub f64);

impl PartialEq for RealKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for RealKey {}

impl PartialOrd for RealKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RealKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for RealKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Hashable identity of a unique-identifier value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Null,
    Integer(i64),
    Real(RealKey),
    Text(String),
    DateTime(NaiveDateTime),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Null => write!(f, "NULL"),
            KeyValue::Integer(i) => write!(f, "{i}"),
            KeyValue::Real(r) => write!(f, "{}", r.0),
            KeyValue::Text(s) => write!(f, "{s}"),
            KeyValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY)),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Text(s.to_string())
    }
}

impl From<i64> for KeyValue {
    fn from(i: i64) -> Self {
        KeyValue::Integer(i)
    }
}

/// Keys serialize as their display text so they can be JSON object keys.
impl Serialize for KeyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
