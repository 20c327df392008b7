use std::fmt;

use crate::geometry::{Geometry, GeometryType};
use crate::schema::{FieldType, Schema};
use crate::value::Value;

/// One row: values aligned with the dataset schema, plus optional geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    values: Vec<Value>,
    geometry: Option<Geometry>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value at `index`, null when the record is shorter than the schema.
    pub fn value_at(&self, index: usize) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(index).unwrap_or(&NULL)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if index >= self.values.len() {
            self.values.resize(index + 1, Value::Null);
        }
        self.values[index] = value;
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        self.geometry = geometry;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A record does not fit the dataset schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetError {
    /// Value count differs from field count.
    ArityMismatch { expected: usize, got: usize },
    /// A value cannot be stored in its field's declared type.
    TypeMismatch {
        field: String,
        expected: FieldType,
        got: &'static str,
    },
    /// Geometry given for a dataset without a geometry concept.
    UnexpectedGeometry,
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArityMismatch { expected, got } => {
                write!(f, "record has {got} value(s), schema has {expected} field(s)")
            }
            Self::TypeMismatch {
                field,
                expected,
                got,
            } => write!(f, "field '{field}' expects {expected}, got {got}"),
            Self::UnexpectedGeometry => write!(f, "dataset has no geometry column"),
        }
    }
}

impl std::error::Error for DatasetError {}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Ordered records sharing one schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    name: String,
    schema: Schema,
    geometry_type: Option<GeometryType>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            geometry_type: None,
            records: Vec::new(),
        }
    }

    pub fn with_geometry_type(mut self, geometry_type: GeometryType) -> Self {
        self.geometry_type = Some(geometry_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry_type
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry_type.is_some()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check `record` against the schema and widen values to storage types.
    pub fn conform(&self, record: Record) -> Result<Record, DatasetError> {
        conform_record(&self.schema, self.has_geometry(), record)
    }

    /// Append a record after schema checks.
    pub fn push(&mut self, record: Record) -> Result<(), DatasetError> {
        let record = self.conform(record)?;
        self.records.push(record);
        Ok(())
    }

    /// Append without checks. Used when the record was already conformed.
    pub(crate) fn push_unchecked(&mut self, record: Record) {
        self.records.push(record);
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    /// Every value of one column, in record order.
    pub fn column<'a>(&'a self, field: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.schema.index_of(field)?;
        Some(self.records.iter().map(move |r| r.value_at(idx)))
    }
}

pub(crate) fn conform_record(
    schema: &Schema,
    has_geometry: bool,
    record: Record,
) -> Result<Record, DatasetError> {
    if record.len() != schema.len() {
        return Err(DatasetError::ArityMismatch {
            expected: schema.len(),
            got: record.len(),
        });
    }
    if record.geometry.is_some() && !has_geometry {
        return Err(DatasetError::UnexpectedGeometry);
    }

    let Record { values, geometry } = record;
    let mut out = Vec::with_capacity(values.len());
    for (field, value) in schema.fields().iter().zip(values) {
        if !value.fits(field.field_type) {
            return Err(DatasetError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type,
                got: value.kind(),
            });
        }
        out.push(value.coerce_to(field.field_type));
    }
    Ok(Record {
        values: out,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcels() -> Dataset {
        Dataset::new(
            "parcels",
            Schema::of(&[("IDU", FieldType::String), ("area", FieldType::Real)]),
        )
    }

    #[test]
    fn push_checks_arity() {
        let mut ds = parcels();
        let err = ds.push(Record::new(vec![Value::from("A1")])).unwrap_err();
        assert_eq!(err, DatasetError::ArityMismatch { expected: 2, got: 1 });
        assert!(ds.is_empty());
    }

    #[test]
    fn push_checks_types_and_widens_integers() {
        let mut ds = parcels();
        ds.push(Record::new(vec![Value::from("A1"), Value::Integer(12)]))
            .unwrap();
        assert!(matches!(ds.records()[0].value_at(1), Value::Real(r) if *r == 12.0));

        let err = ds
            .push(Record::new(vec![Value::Integer(1), Value::Null]))
            .unwrap_err();
        assert!(matches!(err, DatasetError::TypeMismatch { ref field, .. } if field == "IDU"));
    }

    #[test]
    fn geometry_requires_geometry_concept() {
        let mut ds = parcels();
        let rec = Record::new(vec![Value::from("A1"), Value::Null])
            .with_geometry(Geometry::from_wkt("POINT(0 0)"));
        assert_eq!(ds.push(rec.clone()), Err(DatasetError::UnexpectedGeometry));

        let mut ds = parcels().with_geometry_type(GeometryType::Point);
        ds.push(rec).unwrap();
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn column_reads_values_by_name() {
        let mut ds = parcels();
        ds.push(Record::new(vec![Value::from("A1"), Value::Real(1.0)]))
            .unwrap();
        ds.push(Record::new(vec![Value::from("A2"), Value::Null]))
            .unwrap();
        let ids: Vec<String> = ds
            .column("IDU")
            .unwrap()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(ids, vec!["A1", "A2"]);
        assert!(ds.column("missing").is_none());
    }
}
