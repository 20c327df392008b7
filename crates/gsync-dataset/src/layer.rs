//! Editable target layers.
//!
//! # Editing model
//! A [`Layer`] exposes its records through an optional subset filter and
//! accepts mutations only inside an edit session:
//!
//! 1. `start_editing` opens the session.
//! 2. `add_record` / `update_record` buffer changes. Readers of the layer see
//!    the buffered state, the committed state is untouched.
//! 3. `commit_changes` applies the whole buffer at once, or fails and leaves
//!    the committed state as it was. `rollback` drops the buffer.

use std::fmt;

use crate::dataset::{conform_record, Dataset, DatasetError, Record};
use crate::filter::{FilterError, SubsetFilter};
use crate::geometry::GeometryType;
use crate::schema::Schema;

/// Stable identity of a record inside a layer.
pub type FeatureId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerError {
    /// The layer cannot be edited.
    ReadOnly { layer: String },
    /// A mutation was attempted outside an edit session.
    NotEditing { layer: String },
    /// The record does not fit the layer schema.
    InvalidRecord(DatasetError),
    /// No feature with this id.
    UnknownFeature(FeatureId),
    /// The subset filter expression was rejected.
    InvalidFilter(FilterError),
    /// The store refused the commit.
    CommitRejected { layer: String, reason: String },
    /// Any other store-level refusal (custom layers).
    Rejected(String),
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly { layer } => write!(f, "layer '{layer}' is read-only"),
            Self::NotEditing { layer } => write!(f, "layer '{layer}' is not in edit mode"),
            Self::InvalidRecord(e) => write!(f, "invalid record: {e}"),
            Self::UnknownFeature(id) => write!(f, "unknown feature id {id}"),
            Self::InvalidFilter(e) => write!(f, "invalid subset filter: {e}"),
            Self::CommitRejected { layer, reason } => {
                write!(f, "commit rejected on layer '{layer}': {reason}")
            }
            Self::Rejected(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for LayerError {}

impl From<DatasetError> for LayerError {
    fn from(e: DatasetError) -> Self {
        LayerError::InvalidRecord(e)
    }
}

// ---------------------------------------------------------------------------
// Layer trait
// ---------------------------------------------------------------------------

/// Target store mutated by a merge.
pub trait Layer {
    fn name(&self) -> &str;

    fn schema(&self) -> &Schema;

    /// `None` when the layer has no geometry concept.
    fn geometry_type(&self) -> Option<GeometryType>;

    /// Active row filter expression, if any.
    fn subset_filter(&self) -> Option<&str>;

    /// Replace the row filter. `None` clears it.
    fn set_subset_filter(&mut self, filter: Option<String>) -> Result<(), LayerError>;

    /// Records visible through the current filter, edits included.
    fn features(&self) -> Box<dyn Iterator<Item = (FeatureId, &Record)> + '_>;

    fn is_editing(&self) -> bool;

    fn start_editing(&mut self) -> Result<(), LayerError>;

    fn add_record(&mut self, record: Record) -> Result<FeatureId, LayerError>;

    fn update_record(&mut self, id: FeatureId, record: Record) -> Result<(), LayerError>;

    fn commit_changes(&mut self) -> Result<(), LayerError>;

    fn rollback(&mut self);

    /// Visible records copied into a standalone dataset.
    fn snapshot(&self) -> Dataset {
        let mut out = Dataset::new(self.name(), self.schema().clone());
        if let Some(gt) = self.geometry_type() {
            out = out.with_geometry_type(gt);
        }
        for (_, record) in self.features() {
            out.push_unchecked(record.clone());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// In-memory layer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct EditBuffer {
    /// Staged copy of committed rows (index-aligned with `ids`).
    rows: Vec<Record>,
    /// Strictly increasing: ids are handed out in order and never reused.
    ids: Vec<FeatureId>,
    added: usize,
    changed: usize,
}

/// [`Layer`] backed by a [`Dataset`] held in memory.
#[derive(Clone, Debug)]
pub struct MemoryLayer {
    data: Dataset,
    ids: Vec<FeatureId>,
    next_id: FeatureId,
    filter: Option<(String, SubsetFilter)>,
    edit: Option<EditBuffer>,
    read_only: bool,
}

impl MemoryLayer {
    pub fn new(data: Dataset) -> Self {
        let n = data.len() as FeatureId;
        Self {
            ids: (1..=n).collect(),
            next_id: n + 1,
            data,
            filter: None,
            edit: None,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Apply a filter at construction.
    pub fn with_filter(mut self, expr: impl Into<String>) -> Result<Self, LayerError> {
        self.set_subset_filter(Some(expr.into()))?;
        Ok(self)
    }

    /// Committed records, ignoring the filter.
    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    /// Count of buffered inserts and updates in the open session.
    pub fn pending_changes(&self) -> (usize, usize) {
        self.edit.as_ref().map_or((0, 0), |e| (e.added, e.changed))
    }

    fn visible(&self, record: &Record) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |(_, f)| f.matches(record))
    }

    fn buffer_mut(&mut self) -> Result<&mut EditBuffer, LayerError> {
        let name = self.data.name().to_string();
        self.edit
            .as_mut()
            .ok_or(LayerError::NotEditing { layer: name })
    }
}

impl Layer for MemoryLayer {
    fn name(&self) -> &str {
        self.data.name()
    }

    fn schema(&self) -> &Schema {
        self.data.schema()
    }

    fn geometry_type(&self) -> Option<GeometryType> {
        self.data.geometry_type()
    }

    fn subset_filter(&self) -> Option<&str> {
        self.filter.as_ref().map(|(expr, _)| expr.as_str())
    }

    fn set_subset_filter(&mut self, filter: Option<String>) -> Result<(), LayerError> {
        self.filter = match filter {
            None => None,
            Some(expr) if expr.trim().is_empty() => None,
            Some(expr) => {
                let parsed = SubsetFilter::parse(&expr, self.data.schema())
                    .map_err(LayerError::InvalidFilter)?;
                Some((expr, parsed))
            }
        };
        Ok(())
    }

    fn features(&self) -> Box<dyn Iterator<Item = (FeatureId, &Record)> + '_> {
        let (ids, rows): (&[FeatureId], &[Record]) = match &self.edit {
            Some(buf) => (&buf.ids, &buf.rows),
            None => (&self.ids, self.data.records()),
        };
        Box::new(
            ids.iter()
                .copied()
                .zip(rows.iter())
                .filter(move |(_, r)| self.visible(r)),
        )
    }

    fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    fn start_editing(&mut self) -> Result<(), LayerError> {
        if self.read_only {
            return Err(LayerError::ReadOnly {
                layer: self.data.name().to_string(),
            });
        }
        if self.edit.is_none() {
            self.edit = Some(EditBuffer {
                rows: self.data.records().to_vec(),
                ids: self.ids.clone(),
                added: 0,
                changed: 0,
            });
        }
        Ok(())
    }

    fn add_record(&mut self, record: Record) -> Result<FeatureId, LayerError> {
        let record = conform_record(self.data.schema(), self.data.has_geometry(), record)?;
        let id = self.next_id;
        let buf = self.buffer_mut()?;
        buf.rows.push(record);
        buf.ids.push(id);
        buf.added += 1;
        self.next_id += 1;
        Ok(id)
    }

    fn update_record(&mut self, id: FeatureId, record: Record) -> Result<(), LayerError> {
        let record = conform_record(self.data.schema(), self.data.has_geometry(), record)?;
        let buf = self.buffer_mut()?;
        let pos = buf
            .ids
            .binary_search(&id)
            .map_err(|_| LayerError::UnknownFeature(id))?;
        buf.rows[pos] = record;
        buf.changed += 1;
        Ok(())
    }

    fn commit_changes(&mut self) -> Result<(), LayerError> {
        let buf = self.edit.take().ok_or_else(|| LayerError::NotEditing {
            layer: self.data.name().to_string(),
        })?;
        *self.data.records_mut() = buf.rows;
        self.ids = buf.ids;
        Ok(())
    }

    fn rollback(&mut self) {
        self.edit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use crate::value::Value;

    fn layer() -> MemoryLayer {
        let mut ds = Dataset::new(
            "target",
            Schema::of(&[("IDU", FieldType::String), ("name", FieldType::String)]),
        );
        ds.push(Record::new(vec!["A1".into(), "x".into()])).unwrap();
        ds.push(Record::new(vec!["B1".into(), "y".into()])).unwrap();
        MemoryLayer::new(ds)
    }

    #[test]
    fn mutations_require_edit_session() {
        let mut l = layer();
        let err = l
            .add_record(Record::new(vec!["C1".into(), Value::Null]))
            .unwrap_err();
        assert!(matches!(err, LayerError::NotEditing { .. }));
    }

    #[test]
    fn edits_are_invisible_until_commit() {
        let mut l = layer();
        l.start_editing().unwrap();
        let id = l
            .add_record(Record::new(vec!["C1".into(), "z".into()]))
            .unwrap();
        assert_eq!(l.features().count(), 3);
        assert_eq!(l.dataset().len(), 2);
        assert_eq!(l.pending_changes(), (1, 0));

        l.update_record(1, Record::new(vec!["A1".into(), "xx".into()]))
            .unwrap();
        l.commit_changes().unwrap();

        assert!(!l.is_editing());
        assert_eq!(l.dataset().len(), 3);
        assert_eq!(l.dataset().records()[0].value_at(1), &Value::from("xx"));
        assert_eq!(l.features().map(|(fid, _)| fid).max(), Some(id));
    }

    #[test]
    fn rollback_discards_buffer() {
        let mut l = layer();
        l.start_editing().unwrap();
        l.add_record(Record::new(vec!["C1".into(), "z".into()]))
            .unwrap();
        l.rollback();
        assert_eq!(l.features().count(), 2);
        assert!(matches!(
            l.commit_changes(),
            Err(LayerError::NotEditing { .. })
        ));
    }

    #[test]
    fn filter_hides_records_from_readers() {
        let mut l = layer().with_filter("IDU = 'B1'").unwrap();
        assert_eq!(l.subset_filter(), Some("IDU = 'B1'"));
        assert_eq!(l.features().count(), 1);
        assert_eq!(l.snapshot().len(), 1);

        l.set_subset_filter(None).unwrap();
        assert_eq!(l.features().count(), 2);
        assert!(matches!(
            l.set_subset_filter(Some("ghost = 1".to_string())),
            Err(LayerError::InvalidFilter(_))
        ));
    }

    #[test]
    fn read_only_refuses_edit_session() {
        let mut l = layer().read_only();
        assert!(matches!(l.start_editing(), Err(LayerError::ReadOnly { .. })));
    }

    #[test]
    fn update_unknown_feature_fails() {
        let mut l = layer();
        l.start_editing().unwrap();
        let err = l
            .update_record(99, Record::new(vec!["Z".into(), Value::Null]))
            .unwrap_err();
        assert_eq!(err, LayerError::UnknownFeature(99));
    }

    #[test]
    fn updates_locate_features_across_a_large_session() {
        let n = 50_000;
        let schema = Schema::of(&[("IDU", FieldType::Integer), ("name", FieldType::String)]);
        let mut ds = Dataset::new("big", schema);
        for i in 0..n {
            ds.push(Record::new(vec![Value::Integer(i), "old".into()]))
                .unwrap();
        }
        let mut l = MemoryLayer::new(ds);
        l.start_editing().unwrap();
        let added = l
            .add_record(Record::new(vec![Value::Integer(n), "new".into()]))
            .unwrap();

        // Every committed feature plus the buffered insert, last to first.
        // A linear lookup makes this loop quadratic in `n`.
        let ids: Vec<FeatureId> = l.features().map(|(fid, _)| fid).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for (i, fid) in ids.iter().rev().enumerate() {
            l.update_record(*fid, Record::new(vec![Value::Integer(i as i64), "upd".into()]))
                .unwrap();
        }
        assert_eq!(l.pending_changes(), (1, n as usize + 1));
        assert_eq!(
            l.update_record(added + 1, Record::new(vec![Value::Null, Value::Null])),
            Err(LayerError::UnknownFeature(added + 1))
        );

        l.commit_changes().unwrap();
        assert!(l
            .dataset()
            .records()
            .iter()
            .all(|r| r.value_at(1) == &Value::from("upd")));
    }
}
