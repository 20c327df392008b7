//! gsync-dataset
//!
//! Tabular/geospatial data model shared by the synchronization engine and its
//! collaborators:
//! - typed scalar [`Value`]s and their hashable [`KeyValue`] projection
//! - ordered [`Schema`]s of named, typed fields
//! - [`Record`]s and [`Dataset`]s
//! - the editable [`Layer`] abstraction and its in-memory implementation
//!
//! No IO. Loading and saving datasets belongs to the caller.

mod dataset;
mod filter;
mod geometry;
mod layer;
mod schema;
mod value;

pub use dataset::{Dataset, DatasetError, Record};
pub use filter::{FilterError, FilterOp, SubsetFilter};
pub use geometry::{Geometry, GeometryType};
pub use layer::{FeatureId, Layer, LayerError, MemoryLayer};
pub use schema::{Field, FieldType, Schema, UnknownFieldType};
pub use value::{KeyValue, ParseValueError, RealKey, Value};
