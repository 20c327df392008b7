//! gsync-reconcile
//!
//! Source → target dataset reconciliation.
//!
//! Rules:
//! - Structure and key checks run before any mutation (gate)
//! - Key present in target → update candidate, never re-inserted
//! - Key absent from target → inserted
//! - Update only when attributes or geometry differ (optionally only when the
//!   source is strictly newer by its last-modified field)
//! - The key value of a target record is never rewritten
//! - All target edits commit as one transaction
//!
//! Deterministic. No file IO; datasets come from the caller.

mod engine;
mod gate;
mod keys;
mod policy;
mod structure;
mod suspend;
mod types;

pub use engine::{merge, MergeError, MergeOptions, MergeOptionsError};
pub use gate::{check_merge_gate, synchronize, GateIssue, MergeGate, SyncError};
pub use keys::{
    date_field_candidates, duplicated_values, key_field_candidates, validate_keys, DatasetRole,
    KeyCheck, KeyIssue, KeyValidationError,
};
pub use policy::{Comparison, ComparisonPolicy};
pub use structure::{check_structure, validate_structure, StructureCheck};
pub use suspend::SuspendedFilter;
pub use types::*;
