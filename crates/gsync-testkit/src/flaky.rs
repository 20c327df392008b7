use gsync_dataset::{
    FeatureId, GeometryType, KeyValue, Layer, LayerError, MemoryLayer, Record, Schema,
};

/// [`Layer`] wrapper that refuses selected operations.
///
/// Refusals are configured up front; everything else is delegated to the
/// wrapped [`MemoryLayer`]. Counters record how often each refusal fired.
#[derive(Debug)]
pub struct FlakyLayer {
    inner: MemoryLayer,
    key_index: usize,
    reject_insert: Vec<KeyValue>,
    reject_update: Vec<KeyValue>,
    fail_commit: Option<String>,
    fail_filter_restore: bool,
    pub refused_inserts: usize,
    pub refused_updates: usize,
    pub commits_attempted: usize,
    pub rollbacks: usize,
}

impl FlakyLayer {
    pub fn new(inner: MemoryLayer, key_field: &str) -> Self {
        let key_index = inner
            .schema()
            .index_of(key_field)
            .unwrap_or_else(|| panic!("no field '{key_field}'"));
        Self {
            inner,
            key_index,
            reject_insert: Vec::new(),
            reject_update: Vec::new(),
            fail_commit: None,
            fail_filter_restore: false,
            refused_inserts: 0,
            refused_updates: 0,
            commits_attempted: 0,
            rollbacks: 0,
        }
    }

    /// Refuse `add_record` for records with this key.
    pub fn reject_insert_of(mut self, key: impl Into<KeyValue>) -> Self {
        self.reject_insert.push(key.into());
        self
    }

    /// Refuse `update_record` for records with this key.
    pub fn reject_update_of(mut self, key: impl Into<KeyValue>) -> Self {
        self.reject_update.push(key.into());
        self
    }

    /// Make `commit_changes` fail with `reason`.
    pub fn fail_commit(mut self, reason: impl Into<String>) -> Self {
        self.fail_commit = Some(reason.into());
        self
    }

    /// Refuse to set a non-empty filter (clearing still works).
    pub fn fail_filter_restore(mut self) -> Self {
        self.fail_filter_restore = true;
        self
    }

    pub fn inner(&self) -> &MemoryLayer {
        &self.inner
    }

    pub fn into_inner(self) -> MemoryLayer {
        self.inner
    }

    fn key_of(&self, record: &Record) -> KeyValue {
        record.value_at(self.key_index).to_key()
    }
}

impl Layer for FlakyLayer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn schema(&self) -> &Schema {
        self.inner.schema()
    }

    fn geometry_type(&self) -> Option<GeometryType> {
        self.inner.geometry_type()
    }

    fn subset_filter(&self) -> Option<&str> {
        self.inner.subset_filter()
    }

    fn set_subset_filter(&mut self, filter: Option<String>) -> Result<(), LayerError> {
        if self.fail_filter_restore && filter.is_some() {
            return Err(LayerError::Rejected("filter refused".to_string()));
        }
        self.inner.set_subset_filter(filter)
    }

    fn features(&self) -> Box<dyn Iterator<Item = (FeatureId, &Record)> + '_> {
        self.inner.features()
    }

    fn is_editing(&self) -> bool {
        self.inner.is_editing()
    }

    fn start_editing(&mut self) -> Result<(), LayerError> {
        self.inner.start_editing()
    }

    fn add_record(&mut self, record: Record) -> Result<FeatureId, LayerError> {
        let key = self.key_of(&record);
        if self.reject_insert.contains(&key) {
            self.refused_inserts += 1;
            return Err(LayerError::Rejected(format!("insert of {key} refused")));
        }
        self.inner.add_record(record)
    }

    fn update_record(&mut self, id: FeatureId, record: Record) -> Result<(), LayerError> {
        let key = self.key_of(&record);
        if self.reject_update.contains(&key) {
            self.refused_updates += 1;
            return Err(LayerError::Rejected(format!("update of {key} refused")));
        }
        self.inner.update_record(id, record)
    }

    fn commit_changes(&mut self) -> Result<(), LayerError> {
        self.commits_attempted += 1;
        if let Some(reason) = &self.fail_commit {
            return Err(LayerError::CommitRejected {
                layer: self.inner.name().to_string(),
                reason: reason.clone(),
            });
        }
        self.inner.commit_changes()
    }

    fn rollback(&mut self) {
        self.rollbacks += 1;
        self.inner.rollback();
    }
}
