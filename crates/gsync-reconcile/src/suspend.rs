//! Scoped suspension of a layer's row filter.
//!
//! A merge must see every target record, not only those visible through the
//! collaborator's filter. [`SuspendedFilter`] clears the filter on creation
//! and puts it back when dropped, so every exit path (success, early error,
//! commit failure, panic unwinding) restores it.

use std::ops::{Deref, DerefMut};

use gsync_dataset::{Layer, LayerError};
use tracing::{debug, warn};

pub struct SuspendedFilter<'a, L: Layer + ?Sized> {
    layer: &'a mut L,
    saved: Option<String>,
}

impl<'a, L: Layer + ?Sized> SuspendedFilter<'a, L> {
    pub fn new(layer: &'a mut L) -> Result<Self, LayerError> {
        let saved = layer.subset_filter().map(str::to_owned);
        if let Some(expr) = &saved {
            debug!(layer = layer.name(), filter = %expr, "suspending subset filter");
            layer.set_subset_filter(None)?;
        }
        Ok(Self { layer, saved })
    }

    /// The filter that will be restored.
    pub fn saved_filter(&self) -> Option<&str> {
        self.saved.as_deref()
    }
}

impl<L: Layer + ?Sized> Deref for SuspendedFilter<'_, L> {
    type Target = L;

    fn deref(&self) -> &L {
        self.layer
    }
}

impl<L: Layer + ?Sized> DerefMut for SuspendedFilter<'_, L> {
    fn deref_mut(&mut self) -> &mut L {
        self.layer
    }
}

impl<L: Layer + ?Sized> Drop for SuspendedFilter<'_, L> {
    fn drop(&mut self) {
        let Some(expr) = self.saved.take() else {
            return;
        };
        debug!(layer = self.layer.name(), filter = %expr, "restoring subset filter");
        if let Err(e) = self.layer.set_subset_filter(Some(expr.clone())) {
            warn!(
                layer = self.layer.name(),
                filter = %expr,
                error = %e,
                "failed to restore subset filter"
            );
        }
    }
}
