//! The rendering surface that displays a chart and lets users edit it.
//!
//! chartdoc never draws anything itself. It hands data and a specification to
//! a [`Surface`] and later asks the resulting [`View`] for its current
//! specification when saving.

use std::sync::Mutex;

use log::trace;
use serde_json::Value as JsonValue;

use crate::{DataInput, Error, SurfaceConfig, VisualizationSpec};

/// Something that can create chart views.
pub trait Surface {
    /// Create a view displaying the given data.
    fn create_view(
        &self,
        config: &SurfaceConfig,
        data: &DataInput,
    ) -> Result<Box<dyn View>, Error>;
}

/// A handle to a single chart view.
pub trait View {
    /// Replace the view's specification.
    fn set_spec(&mut self, spec: &VisualizationSpec);

    /// The view's current specification, without its data, if it has one.
    fn spec(&self) -> Option<VisualizationSpec>;

    fn undo(&mut self);

    fn redo(&mut self);
}

/// A headless [`Surface`] that keeps its views' specifications in memory.
#[derive(Debug, Default)]
pub struct MemorySurface {
    // The data (as seen by the surface) of every view created so far.
    created: Mutex<Vec<JsonValue>>,
}

impl MemorySurface {
    /// The data handed to each view created so far, in order of creation.
    pub fn created(&self) -> Vec<JsonValue> {
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Surface for MemorySurface {
    fn create_view(
        &self,
        config: &SurfaceConfig,
        data: &DataInput,
    ) -> Result<Box<dyn View>, Error> {
        let data = data.to_value();
        trace!("Creating view with config {:?} and data {}", config, data);
        self.created
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(data);
        Ok(Box::new(MemoryView::default()))
    }
}

/// A view whose specification edits can be undone and redone.
///
/// The first specification set on the view is its initial state and cannot
/// be undone.
#[derive(Debug, Default)]
pub struct MemoryView {
    history: Vec<VisualizationSpec>,
    // Number of entries in `history` that are currently applied.
    applied: usize,
}

impl View for MemoryView {
    fn set_spec(&mut self, spec: &VisualizationSpec) {
        self.history.truncate(self.applied);
        self.history.push(spec.clone());
        self.applied = self.history.len();
    }

    fn spec(&self) -> Option<VisualizationSpec> {
        self.applied
            .checked_sub(1)
            .and_then(|i| self.history.get(i))
            .cloned()
    }

    fn undo(&mut self) {
        if self.applied > 1 {
            self.applied -= 1;
        }
    }

    fn redo(&mut self) {
        if self.applied < self.history.len() {
            self.applied += 1;
        }
    }
}
