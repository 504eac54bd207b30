//! Render pipeline interfaces.
//!
//! The atlas does not draw. A pipeline brackets a batch with
//! [`PageIterator::begin_render`] / [`PageIterator::end_render`], steps with
//! [`PageIterator::next`], and asks for [`PageIterator::file_path`] after each
//! successful step.

use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::source::LayerReference;
use super::AtlasError;

/// Iterator role of the atlas, as seen by a render pipeline.
pub trait PageIterator {
    /// Number of pages in the current sequence.
    fn count(&self) -> usize;

    /// Start a render pass. Requeries when needed and returns the page count.
    fn begin_render(&mut self) -> Result<usize, AtlasError>;

    /// Finish a render pass. Pages stay browsable.
    fn end_render(&mut self);

    /// Advance to the next page. Returns false past the end.
    fn next(&mut self) -> bool;

    /// Output path for the current page.
    fn file_path(&self, base_file_path: &str, extension: &str) -> String;
}

/// Map layer visibility, owned by the render pipeline.
///
/// Used to hide the coverage layer for the duration of a render pass.
pub trait CoverageVisibility: Send + Sync {
    /// Remove the layer from the visible map layers.
    fn hide_layer(&self, layer: &LayerReference);

    /// Put a hidden layer back.
    fn restore_layer(&self, layer: &LayerReference);
}

/// In-memory layer visibility set.
#[derive(Debug, Default)]
pub struct LayerVisibility {
    hidden: Mutex<BTreeSet<String>>,
}

impl LayerVisibility {
    /// Create a set with every layer visible.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a layer is hidden.
    pub fn is_hidden(&self, layer_id: &str) -> bool {
        self.hidden.lock().contains(layer_id)
    }

    /// Identifiers of hidden layers.
    pub fn hidden(&self) -> Vec<String> {
        self.hidden.lock().iter().cloned().collect()
    }
}

impl CoverageVisibility for LayerVisibility {
    fn hide_layer(&self, layer: &LayerReference) {
        self.hidden.lock().insert(layer.id.clone());
    }

    fn restore_layer(&self, layer: &LayerReference) {
        self.hidden.lock().remove(&layer.id);
    }
}
