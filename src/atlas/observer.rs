//! Atlas change notifications.
//!
//! Observers are called synchronously, after the state change they describe
//! is complete, in registration order. Return values are not consumed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::source::LayerReference;
use crate::types::Feature;

/// Event emitted by the atlas.
#[derive(Debug, Clone, PartialEq)]
pub enum AtlasEvent {
    /// A configuration field changed.
    ConfigChanged,
    /// The atlas was enabled or disabled.
    Toggled(bool),
    /// The coverage layer was bound, replaced or unbound.
    CoverageLayerChanged(Option<LayerReference>),
    /// A requery produced a page sequence of this length.
    FeatureCountChanged(usize),
    /// The current feature changed (None when the cursor was reset).
    FeatureChanged(Option<Feature>),
    /// A render pass began.
    RenderBegun,
    /// A render pass ended.
    RenderEnded,
    /// Human-readable status for the caller.
    StatusMessage(String),
}

/// Receiver of atlas events.
pub trait AtlasObserver: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &AtlasEvent);
}

/// Handle returned by [`ObserverList::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered observers.
#[derive(Default)]
pub struct ObserverList {
    next_id: u64,
    observers: Vec<(ObserverId, Arc<dyn AtlasObserver>)>,
}

impl ObserverList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&mut self, observer: Arc<dyn AtlasObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(i, _)| *i != id);
        self.observers.len() != before
    }

    /// Deliver an event to every observer.
    pub fn emit(&self, event: &AtlasEvent) {
        for (_, observer) in &self.observers {
            observer.on_event(event);
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Check if no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList").field("len", &self.len()).finish()
    }
}

/// Observer that records every event, for tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AtlasEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events.
    pub fn events(&self) -> Vec<AtlasEvent> {
        self.events.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<AtlasEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Count recorded events matching a predicate.
    pub fn count(&self, predicate: impl Fn(&AtlasEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Last recorded status message.
    pub fn last_status(&self) -> Option<String> {
        self.events.lock().iter().rev().find_map(|e| match e {
            AtlasEvent::StatusMessage(m) => Some(m.clone()),
            _ => None,
        })
    }
}

impl AtlasObserver for RecordingObserver {
    fn on_event(&self, event: &AtlasEvent) {
        self.events.lock().push(event.clone());
    }
}
