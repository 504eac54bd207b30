//! Coverage source backends.
//!
//! The atlas never owns its coverage source. It keeps a [`CoverageLayerRef`]
//! (a `Weak` handle plus the persisted [`LayerReference`]) and upgrades it for
//! the duration of one call. A source dropped by its owner simply stops
//! upgrading, and the atlas reports `SourceUnavailable`.

pub mod memory;
pub mod registry;

use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::types::{Feature, FeatureId};

/// Error type for coverage source operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The backend cannot serve requests.
    #[error("Coverage source unavailable: {0}")]
    Unavailable(String),
    /// Backend-specific failure.
    #[error("Coverage source error: {0}")]
    Backend(String),
}

/// Trait for coverage sources.
///
/// `fetch_all` must return features in a stable iteration order: the atlas
/// uses it as the tie-break for sorting and as the page order when sorting
/// is disabled.
pub trait CoverageSource: Send + Sync {
    /// Stable identifier of the layer (persisted in configuration).
    fn layer_id(&self) -> &str;

    /// Display name of the layer.
    fn layer_name(&self) -> &str;

    /// Fetch every feature in source iteration order.
    fn fetch_all(&self) -> Result<Vec<Feature>, SourceError>;

    /// Fetch one feature by identifier.
    fn fetch_by_id(&self, id: FeatureId) -> Result<Option<Feature>, SourceError>;
}

/// Persisted reference to a coverage layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerReference {
    /// Layer identifier.
    pub id: String,
    /// Layer name at the time the reference was taken.
    pub name: String,
}

impl LayerReference {
    /// Create a reference.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    /// Reference describing a live source.
    pub fn from_source(source: &dyn CoverageSource) -> Self {
        Self::new(source.layer_id(), source.layer_name())
    }
}

impl fmt::Display for LayerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Non-owning handle to a coverage source.
#[derive(Clone)]
pub struct CoverageLayerRef {
    reference: LayerReference,
    handle: Weak<dyn CoverageSource>,
}

impl CoverageLayerRef {
    /// Take a handle on a live source.
    pub fn new(source: &Arc<dyn CoverageSource>) -> Self {
        Self {
            reference: LayerReference::from_source(source.as_ref()),
            handle: Arc::downgrade(source),
        }
    }

    /// Persisted reference of the layer.
    pub fn reference(&self) -> &LayerReference {
        &self.reference
    }

    /// Upgrade to the live source, if it still exists.
    pub fn get(&self) -> Option<Arc<dyn CoverageSource>> {
        self.handle.upgrade()
    }

    /// Check whether the source still exists.
    pub fn is_alive(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

impl fmt::Debug for CoverageLayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageLayerRef")
            .field("reference", &self.reference)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Resolves persisted layer references back to live sources.
pub trait LayerResolver {
    /// Find the live source for a reference.
    fn resolve(&self, reference: &LayerReference) -> Option<Arc<dyn CoverageSource>>;
}

pub use memory::InMemoryCoverageSource;
pub use registry::LayerRegistry;
