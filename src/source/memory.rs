//! In-memory coverage source for testing and embedding.

use parking_lot::RwLock;

use crate::types::{Feature, FeatureId, Value};
use super::{CoverageSource, SourceError};

/// In-memory coverage source.
///
/// Features iterate in insertion order. Interior mutability lets tests change
/// the data underneath an atlas that only holds a weak handle.
///
/// Features loaded from JSON go through [`Value`]'s untagged deserializer, so
/// string attributes in ISO-8601 datetime form arrive as [`Value::Date`].
#[derive(Debug, Default)]
pub struct InMemoryCoverageSource {
    layer_id: String,
    layer_name: String,
    features: RwLock<Vec<Feature>>,
    offline: RwLock<bool>,
}

impl InMemoryCoverageSource {
    /// Create an empty source.
    pub fn new(layer_id: impl Into<String>, layer_name: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            layer_name: layer_name.into(),
            features: RwLock::new(Vec::new()),
            offline: RwLock::new(false),
        }
    }

    /// Add features, builder style.
    pub fn with_features(self, features: impl IntoIterator<Item = Feature>) -> Self {
        for feature in features {
            self.add_feature(feature);
        }
        self
    }

    /// Add a feature, replacing in place any feature with the same id.
    pub fn add_feature(&self, feature: Feature) {
        let mut features = self.features.write();
        match features.iter_mut().find(|f| f.id == feature.id) {
            Some(existing) => *existing = feature,
            None => features.push(feature),
        }
    }

    /// Remove a feature. Returns false if it was not present.
    pub fn remove_feature(&self, id: FeatureId) -> bool {
        let mut features = self.features.write();
        let before = features.len();
        features.retain(|f| f.id != id);
        features.len() != before
    }

    /// Set one attribute of a feature. Returns false if the feature is absent.
    pub fn set_attribute(&self, id: FeatureId, name: &str, value: impl Into<Value>) -> bool {
        let mut features = self.features.write();
        match features.iter_mut().find(|f| f.id == id) {
            Some(f) => {
                f.attributes.insert(name.to_string(), value.into());
                true
            }
            None => false,
        }
    }

    /// Make every fetch fail with [`SourceError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.read().len()
    }

    /// Check if the source holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.read().is_empty()
    }

    fn check_online(&self) -> Result<(), SourceError> {
        if *self.offline.read() {
            Err(SourceError::Unavailable(format!("layer {} is offline", self.layer_id)))
        } else {
            Ok(())
        }
    }
}

impl CoverageSource for InMemoryCoverageSource {
    fn layer_id(&self) -> &str {
        &self.layer_id
    }

    fn layer_name(&self) -> &str {
        &self.layer_name
    }

    fn fetch_all(&self) -> Result<Vec<Feature>, SourceError> {
        self.check_online()?;
        Ok(self.features.read().clone())
    }

    fn fetch_by_id(&self, id: FeatureId) -> Result<Option<Feature>, SourceError> {
        self.check_online()?;
        Ok(self.features.read().iter().find(|f| f.id == id).cloned())
    }
}
