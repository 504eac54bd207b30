//! Atlas configuration and its persisted form.
//!
//! ## Document Layout
//!
//! ```json
//! {
//!   "schema_version": "atlas_config_v1",
//!   "atlas": {
//!     "enabled": true,
//!     "hide_coverage": false,
//!     "coverage_layer": { "id": "parcels_1", "name": "Parcels" },
//!     "filter": { "enabled": true, "expression": "area > 100" },
//!     "sort": { "enabled": true, "expression": "name", "ascending": true },
//!     "filename_expression": "'output_'||@atlas_featurenumber",
//!     "page_name_expression": ""
//!   }
//! }
//! ```
//!
//! Disabled filter and sort blocks keep their expression text.

use serde::{Deserialize, Serialize};

use crate::source::{LayerReference, LayerResolver};

/// Persisted schema version.
pub const ATLAS_CONFIG_SCHEMA_VERSION: &str = "atlas_config_v1";

/// Default filename expression.
pub const DEFAULT_FILENAME_EXPRESSION: &str = "'output_'||@atlas_featurenumber";

/// Error type for configuration persistence.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Document is not valid JSON for this schema.
    #[error("Invalid atlas config document: {0}")]
    Json(#[from] serde_json::Error),

    /// Document was written by an unknown schema version.
    #[error("Unsupported atlas config schema version: {0}")]
    UnsupportedVersion(String),

    /// Coverage layer could not be resolved. The rest of the configuration was applied.
    #[error("Coverage layer not found: {0}")]
    UnknownLayer(LayerReference),
}

/// Filter block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Whether the filter applies.
    pub enabled: bool,
    /// Filter expression text.
    pub expression: String,
}

/// Sort block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSettings {
    /// Whether sorting applies.
    pub enabled: bool,
    /// Sort key expression text.
    pub expression: String,
    /// Sort direction.
    pub ascending: bool,
}

impl Default for SortSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            expression: String::new(),
            ascending: true,
        }
    }
}

/// Full atlas configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Whether the atlas is enabled.
    pub enabled: bool,
    /// Hide the coverage layer while rendering.
    pub hide_coverage: bool,
    /// Coverage layer reference.
    pub coverage_layer: Option<LayerReference>,
    /// Filter block.
    pub filter: FilterSettings,
    /// Sort block.
    pub sort: SortSettings,
    /// Output filename expression.
    pub filename_expression: String,
    /// Page name expression. Empty means page numbers.
    pub page_name_expression: String,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hide_coverage: false,
            coverage_layer: None,
            filter: FilterSettings::default(),
            sort: SortSettings::default(),
            filename_expression: DEFAULT_FILENAME_EXPRESSION.to_string(),
            page_name_expression: String::new(),
        }
    }
}

/// Versioned envelope for [`AtlasConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasConfigDocument {
    /// Schema version.
    pub schema_version: String,
    /// Configuration.
    pub atlas: AtlasConfig,
}

impl AtlasConfigDocument {
    /// Wrap a configuration with the current schema version.
    pub fn new(atlas: AtlasConfig) -> Self {
        Self {
            schema_version: ATLAS_CONFIG_SCHEMA_VERSION.to_string(),
            atlas,
        }
    }

    /// Fail unless the document uses the current schema version.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != ATLAS_CONFIG_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.schema_version.clone()));
        }
        Ok(())
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }
}

/// Serializable-object role of the atlas.
pub trait SerializableConfig {
    /// Type tag of the persisted block.
    fn string_type(&self) -> &'static str {
        "atlas"
    }

    /// Snapshot the configuration.
    fn write_config(&self) -> AtlasConfigDocument;

    /// Apply a persisted configuration, resolving the coverage layer.
    ///
    /// An unresolvable layer yields [`ConfigError::UnknownLayer`] after every
    /// other field was applied; the reference is kept and the atlas stays unbound.
    fn read_config(&mut self, document: &AtlasConfigDocument, resolver: &dyn LayerResolver) -> Result<(), ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AtlasConfig {
        AtlasConfig {
            enabled: true,
            hide_coverage: true,
            coverage_layer: Some(LayerReference::new("parcels_1", "Parcels")),
            filter: FilterSettings { enabled: false, expression: "area > 100".to_string() },
            sort: SortSettings { enabled: true, expression: "name".to_string(), ascending: false },
            filename_expression: "'p_' || id".to_string(),
            page_name_expression: "name".to_string(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = AtlasConfig::default();
        assert!(!config.enabled);
        assert!(config.sort.ascending);
        assert_eq!(config.filename_expression, DEFAULT_FILENAME_EXPRESSION);
    }

    #[test]
    fn test_json_round_trip_keeps_inactive_text() {
        let doc = AtlasConfigDocument::new(sample());
        let json = doc.to_json_string().unwrap();
        let back = AtlasConfigDocument::from_json_str(&json).unwrap();
        assert_eq!(back, doc);
        assert_eq!(back.atlas.filter.expression, "area > 100");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"schema_version":"atlas_config_v1","atlas":{"enabled":true,"sort":{"enabled":true}}}"#;
        let doc = AtlasConfigDocument::from_json_str(json).unwrap();
        assert!(doc.atlas.enabled);
        assert!(doc.atlas.sort.ascending);
        assert_eq!(doc.atlas.filename_expression, DEFAULT_FILENAME_EXPRESSION);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let json = r#"{"schema_version":"atlas_config_v0","atlas":{}}"#;
        let err = AtlasConfigDocument::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion(v) if v == "atlas_config_v0"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(AtlasConfigDocument::from_json_str("{"), Err(ConfigError::Json(_))));
    }
}
