//! Evaluation context: the feature under evaluation plus named variables.
//!
//! ## Variables
//!
//! | Name | Value |
//! |------|-------|
//! | `feature` | the context feature (use with `attribute($feature, 'field')`) |
//! | `id` | identifier of the context feature |
//! | `page_number` | 1-based page number (alias `atlas_featurenumber`) |
//! | `atlas_pagename` | resolved page name |
//! | `atlas_totalfeatures` | number of pages |
//! | `layer_id` | coverage layer id (alias `atlas_layerid`) |
//! | `layer_name` | coverage layer name (alias `atlas_layername`) |

use std::collections::BTreeMap;

use crate::types::{Feature, Value};

/// Name of the feature variable.
pub const VAR_FEATURE: &str = "feature";
/// Name of the feature id variable.
pub const VAR_ID: &str = "id";
/// Name of the 1-based page number variable.
pub const VAR_PAGE_NUMBER: &str = "page_number";
/// Name of the page name variable.
pub const VAR_PAGE_NAME: &str = "atlas_pagename";
/// Name of the page count variable.
pub const VAR_TOTAL_FEATURES: &str = "atlas_totalfeatures";
/// Name of the coverage layer id variable.
pub const VAR_LAYER_ID: &str = "layer_id";
/// Name of the coverage layer name variable.
pub const VAR_LAYER_NAME: &str = "layer_name";

/// Map an alias to its canonical variable name.
fn canonical_name(name: &str) -> &str {
    match name {
        "atlas_featurenumber" => VAR_PAGE_NUMBER,
        "atlas_featureid" => VAR_ID,
        "atlas_layerid" => VAR_LAYER_ID,
        "atlas_layername" => VAR_LAYER_NAME,
        other => other,
    }
}

/// Expression evaluation context.
///
/// Borrows the feature; contexts are built per evaluation and are cheap.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext<'a> {
    feature: Option<&'a Feature>,
    variables: BTreeMap<String, Value>,
}

impl<'a> ExpressionContext<'a> {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context carrying coverage layer metadata.
    pub fn for_layer(layer_id: &str, layer_name: &str) -> Self {
        Self::new()
            .with_variable(VAR_LAYER_ID, layer_id)
            .with_variable(VAR_LAYER_NAME, layer_name)
    }

    /// Bind the feature under evaluation.
    pub fn with_feature(mut self, feature: &'a Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Bind a variable, builder style.
    pub fn with_variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Bind a variable. Aliases bind their canonical name.
    pub fn set_variable(&mut self, name: &str, value: impl Into<Value>) {
        self.variables.insert(canonical_name(name).to_string(), value.into());
    }

    /// The feature under evaluation.
    pub fn feature(&self) -> Option<&'a Feature> {
        self.feature
    }

    /// Resolve a variable. `id` comes from the bound feature when present.
    pub fn variable(&self, name: &str) -> Option<Value> {
        let name = canonical_name(name);
        if name == VAR_ID {
            if let Some(feature) = self.feature {
                return Some(Value::Int(feature.id.get()));
            }
        }
        self.variables.get(name).cloned()
    }

    /// Check whether a variable is bound (the feature counts as `$feature`).
    pub fn has_variable(&self, name: &str) -> bool {
        let name = canonical_name(name);
        (name == VAR_FEATURE && self.feature.is_some()) || self.variable(name).is_some()
    }
}
