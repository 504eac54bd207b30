//! Expression slots held by the atlas.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Value;
use super::{CompiledExpression, ExpressionCache, ExpressionContext, ExpressionError};

/// The expression slots of an atlas. Each keeps its own last error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionSlot {
    /// Coverage filter.
    Filter,
    /// Sort key.
    Sort,
    /// Output filename.
    Filename,
    /// Page name.
    PageName,
}

impl fmt::Display for ExpressionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter => write!(f, "filter"),
            Self::Sort => write!(f, "sort"),
            Self::Filename => write!(f, "filename"),
            Self::PageName => write!(f, "page_name"),
        }
    }
}

/// Expression text bound to a slot, with its compiled form and last error.
///
/// Setting identical text keeps the compiled form; the first compile after a
/// change goes through the shared [`ExpressionCache`].
#[derive(Debug, Clone)]
pub struct ExpressionBinding {
    slot: ExpressionSlot,
    text: String,
    compiled: Option<Result<Arc<dyn CompiledExpression>, ExpressionError>>,
    last_error: Option<String>,
}

impl ExpressionBinding {
    /// Create an empty binding for a slot.
    pub fn new(slot: ExpressionSlot) -> Self {
        Self {
            slot,
            text: String::new(),
            compiled: None,
            last_error: None,
        }
    }

    /// Slot this binding serves.
    pub fn slot(&self) -> ExpressionSlot {
        self.slot
    }

    /// Current expression text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when no expression text is set (whitespace only counts as empty).
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Replace the text. Returns false when the text is unchanged.
    pub fn set_text(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text = text.to_string();
        self.compiled = None;
        self.last_error = None;
        true
    }

    /// Compiled form of the current text, compiling on first use.
    ///
    /// A compile error is recorded as the slot's last error.
    pub fn compile(&mut self, cache: &ExpressionCache) -> Result<Arc<dyn CompiledExpression>, ExpressionError> {
        let result = match &self.compiled {
            Some(result) => result.clone(),
            None => {
                let result = cache.compile(&self.text);
                if let Err(e) = &result {
                    tracing::warn!(slot = %self.slot, expression = %self.text, error = %e, "expression failed to compile");
                }
                self.compiled = Some(result.clone());
                result
            }
        };
        self.record(&result);
        result
    }

    /// Compile if needed, then evaluate. Any failure is recorded as the last error.
    pub fn evaluate(&mut self, cache: &ExpressionCache, context: &ExpressionContext<'_>) -> Result<Value, ExpressionError> {
        let compiled = self.compile(cache)?;
        let result = compiled.evaluate(context);
        self.record(&result);
        result
    }

    /// Message of the last compile or evaluation failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record an error produced outside the binding (for example by a caller
    /// evaluating the compiled form directly).
    pub fn set_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    fn record<T>(&mut self, result: &Result<T, ExpressionError>) {
        self.last_error = result.as_ref().err().map(ToString::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::SimpleExpressionEngine;
    use crate::types::Feature;

    fn cache() -> ExpressionCache {
        ExpressionCache::new(Arc::new(SimpleExpressionEngine::new()))
    }

    #[test]
    fn test_same_text_does_not_recompile() {
        let cache = cache();
        let mut binding = ExpressionBinding::new(ExpressionSlot::Filter);
        assert!(binding.set_text("pop > 10"));
        binding.compile(&cache).unwrap();
        assert!(!binding.set_text("pop > 10"));
        binding.compile(&cache).unwrap();
        assert_eq!(cache.stats().compiles, 1);
    }

    #[test]
    fn test_compile_error_recorded() {
        let cache = cache();
        let mut binding = ExpressionBinding::new(ExpressionSlot::Sort);
        binding.set_text("pop >");
        assert!(binding.compile(&cache).is_err());
        assert!(binding.last_error().is_some());

        binding.set_text("pop");
        assert!(binding.last_error().is_none());
        assert!(binding.compile(&cache).is_ok());
    }

    #[test]
    fn test_evaluation_error_recorded_then_cleared() {
        let cache = cache();
        let mut binding = ExpressionBinding::new(ExpressionSlot::Filename);
        binding.set_text("name");

        let without = Feature::new(1);
        let err = binding.evaluate(&cache, &ExpressionContext::new().with_feature(&without));
        assert!(err.is_err());
        assert!(binding.last_error().unwrap().contains("name"));

        let with = Feature::new(2).with_attribute("name", "ok");
        let value = binding.evaluate(&cache, &ExpressionContext::new().with_feature(&with)).unwrap();
        assert_eq!(value, Value::text("ok"));
        assert!(binding.last_error().is_none());
    }

    #[test]
    fn test_empty_text() {
        let mut binding = ExpressionBinding::new(ExpressionSlot::PageName);
        assert!(binding.is_empty());
        binding.set_text("  ");
        assert!(binding.is_empty());
    }
}
