//! Coverage query: filter and sort the coverage source.
//!
//! ## Algorithm
//!
//! 1. Build a context carrying the coverage layer metadata
//! 2. If filtering: compile the filter (failure aborts the query), then keep
//!    features whose filter value is truthy; evaluation failures exclude the feature
//! 3. If sorting: compile the sort expression (failure falls back to source
//!    order), evaluate it per feature; evaluation failures give a null key
//! 4. Stable-sort by key with [`FeatureKeySorter`]
//!
//! The query is pure with respect to the atlas: it reads the source and the
//! expression bindings and returns a [`QueryOutcome`]. Replacing the page
//! sequence is the caller's job.

use std::collections::BTreeMap;

use crate::expression::{ExpressionBinding, ExpressionCache, ExpressionContext, ExpressionError};
use crate::sorter::{FeatureKeySorter, SortKeys};
use crate::source::{CoverageSource, SourceError};
use crate::types::{Feature, FeatureId, Value};

/// Error type for query operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// Filter expression failed to compile.
    #[error("Filter expression error: {0}")]
    FilterExpression(ExpressionError),
    /// Source failed to serve features.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Expression bindings the query reads. `None` disables the step.
pub struct QueryBindings<'a> {
    /// Filter binding when filtering is enabled.
    pub filter: Option<&'a mut ExpressionBinding>,
    /// Sort binding and direction when sorting is enabled.
    pub sort: Option<(&'a mut ExpressionBinding, bool)>,
}

/// Result of one coverage query.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    /// Matching features in final page order.
    pub features: Vec<Feature>,
    /// Sort key per matching feature, empty when sorting was off or failed to compile.
    pub sort_keys: SortKeys,
    /// Sort compile error, when sorting fell back to source order.
    pub sort_error: Option<ExpressionError>,
    /// Features excluded because the filter failed to evaluate.
    pub filter_failures: usize,
    /// Features given a null key because the sort failed to evaluate.
    pub sort_failures: usize,
}

impl QueryOutcome {
    /// Identifiers in page order.
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.features.iter().map(|f| f.id).collect()
    }
}

/// Run the coverage query.
pub fn execute(
    source: &dyn CoverageSource,
    cache: &ExpressionCache,
    bindings: QueryBindings<'_>,
) -> Result<QueryOutcome, QueryError> {
    let base = ExpressionContext::for_layer(source.layer_id(), source.layer_name());
    let mut outcome = QueryOutcome::default();

    let filter = match bindings.filter {
        Some(binding) => Some(binding.compile(cache).map_err(QueryError::FilterExpression)?),
        None => None,
    };

    let mut features = source.fetch_all()?;

    if let Some(filter) = filter {
        features.retain(|feature| {
            let ctx = base.clone().with_feature(feature);
            match filter.evaluate(&ctx) {
                Ok(value) => value.is_truthy(),
                Err(e) => {
                    tracing::debug!(feature_id = %feature.id, error = %e, "filter evaluation failed, feature excluded");
                    outcome.filter_failures += 1;
                    false
                }
            }
        });
    }

    if let Some((binding, ascending)) = bindings.sort {
        match binding.compile(cache) {
            Ok(sort) => {
                for feature in &features {
                    let ctx = base.clone().with_feature(feature);
                    let key = sort.evaluate(&ctx).unwrap_or_else(|e| {
                        tracing::debug!(feature_id = %feature.id, error = %e, "sort evaluation failed, using null key");
                        outcome.sort_failures += 1;
                        Value::Null
                    });
                    outcome.sort_keys.insert(feature.id, key);
                }
                let mut ids: Vec<FeatureId> = features.iter().map(|f| f.id).collect();
                FeatureKeySorter::new(ascending).sort(&mut ids, &outcome.sort_keys);
                let mut by_id: BTreeMap<FeatureId, Feature> = features.into_iter().map(|f| (f.id, f)).collect();
                features = ids.into_iter().filter_map(|id| by_id.remove(&id)).collect();
            }
            Err(e) => {
                tracing::warn!(error = %e, "sort expression invalid, keeping source order");
                outcome.sort_error = Some(e);
            }
        }
    }

    outcome.features = features;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionSlot, SimpleExpressionEngine};
    use crate::source::InMemoryCoverageSource;
    use std::sync::Arc;

    fn source() -> InMemoryCoverageSource {
        InMemoryCoverageSource::new("towns", "Towns").with_features([
            Feature::new(1).with_attribute("name", "Alta").with_attribute("pop", 20_000_i64),
            Feature::new(2).with_attribute("name", "Bodø").with_attribute("pop", 52_000_i64),
            Feature::new(3).with_attribute("name", "Hamar"),
            Feature::new(4).with_attribute("name", "Moss").with_attribute("pop", 50_000_i64),
        ])
    }

    fn cache() -> ExpressionCache {
        ExpressionCache::new(Arc::new(SimpleExpressionEngine::new()))
    }

    fn binding(slot: ExpressionSlot, text: &str) -> ExpressionBinding {
        let mut b = ExpressionBinding::new(slot);
        b.set_text(text);
        b
    }

    fn ids(outcome: &QueryOutcome) -> Vec<i64> {
        outcome.feature_ids().iter().map(FeatureId::get).collect()
    }

    #[test]
    fn test_no_filter_no_sort_keeps_source_order() {
        let out = execute(&source(), &cache(), QueryBindings { filter: None, sort: None }).unwrap();
        assert_eq!(ids(&out), vec![1, 2, 3, 4]);
        assert!(out.sort_keys.is_empty());
    }

    #[test]
    fn test_filter_excludes_failures() {
        let mut filter = binding(ExpressionSlot::Filter, "pop > 25000");
        let out = execute(&source(), &cache(), QueryBindings { filter: Some(&mut filter), sort: None }).unwrap();
        // Hamar has no pop field: evaluation fails, feature excluded
        assert_eq!(ids(&out), vec![2, 4]);
        assert_eq!(out.filter_failures, 1);
    }

    #[test]
    fn test_filter_compile_error_aborts() {
        let mut filter = binding(ExpressionSlot::Filter, "pop >");
        let err = execute(&source(), &cache(), QueryBindings { filter: Some(&mut filter), sort: None }).unwrap_err();
        assert!(matches!(err, QueryError::FilterExpression(_)));
        assert!(filter.last_error().is_some());
    }

    #[test]
    fn test_sort_with_null_key_on_failure() {
        let mut sort = binding(ExpressionSlot::Sort, "pop");
        let out = execute(&source(), &cache(), QueryBindings { filter: None, sort: Some((&mut sort, false)) }).unwrap();
        assert_eq!(ids(&out), vec![3, 2, 4, 1]);
        assert_eq!(out.sort_failures, 1);
        assert_eq!(out.sort_keys[&FeatureId::new(3)], Value::Null);
    }

    #[test]
    fn test_sort_compile_error_falls_back() {
        let mut sort = binding(ExpressionSlot::Sort, "nope(");
        let out = execute(&source(), &cache(), QueryBindings { filter: None, sort: Some((&mut sort, true)) }).unwrap();
        assert_eq!(ids(&out), vec![1, 2, 3, 4]);
        assert!(out.sort_error.is_some());
        assert!(sort.last_error().is_some());
    }

    #[test]
    fn test_source_failure() {
        let src = source();
        src.set_offline(true);
        let err = execute(&src, &cache(), QueryBindings { filter: None, sort: None }).unwrap_err();
        assert!(matches!(err, QueryError::Source(SourceError::Unavailable(_))));
    }
}
