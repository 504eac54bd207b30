//! Page name and filename resolution.
//!
//! Both resolvers evaluate an expression against a context bound to one page:
//! the page's feature, `page_number` (1-based) and `atlas_totalfeatures`.
//! Neither needs the page to be the current one.
//!
//! ## Fallbacks
//!
//! - Page name: the 1-based page number, when the expression is empty, fails
//!   or yields null.
//! - Filename: `<base>-<page number>.<ext>`, the page number zero-padded to the
//!   digit width of the page count so a directory listing sorts by page.

use std::path::Path;

use crate::expression::context::{VAR_PAGE_NAME, VAR_PAGE_NUMBER, VAR_TOTAL_FEATURES};
use crate::expression::{ExpressionBinding, ExpressionCache, ExpressionContext};
use crate::types::{Feature, Value};

/// Context for evaluating a per-page expression.
pub fn page_context<'a>(
    base: &ExpressionContext<'a>,
    feature: &'a Feature,
    index: usize,
    total: usize,
) -> ExpressionContext<'a> {
    base.clone()
        .with_feature(feature)
        .with_variable(VAR_PAGE_NUMBER, (index + 1) as i64)
        .with_variable(VAR_TOTAL_FEATURES, total as i64)
}

/// Page name used when no expression applies.
pub fn default_page_name(index: usize) -> String {
    (index + 1).to_string()
}

/// Resolve the name of the page at `index`.
pub fn page_name(
    binding: &mut ExpressionBinding,
    cache: &ExpressionCache,
    context: &ExpressionContext<'_>,
    index: usize,
) -> String {
    if binding.is_empty() {
        return default_page_name(index);
    }
    match binding.evaluate(cache, context) {
        Ok(Value::Null) => default_page_name(index),
        Ok(value) => value.to_text(),
        Err(e) => {
            tracing::debug!(page = index, error = %e, "page name evaluation failed, using page number");
            default_page_name(index)
        }
    }
}

/// Resolve names for a whole page list, in order.
pub fn name_pages(
    binding: &mut ExpressionBinding,
    cache: &ExpressionCache,
    base: &ExpressionContext<'_>,
    features: &[Feature],
) -> Vec<String> {
    let total = features.len();
    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let ctx = page_context(base, feature, index, total);
            page_name(binding, cache, &ctx, index)
        })
        .collect()
}

/// Evaluate the filename expression for one page.
///
/// Returns `None` when the expression is empty, fails, or yields null or empty
/// text; the caller then uses [`default_filename`]. The page name is exposed
/// to the expression as `atlas_pagename`.
pub fn filename_stem(
    binding: &mut ExpressionBinding,
    cache: &ExpressionCache,
    context: &ExpressionContext<'_>,
    page_name: &str,
) -> Option<String> {
    if binding.is_empty() {
        return None;
    }
    let ctx = context.clone().with_variable(VAR_PAGE_NAME, page_name);
    match binding.evaluate(cache, &ctx) {
        Ok(value) => Some(value.to_text()).filter(|s| !s.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "filename evaluation failed, using default naming");
            None
        }
    }
}

/// Digits needed to print every page number of a `total`-page atlas.
pub fn pad_width(total: usize) -> usize {
    total.max(1).to_string().len()
}

/// Extension with a leading dot, or empty.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed)
    }
}

/// Default filename: `base-05.ext` for page index 4 of a 12-page atlas.
pub fn default_filename(base_file_path: &str, index: usize, total: usize, extension: &str) -> String {
    format!(
        "{}-{:0width$}{}",
        base_file_path,
        index + 1,
        normalize_extension(extension),
        width = pad_width(total)
    )
}

/// Place `stem` plus extension in the directory of `base_file_path`.
pub fn path_in_base_directory(base_file_path: &str, stem: &str, extension: &str) -> String {
    let file = format!("{}{}", stem, normalize_extension(extension));
    match Path::new(base_file_path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(file).to_string_lossy().into_owned(),
        _ => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExpressionSlot, SimpleExpressionEngine};
    use std::sync::Arc;

    fn cache() -> ExpressionCache {
        ExpressionCache::new(Arc::new(SimpleExpressionEngine::new()))
    }

    fn binding(slot: ExpressionSlot, text: &str) -> ExpressionBinding {
        let mut b = ExpressionBinding::new(slot);
        b.set_text(text);
        b
    }

    #[test]
    fn test_padding_follows_page_count() {
        assert_eq!(pad_width(0), 1);
        assert_eq!(pad_width(9), 1);
        assert_eq!(pad_width(12), 2);
        assert_eq!(pad_width(100), 3);
        assert_eq!(pad_width(999), 3);
        assert_eq!(default_filename("base", 4, 12, "ext"), "base-05.ext");
        assert_eq!(default_filename("out/map", 0, 150, ".png"), "out/map-001.png");
        assert_eq!(default_filename("map", 2, 3, ""), "map-3");
    }

    #[test]
    fn test_page_names_without_cursor() {
        let cache = cache();
        let features = vec![
            Feature::new(7).with_attribute("name", "North"),
            Feature::new(3),
            Feature::new(9).with_attribute("name", "South"),
        ];
        let mut named = binding(ExpressionSlot::PageName, "upper(attribute('name'))");
        let base = ExpressionContext::new();
        let names = name_pages(&mut named, &cache, &base, &features);
        // attribute() yields null for the missing field
        assert_eq!(names, vec!["NORTH", "2", "SOUTH"]);

        let mut empty = ExpressionBinding::new(ExpressionSlot::PageName);
        assert_eq!(name_pages(&mut empty, &cache, &base, &features), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_filename_uses_page_variables() {
        let cache = cache();
        let feature = Feature::new(11).with_attribute("code", "A1");
        let ctx = page_context(&ExpressionContext::new(), &feature, 4, 12);
        let mut name = binding(ExpressionSlot::Filename, "'map_' || code || '_' || @atlas_featurenumber || '_' || $atlas_pagename");
        assert_eq!(filename_stem(&mut name, &cache, &ctx, "Alpha").as_deref(), Some("map_A1_5_Alpha"));
    }

    #[test]
    fn test_filename_failure_falls_back() {
        let cache = cache();
        let feature = Feature::new(1);
        let ctx = page_context(&ExpressionContext::new(), &feature, 4, 12);
        let mut name = binding(ExpressionSlot::Filename, "concat('x_', bad_field)");
        assert_eq!(filename_stem(&mut name, &cache, &ctx, "5"), None);
        assert!(name.last_error().unwrap().contains("bad_field"));
    }

    #[test]
    fn test_path_in_base_directory() {
        assert_eq!(path_in_base_directory("/tmp/out/atlas", "x_1", "png"), "/tmp/out/x_1.png");
        assert_eq!(path_in_base_directory("atlas", "x_1", ".pdf"), "x_1.pdf");
        assert_eq!(normalize_extension("..svg"), ".svg");
    }
}
