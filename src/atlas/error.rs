//! Atlas error types.

use crate::expression::ExpressionError;
use crate::source::SourceError;
use crate::types::FeatureId;

/// Error type for atlas operations.
///
/// Navigation past the ends of the page sequence is not an error: the
/// cursor methods report it as `false`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AtlasError {
    /// Filter expression failed to compile. The previous pages are kept.
    #[error("Filter expression error: {0}")]
    FilterExpression(ExpressionError),

    /// Sort expression failed to compile. Pages fall back to source order.
    #[error("Sort expression error: {0}")]
    SortExpression(ExpressionError),

    /// Filename expression failed to compile. Filenames fall back to the default scheme.
    #[error("Filename expression error: {0}")]
    FilenameExpression(ExpressionError),

    /// The current feature no longer exists in the coverage source.
    #[error("Feature {0} not found in coverage source")]
    FeatureNotFound(FeatureId),

    /// No coverage source is bound, or the bound source was dropped.
    #[error("No coverage source available")]
    SourceUnavailable,

    /// The operation needs a current page.
    #[error("Atlas is not positioned on a page")]
    NotPositioned,

    /// The coverage source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}
