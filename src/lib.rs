//! # atlas-iterator
//!
//! Deterministic atlas iteration over a coverage dataset.
//!
//! The engine answers one question:
//!
//! > Given a coverage layer and a set of expressions, **which feature is on
//! > which page, in what order, under what name**?
//!
//! ## Core Contract
//!
//! 1. Filter the coverage features and order them by a sort key (nulls first)
//! 2. Produce an immutable page sequence with a **fingerprint** of its (id, name) list
//! 3. Navigate that sequence with a cursor and resolve per-page output filenames
//!
//! ## Architecture
//!
//! ```text
//! CoverageSource → Coverage Query (filter) → FeatureKeySorter → PageSequence
//!                        ↓                                          ↓
//!                 ExpressionCache                           Cursor (AtlasEngine)
//!                        ↓                                          ↓
//!                 ExpressionEngine                    page name / filename resolver
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same configuration + same source data → identical page sequence and fingerprint
//! - Null sort keys come first in both directions
//! - Equal sort keys keep source iteration order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod expression;
pub mod source;
pub mod sorter;
pub mod query;
pub mod naming;
pub mod atlas;
pub mod config;
pub mod logging;

// Re-exports
pub use types::{Value, Feature, FeatureId, Geometry, BoundingBox, Page, PageSequence};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};
pub use expression::{
    CompiledExpression, ExpressionEngine, ExpressionError, ExpressionContext,
    ExpressionBinding, ExpressionSlot, ExpressionCache, CacheConfig, CacheStats,
    SimpleExpressionEngine,
};
pub use source::{
    CoverageSource, CoverageLayerRef, LayerReference, LayerResolver, SourceError,
    InMemoryCoverageSource, LayerRegistry,
};
pub use sorter::{FeatureKeySorter, SortKeys, compare_sort_keys};
pub use query::{QueryBindings, QueryError, QueryOutcome};
pub use atlas::{
    AtlasEngine, AtlasError, AtlasEvent, AtlasObserver, ObserverId, RecordingObserver,
    Cursor, CursorPosition, PageIterator, CoverageVisibility, LayerVisibility,
    NO_MATCHING_FEATURES,
};
pub use config::{
    AtlasConfig, AtlasConfigDocument, ConfigError, FilterSettings, SortSettings,
    SerializableConfig, ATLAS_CONFIG_SCHEMA_VERSION, DEFAULT_FILENAME_EXPRESSION,
};
pub use logging::init_tracing;
