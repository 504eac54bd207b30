//! Core types for the atlas engine.

pub mod value;
pub mod feature;
pub mod page;

pub use value::Value;
pub use feature::{FeatureId, Feature, Geometry, BoundingBox};
pub use page::{Page, PageSequence};
