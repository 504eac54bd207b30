//! Feature types served by a coverage source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::Value;

/// Source-scoped identifier of a feature.
///
/// Unique within one coverage source for the lifetime of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(i64);

impl FeatureId {
    /// Create a new FeatureId.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FeatureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<i32> for FeatureId {
    fn from(id: i32) -> Self {
        Self(i64::from(id))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

impl BoundingBox {
    /// Width of the box.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Feature geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// Single point.
    Point([f64; 2]),
    /// Open line.
    LineString(Vec<[f64; 2]>),
    /// Polygon exterior ring.
    Polygon(Vec<[f64; 2]>),
}

impl Geometry {
    /// Bounding box of the geometry, `None` for an empty coordinate list.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let coords: &[[f64; 2]] = match self {
            Self::Point(p) => std::slice::from_ref(p),
            Self::LineString(c) | Self::Polygon(c) => c,
        };
        let first = coords.first()?;
        let init = BoundingBox { min_x: first[0], min_y: first[1], max_x: first[0], max_y: first[1] };
        Some(coords.iter().skip(1).fold(init, |b, c| BoundingBox {
            min_x: b.min_x.min(c[0]),
            min_y: b.min_y.min(c[1]),
            max_x: b.max_x.max(c[0]),
            max_y: b.max_y.max(c[1]),
        }))
    }
}

/// A materialized row: identifier, attributes and optional geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Identifier within the source.
    pub id: FeatureId,
    /// Attribute values by field name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Geometry, if any.
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl Feature {
    /// Create a feature with no attributes and no geometry.
    pub fn new(id: impl Into<FeatureId>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
            geometry: None,
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set the geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Look up an attribute by field name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_bounding_box() {
        let g = Geometry::Polygon(vec![[0.0, 1.0], [4.0, -2.0], [2.0, 5.0]]);
        let b = g.bounding_box().unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (0.0, -2.0, 4.0, 5.0));
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 7.0);
    }

    #[test]
    fn test_empty_geometry_has_no_box() {
        assert!(Geometry::LineString(vec![]).bounding_box().is_none());
    }

    #[test]
    fn test_feature_json() {
        let f: Feature = serde_json::from_str(
            r#"{"id": 7, "attributes": {"name": "Oslo", "pop": 700000},
                "geometry": {"type": "Point", "coordinates": [10.7, 59.9]}}"#,
        )
        .unwrap();
        assert_eq!(f.id, FeatureId::new(7));
        assert_eq!(f.attribute("name"), Some(&Value::text("Oslo")));
        assert_eq!(f.attribute("pop"), Some(&Value::Int(700000)));
        assert!(matches!(f.geometry, Some(Geometry::Point(_))));
    }
}
