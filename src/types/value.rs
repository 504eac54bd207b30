//! Typed scalar values carried by feature attributes and produced by expressions.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A typed scalar.
///
/// Deserialization is untagged: JSON strings in ISO-8601 datetime form
/// (`2024-05-01T10:00:00`) become [`Value::Date`], other strings become
/// [`Value::Text`]. A `Text` holding a datetime-shaped string therefore reads
/// back as `Date` and sorts in the date class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Date and time without zone.
    Date(NaiveDateTime),
    /// Text.
    Text(String),
    /// Missing value.
    Null,
}

/// Comparison class used to order values of different types.
///
/// Null < Bool < Number < Date < Text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ValueClass {
    Null,
    Bool,
    Number,
    Date,
    Text,
}

impl Value {
    /// Build a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "real",
            Self::Date(_) => "datetime",
            Self::Text(_) => "string",
            Self::Null => "null",
        }
    }

    /// Truthiness as used by the coverage filter.
    ///
    /// Null is false, numbers are true when non-zero, text is true when non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Date(_) => true,
            Self::Text(s) => !s.is_empty(),
            Self::Null => false,
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Date(_) | Self::Null => None,
        }
    }

    /// Integer view of the value, if it has one. Reals are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }

    /// Text rendering used for names and concatenation. Null renders empty.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            other => other.to_string(),
        }
    }

    fn class(&self) -> ValueClass {
        match self {
            Self::Null => ValueClass::Null,
            Self::Bool(_) => ValueClass::Bool,
            Self::Int(_) | Self::Float(_) => ValueClass::Number,
            Self::Date(_) => ValueClass::Date,
            Self::Text(_) => ValueClass::Text,
        }
    }

    /// Total, type-aware ordering.
    ///
    /// Values of the same class compare by value (integers and reals compare
    /// numerically, text lexically by code point). Values of different classes
    /// order by class. Null is the smallest value.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.class().cmp(&other.class()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
            Self::Text(s) => write!(f, "{}", s),
            Self::Null => write!(f, "NULL"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_numeric_cross_type_ordering() {
        assert_eq!(Value::Int(2).total_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).total_cmp(&Value::Int(3)), Ordering::Equal);
    }

    #[test]
    fn test_null_is_smallest() {
        for v in [Value::Bool(false), Value::Int(i64::MIN), Value::text(""), Value::Float(f64::NEG_INFINITY)] {
            assert_eq!(Value::Null.total_cmp(&v), Ordering::Less);
            assert_eq!(v.total_cmp(&Value::Null), Ordering::Greater);
        }
    }

    #[test]
    fn test_class_ordering() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Value::Int(1_000).total_cmp(&Value::Date(date)), Ordering::Less);
        assert_eq!(Value::Date(date).total_cmp(&Value::text("a")), Ordering::Less);
        assert_eq!(Value::Bool(true).total_cmp(&Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_untagged_deserialize() {
        let values: Vec<Value> =
            serde_json::from_str(r#"[1, 2.5, "x", true, null, "2024-05-01T10:00:00"]"#).unwrap();
        assert_eq!(values[0], Value::Int(1));
        assert_eq!(values[1], Value::Float(2.5));
        assert_eq!(values[2], Value::text("x"));
        assert_eq!(values[3], Value::Bool(true));
        assert_eq!(values[4], Value::Null);
        assert!(matches!(values[5], Value::Date(_)));
    }

    #[test]
    fn test_datetime_shaped_text_reads_back_as_date() {
        let original = Value::text("2024-05-01T10:00:00");
        let json = serde_json::to_string(&original).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Value::Date(_)));
        assert_eq!(back.to_text(), "2024-05-01T10:00:00");

        let plain = Value::text("2024-05-01 parcel");
        let back: Value = serde_json::from_str(&serde_json::to_string(&plain).unwrap()).unwrap();
        assert_eq!(back, plain);
    }
}
