//! Property values and their declared types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Name, Path};

/// Declared type of a property.
///
/// `Undefined` only appears in definitions, where it means "any type".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    String,
    Binary,
    Long,
    Double,
    Date,
    Boolean,
    Name,
    Path,
    Reference,
    Undefined,
}

impl PropertyType {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Binary => "Binary",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Date => "Date",
            PropertyType::Boolean => "Boolean",
            PropertyType::Name => "Name",
            PropertyType::Path => "Path",
            PropertyType::Reference => "Reference",
            PropertyType::Undefined => "undefined",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single property value.
///
/// `Reference` carries the unique id of the target node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    String(String),
    Binary(Vec<u8>),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    Name(Name),
    Path(Path),
    Reference(String),
}

impl Value {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Value::String(_) => PropertyType::String,
            Value::Binary(_) => PropertyType::Binary,
            Value::Long(_) => PropertyType::Long,
            Value::Double(_) => PropertyType::Double,
            Value::Date(_) => PropertyType::Date,
            Value::Boolean(_) => PropertyType::Boolean,
            Value::Name(_) => PropertyType::Name,
            Value::Path(_) => PropertyType::Path,
            Value::Reference(_) => PropertyType::Reference,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Unique id of the referenced node, for `Reference` values.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Value::Reference(uid) => Some(uid),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Boolean(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Long(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Long(v) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Double(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<Name> for Value { fn from(v: Name) -> Self { Value::Name(v) } }
impl From<Path> for Value { fn from(v: Path) -> Self { Value::Path(v) } }
impl From<DateTime<Utc>> for Value { fn from(v: DateTime<Utc>) -> Self { Value::Date(v) } }

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::Binary(b) => write!(f, "<binary[{}]>", b.len()),
            Value::Long(i) => write!(f, "{i}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Name(n) => write!(f, "{n}"),
            Value::Path(p) => write!(f, "{p}"),
            Value::Reference(uid) => write!(f, "ref:{uid}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Long(42));
        assert_eq!(Value::from(3.5), Value::Double(3.5));
        assert_eq!(Value::from(true), Value::Boolean(true));
    }

    #[test]
    fn test_property_type_of_value() {
        assert_eq!(Value::Reference("x".into()).property_type(), PropertyType::Reference);
        assert_eq!(Value::from(Name::from("nt:file")).property_type(), PropertyType::Name);
        assert_eq!(Value::from(Path::root()).property_type(), PropertyType::Path);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::Binary(vec![1, 2, 3]).to_string(), "<binary[3]>");
        assert_eq!(Value::Reference("u1".into()).to_string(), "ref:u1");
    }
}
