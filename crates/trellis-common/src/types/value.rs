//! Runtime property values.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use super::{EmbeddedDocument, Rid};

/// A property value as seen by application code.
///
/// The set of variants is closed: every variant maps to at least one binary
/// type tag, so encoders and decoders can match exhaustively.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Signed 8-bit integer.
    Byte(i8),
    /// Boolean.
    Boolean(bool),
    /// Signed 16-bit integer.
    Short(i16),
    /// Signed 32-bit integer.
    Integer(i32),
    /// Signed 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Arbitrary precision decimal.
    Decimal(BigDecimal),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Calendar date without time zone.
    Date(NaiveDate),
    /// UTC instant.
    DateTime(DateTime<Utc>),
    /// UUID.
    Uuid(Uuid),
    /// Reference to another record.
    Link(Rid),
    /// Heterogeneous list.
    List(Vec<Value>),
    /// String-keyed map, insertion ordered.
    Map(IndexMap<String, Value>),
    /// Nested document without its own identity.
    Embedded(Box<EmbeddedDocument>),
    /// Homogeneous array of shorts.
    ShortArray(Vec<i16>),
    /// Homogeneous array of integers.
    IntegerArray(Vec<i32>),
    /// Homogeneous array of longs.
    LongArray(Vec<i64>),
    /// Homogeneous array of floats.
    FloatArray(Vec<f32>),
    /// Homogeneous array of doubles.
    DoubleArray(Vec<f64>),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Byte(_) => "byte",
            Self::Boolean(_) => "boolean",
            Self::Short(_) => "short",
            Self::Integer(_) => "integer",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Uuid(_) => "uuid",
            Self::Link(_) => "link",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Embedded(_) => "embedded",
            Self::ShortArray(_) => "short array",
            Self::IntegerArray(_) => "integer array",
            Self::LongArray(_) => "long array",
            Self::FloatArray(_) => "float array",
            Self::DoubleArray(_) => "double array",
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string slice if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns any integral variant widened to `i64`.
    #[must_use]
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Short(v) => Some(i64::from(*v)),
            Self::Integer(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns any numeric variant as `f64`.
    #[must_use]
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_int64().map(|v| v as f64),
        }
    }

    /// Returns the boolean if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the referenced RID if this is a link.
    #[must_use]
    pub fn as_link(&self) -> Option<Rid> {
        match self {
            Self::Link(rid) => Some(*rid),
            _ => None,
        }
    }

    /// Returns the embedded document if this is one.
    #[must_use]
    pub fn as_embedded(&self) -> Option<&EmbeddedDocument> {
        match self {
            Self::Embedded(doc) => Some(doc),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Rid> for Value {
    fn from(v: Rid) -> Self {
        Self::Link(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<EmbeddedDocument> for Value {
    fn from(v: EmbeddedDocument) -> Self {
        Self::Embedded(Box::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from("Alice").as_str(), Some("Alice"));
        assert_eq!(Value::from(30i32).as_int64(), Some(30));
        assert_eq!(Value::from(7i8).as_int64(), Some(7));
        assert_eq!(Value::from(2.5f32).as_float64(), Some(2.5));
        assert_eq!(Value::from(4i64).as_float64(), Some(4.0));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(Rid::new(1, 2)).as_link(), Some(Rid::new(1, 2)));
        assert!(Value::from(None::<i32>).is_null());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Null.kind_name(), "null");
        assert_eq!(Value::LongArray(vec![]).kind_name(), "long array");
        assert_eq!(
            Value::from(EmbeddedDocument::new("Address")).kind_name(),
            "embedded"
        );
    }
}
