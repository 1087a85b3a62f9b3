//! Binary type tags.
//!
//! Every encoded value starts with one of these tags. The set is closed:
//! adding a tag means adding a match arm at every encode and decode site.
//!
//! | Tag | Payload |
//! |-----|---------|
//! | `Null` | none |
//! | `String` | length-prefixed UTF-8 |
//! | `CompressedString` | dictionary id (varint) |
//! | `Byte`, `Boolean` | 1 byte |
//! | `Short`, `Integer`, `Long` | signed varint |
//! | `Float`, `Double` | IEEE bits as signed varint |
//! | `Decimal` | scale varint + length-prefixed unscaled bytes |
//! | `Date` | days since epoch (signed varint) |
//! | `DateTime*` | timestamp at the tag's precision (signed varint) |
//! | `Rid` | fixed `i32` bucket + `i64` position |
//! | `CompressedRid` | two signed varints |
//! | `List` | count + tagged values |
//! | `Map` | count + tagged key/value pairs |
//! | `Embedded` | type id + length + nested header and content |
//! | `ArrayOf*` | count + fixed-width big-endian elements |
//! | `Uuid` | two signed varints (high and low 64 bits) |

use std::fmt;

use trellis_common::types::Value;
use trellis_common::utils::error::StorageError;

/// Resolution of a stored timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateTimePrecision {
    /// Whole seconds.
    Second,
    /// Milliseconds.
    #[default]
    Millisecond,
    /// Microseconds.
    Microsecond,
    /// Nanoseconds.
    Nanosecond,
}

/// Type tag written before every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinaryType {
    /// No value.
    Null = 0,
    /// Inline UTF-8 string.
    String = 1,
    /// Signed byte.
    Byte = 2,
    /// 16-bit integer.
    Short = 3,
    /// 32-bit integer.
    Integer = 4,
    /// 64-bit integer.
    Long = 5,
    /// 32-bit float.
    Float = 6,
    /// 64-bit float.
    Double = 7,
    /// Calendar date.
    Date = 8,
    /// Timestamp in milliseconds.
    DateTime = 9,
    /// Arbitrary precision decimal.
    Decimal = 10,
    /// Fixed-width record id.
    Rid = 11,
    /// Variable-length record id.
    CompressedRid = 12,
    /// Raw bytes.
    Binary = 13,
    /// Boolean.
    Boolean = 14,
    /// Heterogeneous list.
    List = 15,
    /// String-keyed map.
    Map = 16,
    /// String replaced by its dictionary id.
    CompressedString = 17,
    /// Nested document.
    Embedded = 18,
    /// Timestamp in microseconds.
    DateTimeMicros = 19,
    /// Timestamp in nanoseconds.
    DateTimeNanos = 20,
    /// Timestamp in seconds.
    DateTimeSecond = 21,
    /// Array of 16-bit integers.
    ArrayOfShorts = 22,
    /// Array of 32-bit integers.
    ArrayOfIntegers = 23,
    /// Array of 64-bit integers.
    ArrayOfLongs = 24,
    /// Array of 32-bit floats.
    ArrayOfFloats = 25,
    /// Array of 64-bit floats.
    ArrayOfDoubles = 26,
    /// UUID.
    Uuid = 27,
}

impl BinaryType {
    /// Returns the tag byte.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Returns the tag name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::String => "STRING",
            Self::Byte => "BYTE",
            Self::Short => "SHORT",
            Self::Integer => "INTEGER",
            Self::Long => "LONG",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
            Self::Decimal => "DECIMAL",
            Self::Rid => "RID",
            Self::CompressedRid => "COMPRESSED_RID",
            Self::Binary => "BINARY",
            Self::Boolean => "BOOLEAN",
            Self::List => "LIST",
            Self::Map => "MAP",
            Self::CompressedString => "COMPRESSED_STRING",
            Self::Embedded => "EMBEDDED",
            Self::DateTimeMicros => "DATETIME_MICROS",
            Self::DateTimeNanos => "DATETIME_NANOS",
            Self::DateTimeSecond => "DATETIME_SECOND",
            Self::ArrayOfShorts => "ARRAY_OF_SHORTS",
            Self::ArrayOfIntegers => "ARRAY_OF_INTEGERS",
            Self::ArrayOfLongs => "ARRAY_OF_LONGS",
            Self::ArrayOfFloats => "ARRAY_OF_FLOATS",
            Self::ArrayOfDoubles => "ARRAY_OF_DOUBLES",
            Self::Uuid => "UUID",
        }
    }

    /// Returns true for tags whose payload is never encrypted.
    ///
    /// Record ids must stay readable so edge segments and indexes can be
    /// maintained without the key.
    #[must_use]
    pub const fn bypasses_encryption(self) -> bool {
        matches!(self, Self::Null | Self::Rid | Self::CompressedRid)
    }

    /// Returns the precision of a datetime tag.
    #[must_use]
    pub const fn datetime_precision(self) -> Option<DateTimePrecision> {
        match self {
            Self::DateTimeSecond => Some(DateTimePrecision::Second),
            Self::DateTime => Some(DateTimePrecision::Millisecond),
            Self::DateTimeMicros => Some(DateTimePrecision::Microsecond),
            Self::DateTimeNanos => Some(DateTimePrecision::Nanosecond),
            _ => None,
        }
    }

    /// Returns the datetime tag for a precision.
    #[must_use]
    pub const fn for_precision(precision: DateTimePrecision) -> Self {
        match precision {
            DateTimePrecision::Second => Self::DateTimeSecond,
            DateTimePrecision::Millisecond => Self::DateTime,
            DateTimePrecision::Microsecond => Self::DateTimeMicros,
            DateTimePrecision::Nanosecond => Self::DateTimeNanos,
        }
    }

    /// Returns the default tag for a runtime value.
    ///
    /// `precision` selects the tag for datetimes. Strings always map to
    /// [`BinaryType::String`]; the encoder swaps in
    /// [`BinaryType::CompressedString`] when the dictionary has the string.
    #[must_use]
    pub fn of(value: &Value, precision: DateTimePrecision) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Byte(_) => Self::Byte,
            Value::Boolean(_) => Self::Boolean,
            Value::Short(_) => Self::Short,
            Value::Integer(_) => Self::Integer,
            Value::Long(_) => Self::Long,
            Value::Float(_) => Self::Float,
            Value::Double(_) => Self::Double,
            Value::Decimal(_) => Self::Decimal,
            Value::String(_) => Self::String,
            Value::Binary(_) => Self::Binary,
            Value::Date(_) => Self::Date,
            Value::DateTime(_) => Self::for_precision(precision),
            Value::Uuid(_) => Self::Uuid,
            Value::Link(_) => Self::Rid,
            Value::List(_) => Self::List,
            Value::Map(_) => Self::Map,
            Value::Embedded(_) => Self::Embedded,
            Value::ShortArray(_) => Self::ArrayOfShorts,
            Value::IntegerArray(_) => Self::ArrayOfIntegers,
            Value::LongArray(_) => Self::ArrayOfLongs,
            Value::FloatArray(_) => Self::ArrayOfFloats,
            Value::DoubleArray(_) => Self::ArrayOfDoubles,
        }
    }
}

impl TryFrom<u8> for BinaryType {
    type Error = StorageError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::Null,
            1 => Self::String,
            2 => Self::Byte,
            3 => Self::Short,
            4 => Self::Integer,
            5 => Self::Long,
            6 => Self::Float,
            7 => Self::Double,
            8 => Self::Date,
            9 => Self::DateTime,
            10 => Self::Decimal,
            11 => Self::Rid,
            12 => Self::CompressedRid,
            13 => Self::Binary,
            14 => Self::Boolean,
            15 => Self::List,
            16 => Self::Map,
            17 => Self::CompressedString,
            18 => Self::Embedded,
            19 => Self::DateTimeMicros,
            20 => Self::DateTimeNanos,
            21 => Self::DateTimeSecond,
            22 => Self::ArrayOfShorts,
            23 => Self::ArrayOfIntegers,
            24 => Self::ArrayOfLongs,
            25 => Self::ArrayOfFloats,
            26 => Self::ArrayOfDoubles,
            27 => Self::Uuid,
            other => return Err(StorageError::InvalidTypeTag(other)),
        })
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trellis_common::types::Rid;

    #[test]
    fn test_tag_bytes_round_trip() {
        for tag in 0u8..=27 {
            let ty = BinaryType::try_from(tag).unwrap();
            assert_eq!(ty.id(), tag);
        }
        assert!(matches!(
            BinaryType::try_from(28),
            Err(StorageError::InvalidTypeTag(28))
        ));
    }

    #[test]
    fn test_encryption_bypass() {
        assert!(BinaryType::Rid.bypasses_encryption());
        assert!(BinaryType::CompressedRid.bypasses_encryption());
        assert!(BinaryType::Null.bypasses_encryption());
        assert!(!BinaryType::String.bypasses_encryption());
        assert!(!BinaryType::Embedded.bypasses_encryption());
    }

    #[test]
    fn test_datetime_tags() {
        for p in [
            DateTimePrecision::Second,
            DateTimePrecision::Millisecond,
            DateTimePrecision::Microsecond,
            DateTimePrecision::Nanosecond,
        ] {
            assert_eq!(BinaryType::for_precision(p).datetime_precision(), Some(p));
        }
        assert_eq!(BinaryType::Date.datetime_precision(), None);
    }

    #[test]
    fn test_tag_of_value() {
        let p = DateTimePrecision::Microsecond;
        assert_eq!(BinaryType::of(&Value::from("x"), p), BinaryType::String);
        assert_eq!(BinaryType::of(&Value::from(Rid::new(1, 1)), p), BinaryType::Rid);
        assert_eq!(
            BinaryType::of(&Value::from(Utc::now()), p),
            BinaryType::DateTimeMicros
        );
        assert_eq!(
            BinaryType::of(&Value::DoubleArray(vec![1.0]), p),
            BinaryType::ArrayOfDoubles
        );
    }
}
