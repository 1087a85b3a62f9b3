//! Tagged value encoding.

use bigdecimal::BigDecimal;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use trellis_common::types::{EmbeddedContent, EmbeddedDocument, Value};
use trellis_common::utils::error::{Error, Result};
use uuid::Uuid;

use super::BinarySerializer;
use crate::record::RecordType;
use crate::storage::{BinaryReader, BinaryType, BinaryWriter, DateTimePrecision};

/// Deepest list or map nesting the codec writes or reads back.
pub const MAX_NESTING_DEPTH: usize = 128;

fn epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

fn to_timestamp(value: &DateTime<Utc>, precision: DateTimePrecision) -> Option<i64> {
    match precision {
        DateTimePrecision::Second => Some(value.timestamp()),
        DateTimePrecision::Millisecond => Some(value.timestamp_millis()),
        DateTimePrecision::Microsecond => Some(value.timestamp_micros()),
        DateTimePrecision::Nanosecond => value.timestamp_nanos_opt(),
    }
}

fn from_timestamp(timestamp: i64, precision: DateTimePrecision) -> Option<DateTime<Utc>> {
    match precision {
        DateTimePrecision::Second => DateTime::from_timestamp(timestamp, 0),
        DateTimePrecision::Millisecond => DateTime::from_timestamp_millis(timestamp),
        DateTimePrecision::Microsecond => DateTime::from_timestamp_micros(timestamp),
        DateTimePrecision::Nanosecond => Some(DateTime::from_timestamp_nanos(timestamp)),
    }
}

fn out_of_range(what: &str, value: i64) -> Error {
    Error::corruption(format!("{what} {value} out of range"))
}

impl BinarySerializer {
    /// Picks the tag for a property value.
    ///
    /// A declared property type wins over the runtime type. Strings already
    /// present in the dictionary are stored as their id.
    pub(crate) fn tag_for(&self, type_name: &str, property: &str, value: &Value) -> BinaryType {
        if value.is_null() {
            return BinaryType::Null;
        }
        let declared = self
            .schema
            .as_ref()
            .and_then(|schema| schema.property_type(type_name, property));
        let tag = declared.unwrap_or_else(|| BinaryType::of(value, self.datetime_precision));

        match (tag, value) {
            (BinaryType::String, Value::String(s)) if self.dictionary.get_id(s, false).is_some() => {
                BinaryType::CompressedString
            }
            _ => tag,
        }
    }

    /// Encodes the payload of `value` as `tag`, without the tag byte.
    ///
    /// With encryption configured, the payload is encrypted and written
    /// length-prefixed, unless the tag bypasses encryption.
    ///
    /// Returns `Ok(false)` when the value cannot be stored under `tag`; the
    /// combination is logged and nothing meaningful was written, so callers
    /// should discard the bytes they reserved for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] for an embedded document whose type
    /// is not in the dictionary, or an encryption error.
    pub fn serialize_value(&self, out: &mut BytesMut, value: &Value, tag: BinaryType) -> Result<bool> {
        match &self.encryption {
            Some(encryption) if !tag.bypasses_encryption() => {
                let mut plain = BytesMut::new();
                if !self.write_value(&mut plain, value, tag, 0)? {
                    return Ok(false);
                }
                let encrypted = encryption.encrypt(&plain)?;
                out.put_byte_array(&encrypted);
                Ok(true)
            }
            _ => self.write_value(out, value, tag, 0),
        }
    }

    /// Decodes one payload written by [`serialize_value`](Self::serialize_value).
    ///
    /// # Errors
    ///
    /// Returns a storage error for truncated or malformed input, or an
    /// encryption error if the payload cannot be decrypted.
    pub fn deserialize_value(&self, reader: &mut BinaryReader, tag: BinaryType) -> Result<Value> {
        match &self.encryption {
            Some(encryption) if !tag.bypasses_encryption() => {
                let encrypted = reader.get_bytes()?;
                let plain = encryption.decrypt(&encrypted)?;
                let mut plain = BinaryReader::new(Bytes::from(plain));
                self.read_value(&mut plain, tag, 0)
            }
            _ => self.read_value(reader, tag, 0),
        }
    }

    fn unsupported(value: &Value, tag: BinaryType) -> Result<bool> {
        tracing::info!(
            "Dropping {} value that cannot be stored as {}",
            value.kind_name(),
            tag
        );
        Ok(false)
    }

    /// Tag of a list element or map value. Links inside collections use the
    /// compressed form.
    fn element_tag(&self, value: &Value) -> BinaryType {
        match BinaryType::of(value, self.datetime_precision) {
            BinaryType::Rid => BinaryType::CompressedRid,
            tag => tag,
        }
    }

    fn write_value(
        &self,
        out: &mut BytesMut,
        value: &Value,
        tag: BinaryType,
        depth: usize,
    ) -> Result<bool> {
        if matches!(tag, BinaryType::List | BinaryType::Map) && depth >= MAX_NESTING_DEPTH {
            tracing::info!(
                "Dropping {} nested deeper than {} levels",
                value.kind_name(),
                MAX_NESTING_DEPTH
            );
            return Ok(false);
        }
        match tag {
            BinaryType::Null => {
                if !value.is_null() {
                    return Self::unsupported(value, tag);
                }
            }
            BinaryType::String => match value {
                Value::String(s) => out.put_string(s),
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::CompressedString => {
                let id = value.as_str().and_then(|s| self.dictionary.get_id(s, false));
                match id {
                    Some(id) => out.put_unsigned_number(u64::from(id)),
                    None => return Self::unsupported(value, tag),
                }
            }
            BinaryType::Byte => match value.as_int64().and_then(|v| i8::try_from(v).ok()) {
                Some(v) => out.put_i8(v),
                None => return Self::unsupported(value, tag),
            },
            BinaryType::Boolean => match value {
                Value::Boolean(b) => out.put_u8(u8::from(*b)),
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::Short => match value.as_int64().and_then(|v| i16::try_from(v).ok()) {
                Some(v) => out.put_number(i64::from(v)),
                None => return Self::unsupported(value, tag),
            },
            BinaryType::Integer => match value.as_int64().and_then(|v| i32::try_from(v).ok()) {
                Some(v) => out.put_number(i64::from(v)),
                None => return Self::unsupported(value, tag),
            },
            BinaryType::Long => match value.as_int64() {
                Some(v) => out.put_number(v),
                None => return Self::unsupported(value, tag),
            },
            BinaryType::Float => match value {
                Value::Float(f) => out.put_number(i64::from(f.to_bits() as i32)),
                Value::Double(d) => out.put_number(i64::from((*d as f32).to_bits() as i32)),
                other => match other.as_int64() {
                    Some(v) => out.put_number(i64::from((v as f32).to_bits() as i32)),
                    None => return Self::unsupported(value, tag),
                },
            },
            BinaryType::Double => match value.as_float64() {
                Some(d) => out.put_number(d.to_bits() as i64),
                None => return Self::unsupported(value, tag),
            },
            BinaryType::Decimal => {
                let decimal = match value {
                    Value::Decimal(d) => d.clone(),
                    Value::Float(_) | Value::Double(_) => {
                        match value.as_float64().and_then(|f| BigDecimal::try_from(f).ok()) {
                            Some(d) => d,
                            None => return Self::unsupported(value, tag),
                        }
                    }
                    other => match other.as_int64() {
                        Some(v) => BigDecimal::from(v),
                        None => return Self::unsupported(value, tag),
                    },
                };
                let (unscaled, scale) = decimal.as_bigint_and_exponent();
                out.put_number(scale);
                out.put_byte_array(&unscaled.to_signed_bytes_be());
            }
            BinaryType::Date => {
                let date = match value {
                    Value::Date(d) => *d,
                    Value::DateTime(dt) => dt.date_naive(),
                    _ => return Self::unsupported(value, tag),
                };
                out.put_number(date.signed_duration_since(epoch_date()).num_days());
            }
            BinaryType::DateTime
            | BinaryType::DateTimeSecond
            | BinaryType::DateTimeMicros
            | BinaryType::DateTimeNanos => {
                let precision = tag.datetime_precision().unwrap_or_default();
                let timestamp = match value {
                    Value::DateTime(dt) => to_timestamp(dt, precision),
                    Value::Date(d) => to_timestamp(&d.and_time(chrono::NaiveTime::MIN).and_utc(), precision),
                    Value::Long(raw) => Some(*raw),
                    _ => None,
                };
                match timestamp {
                    Some(ts) => out.put_number(ts),
                    None => return Self::unsupported(value, tag),
                }
            }
            BinaryType::Rid => match value {
                Value::Link(rid) => out.put_rid(*rid),
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::CompressedRid => match value {
                Value::Link(rid) => out.put_compressed_rid(*rid),
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::Binary => match value {
                Value::Binary(b) => out.put_byte_array(b),
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::Uuid => match value {
                Value::Uuid(u) => {
                    let bits = u.as_u128();
                    out.put_number((bits >> 64) as u64 as i64);
                    out.put_number(bits as u64 as i64);
                }
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::List => match value {
                Value::List(items) => self.write_list(out, items.iter(), depth)?,
                Value::ShortArray(a) => self.write_list(out, a.iter().map(|v| Value::Short(*v)), depth)?,
                Value::IntegerArray(a) => self.write_list(out, a.iter().map(|v| Value::Integer(*v)), depth)?,
                Value::LongArray(a) => self.write_list(out, a.iter().map(|v| Value::Long(*v)), depth)?,
                Value::FloatArray(a) => self.write_list(out, a.iter().map(|v| Value::Float(*v)), depth)?,
                Value::DoubleArray(a) => self.write_list(out, a.iter().map(|v| Value::Double(*v)), depth)?,
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::Map => match value {
                Value::Map(entries) => self.write_map(out, entries, depth)?,
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::Embedded => match value {
                Value::Embedded(doc) => self.write_embedded(out, doc)?,
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::ArrayOfShorts => match value {
                Value::ShortArray(a) => {
                    out.put_unsigned_number(a.len() as u64);
                    a.iter().for_each(|v| out.put_i16(*v));
                }
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::ArrayOfIntegers => match value {
                Value::IntegerArray(a) => {
                    out.put_unsigned_number(a.len() as u64);
                    a.iter().for_each(|v| out.put_i32(*v));
                }
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::ArrayOfLongs => match value {
                Value::LongArray(a) => {
                    out.put_unsigned_number(a.len() as u64);
                    a.iter().for_each(|v| out.put_i64(*v));
                }
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::ArrayOfFloats => match value {
                Value::FloatArray(a) => {
                    out.put_unsigned_number(a.len() as u64);
                    a.iter().for_each(|v| out.put_f32(*v));
                }
                _ => return Self::unsupported(value, tag),
            },
            BinaryType::ArrayOfDoubles => match value {
                Value::DoubleArray(a) => {
                    out.put_unsigned_number(a.len() as u64);
                    a.iter().for_each(|v| out.put_f64(*v));
                }
                _ => return Self::unsupported(value, tag),
            },
        }
        Ok(true)
    }

    /// Writes `(count, (tag, value)*)`, skipping elements that cannot be
    /// stored. The count covers only the elements written.
    fn write_list<I, V>(&self, out: &mut BytesMut, items: I, depth: usize) -> Result<()>
    where
        I: Iterator<Item = V>,
        V: std::borrow::Borrow<Value>,
    {
        let mut body = BytesMut::new();
        let mut count = 0u64;
        for item in items {
            let item = item.borrow();
            let start = body.len();
            let tag = self.element_tag(item);
            body.put_u8(tag.id());
            if self.write_value(&mut body, item, tag, depth + 1)? {
                count += 1;
            } else {
                body.truncate(start);
            }
        }
        out.put_unsigned_number(count);
        out.put_slice(&body);
        Ok(())
    }

    fn write_map(
        &self,
        out: &mut BytesMut,
        entries: &IndexMap<String, Value>,
        depth: usize,
    ) -> Result<()> {
        let mut body = BytesMut::new();
        let mut count = 0u64;
        for (key, value) in entries {
            let start = body.len();
            match self.dictionary.get_id(key, false) {
                Some(id) => {
                    body.put_u8(BinaryType::CompressedString.id());
                    body.put_unsigned_number(u64::from(id));
                }
                None => {
                    body.put_u8(BinaryType::String.id());
                    body.put_string(key);
                }
            }
            let tag = self.element_tag(value);
            body.put_u8(tag.id());
            if self.write_value(&mut body, value, tag, depth + 1)? {
                count += 1;
            } else {
                body.truncate(start);
            }
        }
        out.put_unsigned_number(count);
        out.put_slice(&body);
        Ok(())
    }

    fn write_embedded(&self, out: &mut BytesMut, doc: &EmbeddedDocument) -> Result<()> {
        let type_id = self.dictionary.get_id(doc.type_name(), false).ok_or_else(|| {
            Error::Serialization(format!(
                "cannot find type '{}' declared in embedded document",
                doc.type_name()
            ))
        })?;
        out.put_unsigned_number(u64::from(type_id));

        match doc.content() {
            EmbeddedContent::Serialized(bytes) => out.put_byte_array(bytes),
            EmbeddedContent::Properties(properties) => {
                let mut nested = BytesMut::with_capacity(32);
                nested.put_u8(RecordType::EmbeddedDocument.id());
                self.serialize_properties(&mut nested, doc.type_name(), properties)?;
                out.put_byte_array(&nested);
            }
        }
        Ok(())
    }

    fn read_value(&self, reader: &mut BinaryReader, tag: BinaryType, depth: usize) -> Result<Value> {
        if matches!(tag, BinaryType::List | BinaryType::Map) && depth >= MAX_NESTING_DEPTH {
            return Err(Error::corruption(format!(
                "collections nested deeper than {MAX_NESTING_DEPTH} levels at position {}",
                reader.position()
            )));
        }
        Ok(match tag {
            BinaryType::Null => Value::Null,
            BinaryType::String => Value::String(reader.get_string()?),
            BinaryType::CompressedString => {
                let id = reader.get_unsigned_number()?;
                let id = u32::try_from(id).map_err(|_| out_of_range("dictionary id", id as i64))?;
                Value::String(self.dictionary.get_name(id)?.to_string())
            }
            BinaryType::Byte => Value::Byte(reader.get_u8()? as i8),
            BinaryType::Boolean => Value::Boolean(reader.get_u8()? != 0),
            BinaryType::Short => {
                let v = reader.get_number()?;
                Value::Short(i16::try_from(v).map_err(|_| out_of_range("short", v))?)
            }
            BinaryType::Integer => {
                let v = reader.get_number()?;
                Value::Integer(i32::try_from(v).map_err(|_| out_of_range("integer", v))?)
            }
            BinaryType::Long => Value::Long(reader.get_number()?),
            BinaryType::Float => Value::Float(f32::from_bits(reader.get_number()? as u32)),
            BinaryType::Double => Value::Double(f64::from_bits(reader.get_number()? as u64)),
            BinaryType::Decimal => {
                let scale = reader.get_number()?;
                let unscaled = BigInt::from_signed_bytes_be(&reader.get_bytes()?);
                Value::Decimal(BigDecimal::new(unscaled, scale))
            }
            BinaryType::Date => {
                let days = reader.get_number()?;
                let date = chrono::TimeDelta::try_days(days)
                    .and_then(|delta| epoch_date().checked_add_signed(delta))
                    .ok_or_else(|| out_of_range("date", days))?;
                Value::Date(date)
            }
            BinaryType::DateTime
            | BinaryType::DateTimeSecond
            | BinaryType::DateTimeMicros
            | BinaryType::DateTimeNanos => {
                let timestamp = reader.get_number()?;
                let precision = tag.datetime_precision().unwrap_or_default();
                Value::DateTime(
                    from_timestamp(timestamp, precision)
                        .ok_or_else(|| out_of_range("timestamp", timestamp))?,
                )
            }
            BinaryType::Rid => Value::Link(reader.get_rid()?),
            BinaryType::CompressedRid => Value::Link(reader.get_compressed_rid()?),
            BinaryType::Binary => Value::Binary(reader.get_bytes()?.to_vec()),
            BinaryType::Uuid => {
                let high = reader.get_number()? as u64;
                let low = reader.get_number()? as u64;
                Value::Uuid(Uuid::from_u128((u128::from(high) << 64) | u128::from(low)))
            }
            BinaryType::List => {
                let count = reader.get_length()?;
                let mut items = Vec::with_capacity(count.min(reader.remaining()));
                for _ in 0..count {
                    let item_tag = BinaryType::try_from(reader.get_u8()?)?;
                    items.push(self.read_value(reader, item_tag, depth + 1)?);
                }
                Value::List(items)
            }
            BinaryType::Map => {
                let count = reader.get_length()?;
                let mut entries = IndexMap::with_capacity(count.min(reader.remaining()));
                for _ in 0..count {
                    let key_tag = BinaryType::try_from(reader.get_u8()?)?;
                    let key = match self.read_value(reader, key_tag, depth + 1)? {
                        Value::String(key) => key,
                        other => {
                            return Err(Error::corruption(format!(
                                "map key must be a string, found {}",
                                other.kind_name()
                            )));
                        }
                    };
                    let value_tag = BinaryType::try_from(reader.get_u8()?)?;
                    entries.insert(key, self.read_value(reader, value_tag, depth + 1)?);
                }
                Value::Map(entries)
            }
            BinaryType::Embedded => {
                let type_id = reader.get_unsigned_number()?;
                let type_id = u32::try_from(type_id)
                    .map_err(|_| out_of_range("dictionary id", type_id as i64))?;
                let type_name = self.dictionary.get_name(type_id)?;
                let buffer = reader.get_bytes()?;
                Value::Embedded(Box::new(EmbeddedDocument::from_serialized(&*type_name, buffer)))
            }
            BinaryType::ArrayOfShorts => {
                Value::ShortArray(read_array(reader, 2, BinaryReader::get_i16)?)
            }
            BinaryType::ArrayOfIntegers => {
                Value::IntegerArray(read_array(reader, 4, BinaryReader::get_i32)?)
            }
            BinaryType::ArrayOfLongs => Value::LongArray(read_array(reader, 8, BinaryReader::get_i64)?),
            BinaryType::ArrayOfFloats => {
                Value::FloatArray(read_array(reader, 4, BinaryReader::get_f32)?)
            }
            BinaryType::ArrayOfDoubles => {
                Value::DoubleArray(read_array(reader, 8, BinaryReader::get_f64)?)
            }
        })
    }
}

fn read_array<T>(
    reader: &mut BinaryReader,
    width: usize,
    read: fn(&mut BinaryReader) -> Result<T>,
) -> Result<Vec<T>> {
    let count = reader.get_length()?;
    if count.saturating_mul(width) > reader.remaining() {
        return Err(Error::corruption(format!(
            "array of {count} elements exceeds the {} remaining bytes",
            reader.remaining()
        )));
    }
    (0..count).map(|_| read(reader)).collect()
}
