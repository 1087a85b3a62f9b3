//! Property tables.
//!
//! Reads never fail outward: a table or value that cannot be parsed marks
//! the record as corrupted, is logged with the record id, and yields an empty
//! result so the rest of a scan or traversal keeps going.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use smallvec::SmallVec;
use trellis_common::types::{EmbeddedContent, EmbeddedDocument, Rid, Value};
use trellis_common::utils::error::{Error, Result};

use super::{BinarySerializer, VERTEX_TABLE_START};
use crate::record::RecordType;
use crate::storage::{BinaryReader, BinaryType, BinaryWriter};

/// Parsed start of a property table.
struct TableHeader {
    header_end: usize,
    count: usize,
}

fn describe(rid: Option<Rid>) -> String {
    rid.map_or_else(|| "<embedded>".to_string(), |rid| rid.to_string())
}

impl BinarySerializer {
    /// Appends a property table and its content to `buf`.
    ///
    /// Values that cannot be stored are left out of the table entirely.
    pub(crate) fn serialize_properties(
        &self,
        buf: &mut BytesMut,
        type_name: &str,
        properties: &IndexMap<String, Value>,
    ) -> Result<()> {
        let header_start = buf.len();
        // Patched once the table size is known
        buf.put_i32(0);

        let mut content = BytesMut::with_capacity(properties.len() * 8);
        let mut entries: SmallVec<[(u32, usize); 16]> = SmallVec::with_capacity(properties.len());

        for (name, value) in properties {
            let offset = content.len();
            let tag = self.tag_for(type_name, name, value);
            content.put_u8(tag.id());
            if self.serialize_value(&mut content, value, tag)? {
                entries.push((self.dictionary.get_or_create_id(name), offset));
            } else {
                content.truncate(offset);
            }
        }

        buf.put_unsigned_number(entries.len() as u64);
        for (name_id, offset) in &entries {
            buf.put_unsigned_number(u64::from(*name_id));
            buf.put_unsigned_number(*offset as u64);
        }

        let header_end = i32::try_from(buf.len())
            .map_err(|_| Error::Serialization(format!("record header of {} bytes", buf.len())))?;
        BigEndian::write_i32(&mut buf[header_start..header_start + 4], header_end);
        buf.put_slice(&content);
        Ok(())
    }

    /// Returns the offset of the property table in a record buffer.
    fn table_start(buffer: &Bytes) -> Result<usize> {
        let mut reader = BinaryReader::new(buffer.clone());
        match RecordType::try_from(reader.get_u8()?)? {
            RecordType::Document | RecordType::EmbeddedDocument => Ok(1),
            RecordType::Vertex => Ok(VERTEX_TABLE_START),
            RecordType::Edge => {
                reader.get_compressed_rid()?;
                reader.get_compressed_rid()?;
                Ok(reader.position())
            }
            RecordType::EdgeSegment => Err(Error::Serialization(
                "edge segments have no property table".to_string(),
            )),
        }
    }

    fn read_table_header(buffer: &Bytes) -> Result<(BinaryReader, TableHeader)> {
        let mut reader = BinaryReader::new(buffer.clone());
        reader.set_position(Self::table_start(buffer)?)?;

        let header_end = reader.get_i32()?;
        let header_end = usize::try_from(header_end)
            .ok()
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| Error::corruption(format!("header end {header_end} out of range")))?;

        let count = reader.get_length()?;
        if count > reader.remaining() {
            return Err(Error::corruption(format!(
                "property count {count} exceeds the table size"
            )));
        }
        Ok((reader, TableHeader { header_end, count }))
    }

    fn try_read_properties(
        &self,
        buffer: &Bytes,
        field_names: &[&str],
    ) -> Result<IndexMap<String, Value>> {
        let (mut reader, header) = Self::read_table_header(buffer)?;
        if header.count == 0 {
            return Ok(IndexMap::new());
        }

        let mut field_ids: SmallVec<[u32; 8]> = field_names
            .iter()
            .filter_map(|name| self.dictionary.get_id(name, false))
            .collect();
        field_ids.sort_unstable();
        field_ids.dedup();
        if !field_names.is_empty() && field_ids.is_empty() {
            // None of the requested names was ever stored anywhere
            return Ok(IndexMap::new());
        }

        let mut values = IndexMap::with_capacity(if field_ids.is_empty() {
            header.count
        } else {
            field_ids.len()
        });

        for _ in 0..header.count {
            let name_id = reader.get_unsigned_number()?;
            let name_id = u32::try_from(name_id)
                .map_err(|_| Error::corruption(format!("property id {name_id} out of range")))?;
            let offset = reader.get_length()?;

            if !field_ids.is_empty() && field_ids.binary_search(&name_id).is_err() {
                continue;
            }

            let name = self.dictionary.get_name(name_id)?;
            let table_position = reader.position();

            let content_position = header
                .header_end
                .checked_add(offset)
                .filter(|position| *position < buffer.len())
                .ok_or_else(|| {
                    Error::corruption(format!("content offset {offset} of '{name}' out of range"))
                })?;
            reader.set_position(content_position)?;
            let tag = BinaryType::try_from(reader.get_u8()?)?;
            let value = self.deserialize_value(&mut reader, tag)?;
            values.insert(name.to_string(), value);

            reader.set_position(table_position)?;
            if !field_ids.is_empty() && values.len() >= field_ids.len() {
                break;
            }
        }
        Ok(values)
    }

    fn try_has_property(&self, buffer: &Bytes, name: &str) -> Result<bool> {
        let (mut reader, header) = Self::read_table_header(buffer)?;
        let Some(field_id) = self.dictionary.get_id(name, false) else {
            return Ok(false);
        };
        for _ in 0..header.count {
            let name_id = reader.get_unsigned_number()?;
            reader.get_unsigned_number()?;
            if name_id == u64::from(field_id) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn try_property_names(&self, buffer: &Bytes) -> Result<Vec<Arc<str>>> {
        let (mut reader, header) = Self::read_table_header(buffer)?;
        let mut names = Vec::with_capacity(header.count);
        for _ in 0..header.count {
            let name_id = reader.get_unsigned_number()?;
            reader.get_unsigned_number()?;
            let name_id = u32::try_from(name_id)
                .map_err(|_| Error::corruption(format!("property id {name_id} out of range")))?;
            names.push(self.dictionary.get_name(name_id)?);
        }
        Ok(names)
    }

    fn or_corrupted<T>(rid: Option<Rid>, result: Result<T>, fallback: T) -> T {
        result.unwrap_or_else(|e| {
            tracing::error!("Possible corrupted record {}: {}", describe(rid), e);
            fallback
        })
    }

    /// Decodes the properties of a record buffer.
    ///
    /// With a non-empty `field_names`, only those properties are decoded and
    /// the table walk stops once all of them were found. Names that were
    /// never stored are ignored.
    ///
    /// A corrupted buffer is logged with `rid` and yields an empty map.
    #[must_use]
    pub fn deserialize_properties(
        &self,
        buffer: &Bytes,
        rid: Option<Rid>,
        field_names: &[&str],
    ) -> IndexMap<String, Value> {
        Self::or_corrupted(
            rid,
            self.try_read_properties(buffer, field_names),
            IndexMap::new(),
        )
    }

    /// Decodes a single property.
    #[must_use]
    pub fn deserialize_property(&self, buffer: &Bytes, rid: Option<Rid>, name: &str) -> Option<Value> {
        self.deserialize_properties(buffer, rid, &[name])
            .shift_remove(name)
    }

    /// Returns true if the record stores `name`, reading only the table.
    #[must_use]
    pub fn has_property(&self, buffer: &Bytes, rid: Option<Rid>, name: &str) -> bool {
        Self::or_corrupted(rid, self.try_has_property(buffer, name), false)
    }

    /// Lists stored property names in table order, reading only the table.
    #[must_use]
    pub fn property_names(&self, buffer: &Bytes, rid: Option<Rid>) -> Vec<Arc<str>> {
        Self::or_corrupted(rid, self.try_property_names(buffer), Vec::new())
    }

    /// Returns the properties of an embedded document, decoding them if the
    /// document is still serialized.
    #[must_use]
    pub fn materialize(&self, document: &EmbeddedDocument) -> IndexMap<String, Value> {
        match document.content() {
            EmbeddedContent::Properties(properties) => properties.clone(),
            EmbeddedContent::Serialized(buffer) => self.deserialize_properties(buffer, None, &[]),
        }
    }

    /// Reads one property of an embedded document without decoding the rest.
    #[must_use]
    pub fn embedded_property(&self, document: &EmbeddedDocument, name: &str) -> Option<Value> {
        match document.content() {
            EmbeddedContent::Properties(properties) => properties.get(name).cloned(),
            EmbeddedContent::Serialized(buffer) => self.deserialize_property(buffer, None, name),
        }
    }
}
