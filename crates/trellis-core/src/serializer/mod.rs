//! Binary record codec.
//!
//! A record buffer is a record type byte, an optional type-specific prefix,
//! then a property table followed by a content region:
//!
//! ```text
//! [record_type: u8]
//! vertex: [out_head: rid][in_head: rid]       edge: [out: crid][in: crid]
//! [header_end: i32]
//! [property_count: varint]
//! { [name_id: varint] [content_offset: varint] } x property_count
//! { [type_tag: u8] [payload] } x property_count    <- header_end + offset
//! ```
//!
//! `header_end` is absolute within the buffer, so a reader can decode one
//! property by walking the table and seeking straight to its content.
//!
//! ## Modules
//!
//! - `value` - Encoding and decoding of single tagged values
//! - `properties` - Property tables: full, selective, and existence reads

mod properties;
mod value;

pub use value::MAX_NESTING_DEPTH;

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use trellis_common::types::Rid;
use trellis_common::utils::error::{Error, Result};

use crate::record::{Document, Edge, Record, RecordType, Vertex};
use crate::schema::SchemaResolver;
use crate::storage::{
    BinaryReader, BinaryWriter, DataEncryption, DateTimePrecision, Dictionary, RID_SIZE,
};

/// Offset of the property table in a vertex buffer.
pub const VERTEX_TABLE_START: usize = 1 + 2 * RID_SIZE;

/// Encodes and decodes records against a shared dictionary.
///
/// Cheap to clone: all collaborators are reference counted.
#[derive(Clone)]
pub struct BinarySerializer {
    dictionary: Arc<Dictionary>,
    encryption: Option<Arc<dyn DataEncryption>>,
    schema: Option<Arc<dyn SchemaResolver>>,
    datetime_precision: DateTimePrecision,
}

impl std::fmt::Debug for BinarySerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinarySerializer")
            .field("dictionary_entries", &self.dictionary.len())
            .field("encrypted", &self.encryption.is_some())
            .field("schema", &self.schema.is_some())
            .field("datetime_precision", &self.datetime_precision)
            .finish()
    }
}

impl BinarySerializer {
    /// Creates a codec with no encryption and no schema hints.
    #[must_use]
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self {
            dictionary,
            encryption: None,
            schema: None,
            datetime_precision: DateTimePrecision::default(),
        }
    }

    /// Encrypts every value except nulls and RIDs.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Arc<dyn DataEncryption>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Uses declared property types to pick tags.
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<dyn SchemaResolver>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets the tag used for datetimes with no declared type.
    #[must_use]
    pub fn with_datetime_precision(mut self, precision: DateTimePrecision) -> Self {
        self.datetime_precision = precision;
        self
    }

    /// Returns the dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// Returns the default datetime precision.
    #[must_use]
    pub fn datetime_precision(&self) -> DateTimePrecision {
        self.datetime_precision
    }

    /// Serializes a document.
    ///
    /// A document with no changes since it was loaded or saved returns its
    /// existing buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] for structurally invalid content,
    /// such as an embedded document of an unknown type.
    pub fn serialize_document(&self, document: &Document) -> Result<Bytes> {
        if let (false, Some(buffer)) = (document.is_dirty(), document.buffer()) {
            return Ok(buffer.clone());
        }
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(RecordType::Document.id());
        self.serialize_properties(&mut buf, document.type_name(), document.properties())?;
        Ok(buf.freeze())
    }

    /// Serializes a vertex.
    ///
    /// When only the head pointers changed, the previous buffer is copied and
    /// its head region rewritten; the original buffer is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`serialize_document`](Self::serialize_document).
    pub fn serialize_vertex(&self, vertex: &Vertex) -> Result<Bytes> {
        let out_head = vertex.head(crate::graph::Direction::Out).unwrap_or(Rid::NULL);
        let in_head = vertex.head(crate::graph::Direction::In).unwrap_or(Rid::NULL);

        if let (false, Some(buffer)) = (vertex.is_dirty(), vertex.buffer()) {
            if buffer.len() >= VERTEX_TABLE_START && buffer[0] == RecordType::Vertex.id() {
                let mut copy = BytesMut::from(&buffer[..]);
                write_rid_at(&mut copy[1..], out_head);
                write_rid_at(&mut copy[1 + RID_SIZE..], in_head);
                return Ok(copy.freeze());
            }
        }

        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(RecordType::Vertex.id());
        buf.put_rid(out_head);
        buf.put_rid(in_head);
        self.serialize_properties(&mut buf, vertex.type_name(), vertex.properties())?;
        Ok(buf.freeze())
    }

    /// Serializes an edge.
    ///
    /// # Errors
    ///
    /// Same as [`serialize_document`](Self::serialize_document).
    pub fn serialize_edge(&self, edge: &Edge) -> Result<Bytes> {
        if let (false, Some(buffer)) = (edge.is_dirty(), edge.buffer()) {
            return Ok(buffer.clone());
        }
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(RecordType::Edge.id());
        buf.put_compressed_rid(edge.out());
        buf.put_compressed_rid(edge.in_());
        self.serialize_properties(&mut buf, edge.type_name(), edge.properties())?;
        Ok(buf.freeze())
    }

    /// Serializes any record.
    ///
    /// # Errors
    ///
    /// Same as [`serialize_document`](Self::serialize_document).
    pub fn serialize(&self, record: &Record) -> Result<Bytes> {
        match record {
            Record::Document(d) => self.serialize_document(d),
            Record::Vertex(v) => self.serialize_vertex(v),
            Record::Edge(e) => self.serialize_edge(e),
        }
    }

    /// Decodes a record buffer.
    ///
    /// Properties are decoded leniently: a corrupted property table is
    /// logged and yields a record with no properties. The record type byte
    /// and the vertex/edge prefix are structural and fail the call.
    ///
    /// # Errors
    ///
    /// Returns a storage error for an unreadable prefix, or
    /// [`Error::Serialization`] for buffers that are not standalone records.
    pub fn deserialize(
        &self,
        rid: Option<Rid>,
        type_name: impl Into<Arc<str>>,
        buffer: Bytes,
    ) -> Result<Record> {
        let mut reader = BinaryReader::new(buffer.clone());
        let record_type = RecordType::try_from(reader.get_u8()?)?;

        let load = |buffer: Bytes| {
            let properties = self.deserialize_properties(&buffer, rid, &[]);
            Document::loaded(rid, type_name.into(), properties, buffer)
        };

        match record_type {
            RecordType::Document => Ok(Record::Document(load(buffer))),
            RecordType::Vertex => {
                let out_head = reader.get_rid()?;
                let in_head = reader.get_rid()?;
                Ok(Record::Vertex(Vertex::loaded(
                    load(buffer),
                    Rid::from_parts(out_head.bucket_id(), out_head.position()),
                    Rid::from_parts(in_head.bucket_id(), in_head.position()),
                )))
            }
            RecordType::Edge => {
                let out = reader.get_compressed_rid()?;
                let in_ = reader.get_compressed_rid()?;
                Ok(Record::Edge(Edge::loaded(load(buffer), out, in_)))
            }
            RecordType::EdgeSegment | RecordType::EmbeddedDocument => Err(Error::Serialization(
                format!("{record_type:?} buffers are not standalone records"),
            )),
        }
    }
}

fn write_rid_at(target: &mut [u8], rid: Rid) {
    BigEndian::write_i32(&mut target[..4], rid.bucket_id());
    BigEndian::write_i64(&mut target[4..RID_SIZE], rid.position());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Direction;
    use trellis_common::types::Value;

    fn serializer() -> BinarySerializer {
        BinarySerializer::new(Arc::new(Dictionary::new()))
    }

    #[test]
    fn test_document_round_trip() {
        let ser = serializer();
        let mut doc = Document::new("Person");
        doc.set("name", "Alice").set("age", 30);

        let buf = ser.serialize_document(&doc).unwrap();
        let record = ser.deserialize(Some(Rid::new(1, 0)), "Person", buf).unwrap();

        assert_eq!(record.record_type(), RecordType::Document);
        assert_eq!(record.identity(), Some(Rid::new(1, 0)));
        assert_eq!(record.document().properties(), doc.properties());
        assert!(!record.document().is_dirty());
    }

    #[test]
    fn test_vertex_heads_round_trip() {
        let ser = serializer();
        let mut vertex = Vertex::new("Person");
        vertex.set("name", "Bob");
        vertex.set_head(Direction::Out, Some(Rid::new(7, 3)));

        let buf = ser.serialize_vertex(&vertex).unwrap();
        assert_eq!(buf[0], RecordType::Vertex.id());
        assert_eq!(&buf[13..25], &[0xff; 12]);

        let loaded = ser
            .deserialize(Some(Rid::new(2, 0)), "Person", buf)
            .unwrap()
            .into_vertex()
            .unwrap();
        assert_eq!(loaded.head(Direction::Out), Some(Rid::new(7, 3)));
        assert_eq!(loaded.head(Direction::In), None);
        assert_eq!(loaded.get("name"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_clean_vertex_copies_buffer_on_head_change() {
        let ser = serializer();
        let mut vertex = Vertex::new("Person");
        vertex.set("name", "Carol");
        let original = ser.serialize_vertex(&vertex).unwrap();

        let mut loaded = ser
            .deserialize(Some(Rid::new(2, 1)), "Person", original.clone())
            .unwrap()
            .into_vertex()
            .unwrap();
        loaded.set_head(Direction::In, Some(Rid::new(9, 9)));

        let updated = ser.serialize_vertex(&loaded).unwrap();
        assert_eq!(&original[13..25], &[0xff; 12]);
        assert_eq!(&updated[25..], &original[25..]);

        let reloaded = ser
            .deserialize(Some(Rid::new(2, 1)), "Person", updated)
            .unwrap()
            .into_vertex()
            .unwrap();
        assert_eq!(reloaded.head(Direction::In), Some(Rid::new(9, 9)));
        assert_eq!(reloaded.get("name"), Some(&Value::from("Carol")));
    }

    #[test]
    fn test_edge_round_trip() {
        let ser = serializer();
        let mut edge = Edge::new("Knows", Rid::new(1, 5), Rid::new(1, 6));
        edge.set("since", 2020);

        let buf = ser.serialize(&Record::from(edge.clone())).unwrap();
        assert!(ser.has_property(&buf, None, "since"));

        let loaded = ser
            .deserialize(Some(Rid::new(3, 0)), "Knows", buf)
            .unwrap()
            .into_edge()
            .unwrap();
        assert_eq!(loaded.out(), Rid::new(1, 5));
        assert_eq!(loaded.in_(), Rid::new(1, 6));
        assert_eq!(loaded.get("since"), Some(&Value::from(2020)));
    }

    #[test]
    fn test_clean_document_reuses_buffer() {
        let ser = serializer();
        let mut doc = Document::new("Note");
        doc.set("text", "hi");
        let buf = ser.serialize_document(&doc).unwrap();
        doc.mark_saved(Rid::new(4, 0), buf.clone());

        let again = ser.serialize_document(&doc).unwrap();
        assert_eq!(again.as_ptr(), buf.as_ptr());

        doc.set("text", "changed");
        let changed = ser.serialize_document(&doc).unwrap();
        assert_ne!(changed, buf);
        assert_eq!(
            ser.deserialize_property(&buf, None, "text"),
            Some(Value::from("hi"))
        );
    }

    #[test]
    fn test_structural_errors_propagate() {
        let ser = serializer();
        assert!(ser.deserialize(None, "X", Bytes::from_static(&[9])).is_err());
        assert!(ser
            .deserialize(None, "X", Bytes::from_static(&[RecordType::Vertex as u8, 0, 0]))
            .is_err());
        assert!(matches!(
            ser.deserialize(None, "X", Bytes::from_static(&[RecordType::EdgeSegment as u8])),
            Err(Error::Serialization(_))
        ));
    }
}
