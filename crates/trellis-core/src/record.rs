//! In-memory record wrappers.
//!
//! A record keeps the buffer it was last loaded from or saved as. Buffers
//! are immutable [`Bytes`]: changing a record never touches a buffer another
//! reader may hold; the codec builds a new one instead.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use trellis_common::types::{Rid, Value};
use trellis_common::utils::error::StorageError;

use crate::graph::Direction;

/// Record type byte, first byte of every record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Plain document.
    Document = 0,
    /// Graph vertex: document plus adjacency head pointers.
    Vertex = 1,
    /// Graph edge: document plus endpoints.
    Edge = 2,
    /// Edge segment page.
    EdgeSegment = 3,
    /// Document embedded in another record.
    EmbeddedDocument = 4,
}

impl RecordType {
    /// Returns the type byte.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RecordType {
    type Error = StorageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Document),
            1 => Ok(Self::Vertex),
            2 => Ok(Self::Edge),
            3 => Ok(Self::EdgeSegment),
            4 => Ok(Self::EmbeddedDocument),
            other => Err(StorageError::InvalidRecordType(other)),
        }
    }
}

/// A document: a typed, insertion-ordered property map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    identity: Option<Rid>,
    type_name: Arc<str>,
    properties: IndexMap<String, Value>,
    buffer: Option<Bytes>,
    dirty: bool,
}

impl Document {
    /// Creates a new, unsaved document.
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            identity: None,
            type_name: type_name.into(),
            properties: IndexMap::new(),
            buffer: None,
            dirty: true,
        }
    }

    /// Rebuilds a document read from storage.
    pub(crate) fn loaded(
        identity: Option<Rid>,
        type_name: Arc<str>,
        properties: IndexMap<String, Value>,
        buffer: Bytes,
    ) -> Self {
        Self {
            identity,
            type_name,
            properties,
            buffer: Some(buffer),
            dirty: false,
        }
    }

    /// Returns the RID, if the document was saved.
    #[must_use]
    pub fn identity(&self) -> Option<Rid> {
        self.identity
    }

    /// Returns the type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns a shared handle to the type name.
    #[must_use]
    pub fn type_name_arc(&self) -> Arc<str> {
        Arc::clone(&self.type_name)
    }

    /// Returns a property value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.into(), value.into());
        self.dirty = true;
        self
    }

    /// Removes a property, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let removed = self.properties.shift_remove(name);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Returns true if the property is set.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Returns all properties.
    #[must_use]
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Returns the buffer this document was last loaded from or saved as.
    #[must_use]
    pub fn buffer(&self) -> Option<&Bytes> {
        self.buffer.as_ref()
    }

    /// Returns true if properties changed since the last load or save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a successful save under `rid`.
    pub fn mark_saved(&mut self, rid: Rid, buffer: Bytes) {
        self.identity = Some(rid);
        self.buffer = Some(buffer);
        self.dirty = false;
    }
}

/// A vertex: a document that also owns two edge segment chains.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    document: Document,
    out_head: Option<Rid>,
    in_head: Option<Rid>,
}

impl Vertex {
    /// Creates a new vertex with no edges.
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        Self {
            document: Document::new(type_name),
            out_head: None,
            in_head: None,
        }
    }

    pub(crate) fn loaded(document: Document, out_head: Option<Rid>, in_head: Option<Rid>) -> Self {
        Self {
            document,
            out_head,
            in_head,
        }
    }

    /// Returns the head segment of a direction.
    #[must_use]
    pub fn head(&self, direction: Direction) -> Option<Rid> {
        match direction {
            Direction::Out => self.out_head,
            Direction::In => self.in_head,
        }
    }

    /// Points a direction at a new head segment.
    pub fn set_head(&mut self, direction: Direction, head: Option<Rid>) {
        match direction {
            Direction::Out => self.out_head = head,
            Direction::In => self.in_head = head,
        }
    }

    /// Returns the underlying document.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consumes the vertex, returning its document.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.document
    }
}

impl Deref for Vertex {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl DerefMut for Vertex {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

/// An edge stored as its own record.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    document: Document,
    out: Rid,
    in_: Rid,
}

impl Edge {
    /// Creates a new edge from `out` to `in_`.
    pub fn new(type_name: impl Into<Arc<str>>, out: Rid, in_: Rid) -> Self {
        Self {
            document: Document::new(type_name),
            out,
            in_,
        }
    }

    pub(crate) fn loaded(document: Document, out: Rid, in_: Rid) -> Self {
        Self { document, out, in_ }
    }

    /// Returns the source vertex.
    #[must_use]
    pub fn out(&self) -> Rid {
        self.out
    }

    /// Returns the destination vertex.
    #[must_use]
    pub fn in_(&self) -> Rid {
        self.in_
    }

    /// Returns the endpoint on the given side.
    #[must_use]
    pub fn vertex(&self, direction: Direction) -> Rid {
        match direction {
            Direction::Out => self.out,
            Direction::In => self.in_,
        }
    }

    /// Returns the underlying document.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Deref for Edge {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.document
    }
}

impl DerefMut for Edge {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

/// An edge with no record of its own.
///
/// Its identity is virtual (negative position) and it never has properties:
/// the adjacency entries are the only trace it leaves in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightEdge {
    identity: Rid,
    type_name: Arc<str>,
    out: Rid,
    in_: Rid,
}

impl LightEdge {
    /// Creates a light edge view.
    pub fn new(identity: Rid, type_name: impl Into<Arc<str>>, out: Rid, in_: Rid) -> Self {
        Self {
            identity,
            type_name: type_name.into(),
            out,
            in_,
        }
    }

    /// Returns the virtual RID.
    #[must_use]
    pub fn identity(&self) -> Rid {
        self.identity
    }

    /// Returns the edge type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the source vertex.
    #[must_use]
    pub fn out(&self) -> Rid {
        self.out
    }

    /// Returns the destination vertex.
    #[must_use]
    pub fn in_(&self) -> Rid {
        self.in_
    }

    /// Returns the endpoint on the given side.
    #[must_use]
    pub fn vertex(&self, direction: Direction) -> Rid {
        match direction {
            Direction::Out => self.out,
            Direction::In => self.in_,
        }
    }
}

/// Any record with a serialized form.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A document.
    Document(Document),
    /// A vertex.
    Vertex(Vertex),
    /// An edge.
    Edge(Edge),
}

impl Record {
    /// Returns the record type byte.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Document(_) => RecordType::Document,
            Self::Vertex(_) => RecordType::Vertex,
            Self::Edge(_) => RecordType::Edge,
        }
    }

    /// Returns the document part.
    #[must_use]
    pub fn document(&self) -> &Document {
        match self {
            Self::Document(d) => d,
            Self::Vertex(v) => &v.document,
            Self::Edge(e) => &e.document,
        }
    }

    /// Returns the document part, mutably.
    pub fn document_mut(&mut self) -> &mut Document {
        match self {
            Self::Document(d) => d,
            Self::Vertex(v) => &mut v.document,
            Self::Edge(e) => &mut e.document,
        }
    }

    /// Returns the RID, if saved.
    #[must_use]
    pub fn identity(&self) -> Option<Rid> {
        self.document().identity()
    }

    /// Returns the vertex, if this is one.
    #[must_use]
    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the edge, if this is one.
    #[must_use]
    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Self::Edge(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the record, returning the vertex if it is one.
    #[must_use]
    pub fn into_vertex(self) -> Option<Vertex> {
        match self {
            Self::Vertex(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the record, returning the edge if it is one.
    #[must_use]
    pub fn into_edge(self) -> Option<Edge> {
        match self {
            Self::Edge(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Document> for Record {
    fn from(d: Document) -> Self {
        Self::Document(d)
    }
}

impl From<Vertex> for Record {
    fn from(v: Vertex) -> Self {
        Self::Vertex(v)
    }
}

impl From<Edge> for Record {
    fn from(e: Edge) -> Self {
        Self::Edge(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_bytes() {
        for b in 0u8..=4 {
            assert_eq!(RecordType::try_from(b).unwrap().id(), b);
        }
        assert!(matches!(
            RecordType::try_from(9),
            Err(StorageError::InvalidRecordType(9))
        ));
    }

    #[test]
    fn test_document_dirty_tracking() {
        let mut doc = Document::new("Person");
        doc.set("name", "Alice").set("age", 30);
        assert!(doc.is_dirty());

        doc.mark_saved(Rid::new(1, 0), Bytes::from_static(b"x"));
        assert!(!doc.is_dirty());
        assert_eq!(doc.identity(), Some(Rid::new(1, 0)));

        assert_eq!(doc.remove("missing"), None);
        assert!(!doc.is_dirty());
        assert_eq!(doc.remove("name"), Some(Value::from("Alice")));
        assert!(doc.is_dirty());
        assert_eq!(doc.properties().keys().collect::<Vec<_>>(), vec!["age"]);
    }

    #[test]
    fn test_vertex_heads() {
        let mut v = Vertex::new("Person");
        assert_eq!(v.head(Direction::Out), None);
        v.set_head(Direction::In, Some(Rid::new(9, 4)));
        assert_eq!(v.head(Direction::In), Some(Rid::new(9, 4)));
        assert_eq!(v.head(Direction::Out), None);

        v.set("name", "Bob");
        assert_eq!(v.get("name"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_edge_endpoints() {
        let e = Edge::new("Knows", Rid::new(1, 1), Rid::new(1, 2));
        assert_eq!(e.vertex(Direction::Out), Rid::new(1, 1));
        assert_eq!(e.vertex(Direction::In), Rid::new(1, 2));

        let record = Record::from(e);
        assert_eq!(record.record_type(), RecordType::Edge);
        assert!(record.as_vertex().is_none());
        assert_eq!(record.document().type_name(), "Knows");
    }
}
