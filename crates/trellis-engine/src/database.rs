//! The Trellis database.
//!
//! Records live in memory as serialized buffers, one bucket per type plus a
//! bucket of edge segments. Everything that reads or writes a record goes
//! through the binary codec, so the buffers are exactly what a page store
//! would hold.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use trellis_common::types::{Rid, Value};
use trellis_common::utils::error::{Error, Result};
use trellis_common::utils::hash::{FxHashMap, FxHashSet};
use trellis_core::graph::{
    Direction, EdgeLinkedList, EdgeSegment, EdgeStore, EdgeVertexIterator, SegmentStore,
};
use trellis_core::record::{Document, Edge, LightEdge, Record, RecordType, Vertex};
use trellis_core::schema::SchemaResolver;
use trellis_core::serializer::BinarySerializer;
use trellis_core::storage::{BinaryReader, BinaryType, Dictionary};

use crate::catalog::{Catalog, SEGMENT_BUCKET, TypeKind};
use crate::config::Config;

/// Records of one bucket, indexed by position. Deleted slots stay `None`.
type Bucket = Vec<Option<Bytes>>;

/// An embedded multi-model database.
pub struct Database {
    config: Config,
    dictionary: Arc<Dictionary>,
    catalog: Arc<Catalog>,
    serializer: BinarySerializer,
    buckets: RwLock<FxHashMap<i32, Bucket>>,
    /// Next light edge number; light edge RIDs use its negation.
    next_light_edge: AtomicI64,
}

impl Database {
    /// Creates an empty database with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Config::default())
    }

    /// Creates an empty database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the configuration is invalid.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: Config) -> Self {
        let dictionary = Arc::new(Dictionary::new());
        let catalog = Arc::new(Catalog::new(Arc::clone(&dictionary)));
        let mut serializer = BinarySerializer::new(Arc::clone(&dictionary))
            .with_schema(Arc::clone(&catalog) as Arc<dyn SchemaResolver>)
            .with_datetime_precision(config.datetime_precision);
        if let Some(encryption) = &config.encryption {
            serializer = serializer.with_encryption(Arc::clone(encryption));
        }
        let mut buckets = FxHashMap::default();
        buckets.insert(SEGMENT_BUCKET, Bucket::new());

        Self {
            config,
            dictionary,
            catalog,
            serializer,
            buckets: RwLock::new(buckets),
            next_light_edge: AtomicI64::new(1),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the shared dictionary.
    #[must_use]
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// Returns the schema catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the record codec.
    #[must_use]
    pub fn serializer(&self) -> &BinarySerializer {
        &self.serializer
    }

    // === Schema ===

    fn create_type(&self, name: &str, kind: TypeKind) -> Result<()> {
        let bucket = self.catalog.create_type(name, kind)?;
        self.buckets.write().insert(bucket, Bucket::new());
        tracing::debug!("Created {:?} type '{}' in bucket {}", kind, name, bucket);
        Ok(())
    }

    /// Creates a document type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the name is taken.
    pub fn create_document_type(&self, name: &str) -> Result<()> {
        self.create_type(name, TypeKind::Document)
    }

    /// Creates a vertex type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the name is taken.
    pub fn create_vertex_type(&self, name: &str) -> Result<()> {
        self.create_type(name, TypeKind::Vertex)
    }

    /// Creates an edge type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the name is taken.
    pub fn create_edge_type(&self, name: &str) -> Result<()> {
        self.create_type(name, TypeKind::Edge)
    }

    /// Declares the storage tag of a property.
    ///
    /// Values saved afterwards are coerced to the tag, or dropped when they
    /// cannot be.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for an unknown type or a wire-only tag.
    pub fn set_property_type(&self, type_name: &str, property: &str, tag: BinaryType) -> Result<()> {
        Ok(self.catalog.set_property_type(type_name, property, tag)?)
    }

    // === Raw record access ===

    fn insert_record(&self, bucket_id: i32, buffer: Bytes) -> Result<Rid> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(&bucket_id)
            .ok_or_else(|| Error::Internal(format!("bucket {bucket_id} does not exist")))?;
        let rid = Rid::new(bucket_id, bucket.len() as i64);
        bucket.push(Some(buffer));
        Ok(rid)
    }

    fn with_slot<T>(&self, rid: Rid, f: impl FnOnce(&mut Option<Bytes>) -> T) -> Result<T> {
        let mut buckets = self.buckets.write();
        let position = usize::try_from(rid.position()).map_err(|_| Error::RecordNotFound(rid))?;
        let slot = buckets
            .get_mut(&rid.bucket_id())
            .and_then(|bucket| bucket.get_mut(position))
            .filter(|slot| slot.is_some())
            .ok_or(Error::RecordNotFound(rid))?;
        Ok(f(slot))
    }

    fn update_record(&self, rid: Rid, buffer: Bytes) -> Result<()> {
        self.with_slot(rid, |slot| *slot = Some(buffer))
    }

    fn remove_record(&self, rid: Rid) -> Result<()> {
        self.with_slot(rid, |slot| *slot = None)
    }

    /// Returns the stored buffer of a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if nothing is stored at `rid`.
    pub fn read_record(&self, rid: Rid) -> Result<Bytes> {
        let buckets = self.buckets.read();
        usize::try_from(rid.position())
            .ok()
            .and_then(|position| buckets.get(&rid.bucket_id())?.get(position)?.clone())
            .ok_or(Error::RecordNotFound(rid))
    }

    /// Returns true if a record is stored at `rid`.
    #[must_use]
    pub fn exists(&self, rid: Rid) -> bool {
        self.read_record(rid).is_ok()
    }

    /// Returns the number of live records in a type's bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for an unknown type.
    pub fn count_records(&self, type_name: &str) -> Result<usize> {
        let bucket_id = self
            .catalog
            .get_type(type_name)
            .map(|t| t.bucket_id())
            .ok_or_else(|| Error::Schema(format!("type '{type_name}' not found")))?;
        Ok(self
            .buckets
            .read()
            .get(&bucket_id)
            .map_or(0, |bucket| bucket.iter().flatten().count()))
    }

    // === Documents and vertices ===

    /// Loads and decodes a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if nothing is stored at `rid`, or a
    /// storage error if its type byte or prefix is unreadable.
    pub fn load(&self, rid: Rid) -> Result<Record> {
        let type_name = self
            .catalog
            .type_by_bucket(rid.bucket_id())
            .ok_or(Error::RecordNotFound(rid))?;
        let buffer = self.read_record(rid)?;
        self.serializer.deserialize(Some(rid), type_name, buffer)
    }

    /// Loads a vertex.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `rid` does not hold a vertex.
    pub fn load_vertex(&self, rid: Rid) -> Result<Vertex> {
        self.load(rid)?.into_vertex().ok_or(Error::RecordNotFound(rid))
    }

    /// Loads an edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `rid` does not hold an edge.
    pub fn load_edge(&self, rid: Rid) -> Result<Edge> {
        self.load(rid)?.into_edge().ok_or(Error::RecordNotFound(rid))
    }

    /// Reads one property straight from the stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if nothing is stored at `rid`.
    pub fn property(&self, rid: Rid, name: &str) -> Result<Option<Value>> {
        let buffer = self.read_record(rid)?;
        Ok(self.serializer.deserialize_property(&buffer, Some(rid), name))
    }

    /// Creates an unsaved document of a document type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the type is unknown or not a document type.
    pub fn new_document(&self, type_name: &str) -> Result<Document> {
        self.catalog.require(type_name, TypeKind::Document)?;
        Ok(Document::new(type_name))
    }

    /// Creates an unsaved vertex of a vertex type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the type is unknown or not a vertex type.
    pub fn new_vertex(&self, type_name: &str) -> Result<Vertex> {
        self.catalog.require(type_name, TypeKind::Vertex)?;
        Ok(Vertex::new(type_name))
    }

    /// Saves a document, inserting it on first save.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for a non-document type, or the codec's
    /// serialization error.
    pub fn save_document(&self, document: &mut Document) -> Result<Rid> {
        let bucket = self.catalog.require(document.type_name(), TypeKind::Document)?;
        let buffer = self.serializer.serialize_document(document)?;
        let rid = self.store(bucket, document.identity(), buffer.clone())?;
        document.mark_saved(rid, buffer);
        Ok(rid)
    }

    /// Saves a vertex, inserting it on first save.
    ///
    /// The stored head pointers win over the ones on `vertex`, since edges
    /// may have been added since it was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for a non-vertex type, or the codec's
    /// serialization error.
    pub fn save_vertex(&self, vertex: &mut Vertex) -> Result<Rid> {
        let bucket = self.catalog.require(vertex.type_name(), TypeKind::Vertex)?;
        if let Some(rid) = vertex.identity() {
            for direction in [Direction::Out, Direction::In] {
                vertex.set_head(direction, self.vertex_head(rid, direction)?);
            }
        }
        let buffer = self.serializer.serialize_vertex(vertex)?;
        let rid = self.store(bucket, vertex.identity(), buffer.clone())?;
        vertex.mark_saved(rid, buffer);
        Ok(rid)
    }

    fn store(&self, bucket: i32, identity: Option<Rid>, buffer: Bytes) -> Result<Rid> {
        match identity {
            Some(rid) => {
                if rid.bucket_id() != bucket {
                    return Err(Error::InvalidArgument(format!(
                        "record {rid} does not belong to bucket {bucket}"
                    )));
                }
                self.update_record(rid, buffer)?;
                Ok(rid)
            }
            None => self.insert_record(bucket, buffer),
        }
    }

    /// Deletes a document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if nothing is stored at `rid`, or
    /// [`Error::InvalidArgument`] if it is a vertex or edge.
    pub fn delete_document(&self, rid: Rid) -> Result<()> {
        match self.catalog.kind_of_bucket(rid.bucket_id()) {
            Some(TypeKind::Document) => self.remove_record(rid),
            Some(kind) => Err(Error::InvalidArgument(format!(
                "{rid} is a {kind:?}, not a document"
            ))),
            None => Err(Error::RecordNotFound(rid)),
        }
    }

    /// Deletes a vertex with all its edges and edge segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `rid` does not hold a vertex.
    pub fn delete_vertex(&self, rid: Rid) -> Result<()> {
        for direction in [Direction::Out, Direction::In] {
            let mut edges = self.edges(rid, direction)?;
            while edges.has_next()? {
                edges.next_entry()?;
                edges.remove()?;
            }
        }
        for direction in [Direction::Out, Direction::In] {
            if let Some(head) = self.vertex_head(rid, direction)? {
                for segment in self.segment_chain(head)? {
                    self.remove_record(segment)?;
                }
            }
        }
        self.remove_record(rid)?;
        tracing::debug!("Deleted vertex {}", rid);
        Ok(())
    }

    // === Graph ===

    /// Reads a vertex's head segment RID without decoding its properties.
    fn vertex_head(&self, rid: Rid, direction: Direction) -> Result<Option<Rid>> {
        let mut reader = BinaryReader::new(self.read_record(rid)?);
        if reader.get_u8()? != RecordType::Vertex.id() {
            return Err(Error::InvalidArgument(format!("{rid} is not a vertex")));
        }
        let out = reader.get_rid()?;
        let head = match direction {
            Direction::Out => out,
            Direction::In => reader.get_rid()?,
        };
        Ok(Rid::from_parts(head.bucket_id(), head.position()))
    }

    fn set_vertex_head(&self, rid: Rid, direction: Direction, head: Rid) -> Result<()> {
        let mut vertex = self.load_vertex(rid)?;
        vertex.set_head(direction, Some(head));
        let buffer = self.serializer.serialize_vertex(&vertex)?;
        self.update_record(rid, buffer)
    }

    fn segment_chain(&self, head: Rid) -> Result<Vec<Rid>> {
        let mut chain = vec![head];
        let mut visited = FxHashSet::default();
        visited.insert(head);
        let mut current = self.read_segment(head)?;
        while let Some(previous) = current.previous() {
            if !visited.insert(previous) {
                return Err(Error::corruption(format!(
                    "edge segment chain starting at {head} loops back to {previous}"
                )));
            }
            chain.push(previous);
            current = self.read_segment(previous)?;
        }
        Ok(chain)
    }

    fn link(&self, vertex: Rid, direction: Direction, edge: Rid, neighbor: Rid) -> Result<()> {
        let max = self.config.max_segment_size;
        let (mut list, created) = match self.vertex_head(vertex, direction)? {
            Some(head) => (EdgeLinkedList::open(self, vertex, direction, head, max)?, false),
            None => (
                EdgeLinkedList::create(
                    self,
                    vertex,
                    direction,
                    self.config.initial_segment_size,
                    max,
                )?,
                true,
            ),
        };
        let grown = list.add(edge, neighbor)?;
        if let Some(head) = grown.or(created.then(|| list.head().identity())) {
            self.set_vertex_head(vertex, direction, head)?;
        }
        Ok(())
    }

    fn unlink(&self, vertex: Rid, direction: Direction, edge: Rid) -> Result<bool> {
        let head = match self.vertex_head(vertex, direction) {
            Ok(Some(head)) => head,
            Ok(None) => return Ok(false),
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        let max = self.config.max_segment_size;
        EdgeLinkedList::open(self, vertex, direction, head, max)?.remove_edge(edge)
    }

    fn require_vertex(&self, rid: Rid) -> Result<()> {
        match self.catalog.kind_of_bucket(rid.bucket_id()) {
            Some(TypeKind::Vertex) if self.exists(rid) => Ok(()),
            Some(TypeKind::Vertex) | None => Err(Error::RecordNotFound(rid)),
            Some(kind) => Err(Error::InvalidArgument(format!(
                "{rid} is a {kind:?}, not a vertex"
            ))),
        }
    }

    /// Creates and stores an edge, linking it into both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for a non-edge type, or
    /// [`Error::RecordNotFound`] if an endpoint is not a stored vertex.
    pub fn new_edge<I, K>(&self, type_name: &str, out: Rid, in_: Rid, properties: I) -> Result<Edge>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let bucket = self.catalog.require(type_name, TypeKind::Edge)?;
        self.require_vertex(out)?;
        self.require_vertex(in_)?;

        let mut edge = Edge::new(type_name, out, in_);
        for (name, value) in properties {
            edge.set(name, value);
        }
        let buffer = self.serializer.serialize_edge(&edge)?;
        let rid = self.insert_record(bucket, buffer.clone())?;
        edge.mark_saved(rid, buffer);

        self.link(out, Direction::Out, rid, in_)?;
        self.link(in_, Direction::In, rid, out)?;
        Ok(edge)
    }

    /// Creates a lightweight edge: adjacency entries only, no record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] for a non-edge type, or
    /// [`Error::RecordNotFound`] if an endpoint is not a stored vertex.
    pub fn new_light_edge(&self, type_name: &str, out: Rid, in_: Rid) -> Result<LightEdge> {
        let bucket = self.catalog.require(type_name, TypeKind::Edge)?;
        self.require_vertex(out)?;
        self.require_vertex(in_)?;

        let rid = Rid::new(bucket, -self.next_light_edge.fetch_add(1, Ordering::Relaxed));
        self.link(out, Direction::Out, rid, in_)?;
        self.link(in_, Direction::In, rid, out)?;
        Ok(LightEdge::new(rid, type_name, out, in_))
    }

    /// Iterates the `(edge, vertex)` pairs of a vertex, newest segment first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `vertex` is not stored.
    pub fn edges(&self, vertex: Rid, direction: Direction) -> Result<EdgeVertexIterator<'_, Self>> {
        let head = self.vertex_head(vertex, direction)?;
        EdgeVertexIterator::from_head(self, vertex, direction, head)
    }

    /// Counts a vertex's edges in one direction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `vertex` is not stored.
    pub fn count_edges(&self, vertex: Rid, direction: Direction) -> Result<usize> {
        match self.vertex_head(vertex, direction)? {
            Some(head) => EdgeLinkedList::open(
                self,
                vertex,
                direction,
                head,
                self.config.max_segment_size,
            )?
            .count(),
            None => Ok(0),
        }
    }

    /// Returns true if `vertex` has an edge to `other` in `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if `vertex` is not stored.
    pub fn is_connected_to(&self, vertex: Rid, other: Rid, direction: Direction) -> Result<bool> {
        match self.vertex_head(vertex, direction)? {
            Some(head) => EdgeLinkedList::open(
                self,
                vertex,
                direction,
                head,
                self.config.max_segment_size,
            )?
            .contains_vertex(other),
            None => Ok(false),
        }
    }

    /// Deletes a stored edge and its adjacency entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a lightweight edge RID, or
    /// [`Error::RecordNotFound`] if the edge is not stored.
    pub fn remove_edge(&self, rid: Rid) -> Result<()> {
        if rid.is_virtual() {
            return Err(Error::InvalidArgument(format!(
                "{rid} is a lightweight edge; use remove_light_edge"
            )));
        }
        let edge = self.load_edge(rid)?;
        self.unlink(edge.out(), Direction::Out, rid)?;
        self.unlink(edge.in_(), Direction::In, rid)?;
        self.remove_record(rid)
    }

    /// Deletes a lightweight edge from both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if neither endpoint referenced it.
    pub fn remove_light_edge(&self, edge: &LightEdge) -> Result<()> {
        let out = self.unlink(edge.out(), Direction::Out, edge.identity())?;
        let in_ = self.unlink(edge.in_(), Direction::In, edge.identity())?;
        if !out && !in_ {
            return Err(Error::RecordNotFound(edge.identity()));
        }
        Ok(())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("dictionary_size", &self.dictionary.len())
            .finish()
    }
}

impl SegmentStore for Database {
    fn read_segment(&self, rid: Rid) -> Result<EdgeSegment> {
        if rid.bucket_id() != SEGMENT_BUCKET {
            return Err(Error::RecordNotFound(rid));
        }
        EdgeSegment::from_bytes(rid, self.read_record(rid)?)
    }

    fn write_segment(&self, segment: &EdgeSegment) -> Result<()> {
        self.update_record(segment.identity(), segment.content().clone())
    }

    fn allocate_segment(&self, capacity: usize, previous: Option<Rid>) -> Result<EdgeSegment> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(&SEGMENT_BUCKET)
            .ok_or_else(|| Error::Internal("segment bucket does not exist".to_string()))?;
        let rid = Rid::new(SEGMENT_BUCKET, bucket.len() as i64);
        let segment = EdgeSegment::new(rid, capacity, previous)?;
        bucket.push(Some(segment.content().clone()));
        Ok(segment)
    }
}

impl EdgeStore for Database {
    fn delete_edge(&self, edge: Rid, vertex: Rid, direction: Direction) -> Result<()> {
        let record = self.load_edge(edge)?;
        let other = record.vertex(direction.opposite());
        if record.vertex(direction) != vertex {
            tracing::warn!(
                "Edge {} does not start at {} on its {:?} side",
                edge,
                vertex,
                direction
            );
        }
        self.unlink(other, direction.opposite(), edge)?;
        self.remove_record(edge)
    }

    fn delete_light_edge(&self, edge: &LightEdge, direction: Direction) -> Result<()> {
        let opposite = direction.opposite();
        self.unlink(edge.vertex(opposite), opposite, edge.identity())?;
        Ok(())
    }
}

impl SchemaResolver for Database {
    fn type_by_bucket(&self, bucket_id: i32) -> Option<Arc<str>> {
        self.catalog.type_by_bucket(bucket_id)
    }

    fn property_type(&self, type_name: &str, property: &str) -> Option<BinaryType> {
        self.catalog.property_type(type_name, property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> (Database, Rid, Rid) {
        let db = Database::new();
        db.create_vertex_type("Person").unwrap();
        db.create_edge_type("Knows").unwrap();
        let mut a = db.new_vertex("Person").unwrap();
        a.set("name", "a");
        let mut b = db.new_vertex("Person").unwrap();
        b.set("name", "b");
        let a = db.save_vertex(&mut a).unwrap();
        let b = db.save_vertex(&mut b).unwrap();
        (db, a, b)
    }

    #[test]
    fn test_save_and_load_document() {
        let db = Database::new();
        db.create_document_type("Note").unwrap();
        let mut note = db.new_document("Note").unwrap();
        note.set("text", "hello");
        let rid = db.save_document(&mut note).unwrap();

        assert_eq!(note.identity(), Some(rid));
        assert!(!note.is_dirty());
        let loaded = db.load(rid).unwrap();
        assert_eq!(loaded.document().get("text"), Some(&Value::from("hello")));
        assert_eq!(db.property(rid, "text").unwrap(), Some(Value::from("hello")));

        note.set("text", "bye");
        assert_eq!(db.save_document(&mut note).unwrap(), rid);
        assert_eq!(db.property(rid, "text").unwrap(), Some(Value::from("bye")));
        assert_eq!(db.count_records("Note").unwrap(), 1);
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let (db, a, _) = graph();
        assert!(matches!(db.new_document("Person"), Err(Error::Schema(_))));
        assert!(matches!(db.new_vertex("Knows"), Err(Error::Schema(_))));
        assert!(matches!(
            db.delete_document(a),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_first_edge_sets_heads() {
        let (db, a, b) = graph();
        db.new_edge("Knows", a, b, Vec::<(String, Value)>::new()).unwrap();

        let a_vertex = db.load_vertex(a).unwrap();
        let b_vertex = db.load_vertex(b).unwrap();
        assert!(a_vertex.head(Direction::Out).is_some());
        assert!(a_vertex.head(Direction::In).is_none());
        assert!(b_vertex.head(Direction::In).is_some());
        // Head updates keep the properties
        assert_eq!(a_vertex.get("name"), Some(&Value::from("a")));
    }

    #[test]
    fn test_save_vertex_keeps_stored_heads() {
        let (db, a, b) = graph();
        let mut stale = db.load_vertex(a).unwrap();
        db.new_edge("Knows", a, b, Vec::<(String, Value)>::new()).unwrap();

        stale.set("age", 40);
        db.save_vertex(&mut stale).unwrap();
        assert_eq!(db.count_edges(a, Direction::Out).unwrap(), 1);
    }

    #[test]
    fn test_edge_to_missing_vertex() {
        let (db, a, _) = graph();
        let ghost = Rid::new(a.bucket_id(), 99);
        assert!(matches!(
            db.new_edge("Knows", a, ghost, Vec::<(String, Value)>::new()),
            Err(Error::RecordNotFound(_))
        ));
        assert!(db.new_light_edge("Knows", ghost, a).is_err());
    }

    #[test]
    fn test_segment_bucket_is_private() {
        let (db, a, _) = graph();
        assert!(db.read_segment(a).is_err());
        let segment = db.allocate_segment(64, None).unwrap();
        assert_eq!(segment.identity().bucket_id(), SEGMENT_BUCKET);
        assert_eq!(db.read_segment(segment.identity()).unwrap(), segment);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Database::with_config(Config::new().with_segment_sizes(8, 8)).is_err());
    }
}
