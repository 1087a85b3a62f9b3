//! Graph adjacency storage.
//!
//! Every vertex owns one chain of [`EdgeSegment`]s per direction. The vertex
//! record points at the newest segment (the head); each segment points back
//! at the one before it. Segments are addressed by RID and loaded through a
//! [`SegmentStore`], so a chain is walked by lookup rather than by pointers.
//!
//! Traversal order is newest segment first, insertion order within a segment.
//!
//! ## Modules
//!
//! - [`segment`] - Fixed-capacity pages of `(edge, vertex)` pairs
//! - [`iterator`] - Pull iterator over a chain, with removal
//! - [`edge_list`] - Append and lookup over a chain, growing it on demand

pub mod edge_list;
pub mod iterator;
pub mod segment;

pub use edge_list::EdgeLinkedList;
pub use iterator::EdgeVertexIterator;
pub use segment::{EdgeSegment, MutableEdgeSegment, SegmentFull};

use trellis_common::types::Rid;
use trellis_common::utils::error::Result;

use crate::record::LightEdge;

/// Side of a vertex an adjacency list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges leaving the vertex.
    Out,
    /// Edges arriving at the vertex.
    In,
}

impl Direction {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Out => Self::In,
            Self::In => Self::Out,
        }
    }
}

/// Page access for edge segments.
///
/// Implemented by the persistence layer. The core reads segments, hands
/// back updated copies, and asks for new ones; it never caches them.
pub trait SegmentStore {
    /// Loads a segment.
    ///
    /// # Errors
    ///
    /// Returns [`RecordNotFound`](trellis_common::utils::error::Error::RecordNotFound)
    /// if no segment lives at `rid`, or corruption if its page is malformed.
    fn read_segment(&self, rid: Rid) -> Result<EdgeSegment>;

    /// Persists an updated segment at its own RID.
    fn write_segment(&self, segment: &EdgeSegment) -> Result<()>;

    /// Allocates and persists an empty segment linked to `previous`.
    fn allocate_segment(&self, capacity: usize, previous: Option<Rid>) -> Result<EdgeSegment>;
}

/// Deletion hooks run when an adjacency entry is removed.
///
/// The adjacency list being iterated is maintained by the caller. These
/// hooks clean up everything else: the edge record and the entry on the
/// other endpoint.
pub trait EdgeStore {
    /// Deletes a stored edge reached from `vertex` in `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordNotFound`](trellis_common::utils::error::Error::RecordNotFound)
    /// if the edge record is already gone.
    fn delete_edge(&self, edge: Rid, vertex: Rid, direction: Direction) -> Result<()>;

    /// Deletes a lightweight edge reached through its `direction` side.
    ///
    /// There is no record behind a lightweight edge, so this only touches
    /// the adjacency list of the other endpoint.
    fn delete_light_edge(&self, edge: &LightEdge, direction: Direction) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collaborators for graph unit tests.

    use std::sync::Arc;

    use parking_lot::Mutex;
    use trellis_common::utils::error::Error;
    use trellis_common::utils::hash::FxHashMap;

    use super::*;
    use crate::schema::SchemaResolver;
    use crate::storage::BinaryType;

    pub const SEGMENT_BUCKET: i32 = 90;
    pub const LIGHT_EDGE_BUCKET: i32 = 7;

    #[derive(Default)]
    pub struct MemoryStore {
        pub segments: Mutex<FxHashMap<Rid, EdgeSegment>>,
        pub next_position: Mutex<i64>,
        pub deleted_edges: Mutex<Vec<(Rid, Rid, Direction)>>,
        pub deleted_light_edges: Mutex<Vec<(LightEdge, Direction)>>,
        pub missing_edges: Mutex<Vec<Rid>>,
        pub failing_edges: Mutex<Vec<Rid>>,
        pub writes: Mutex<usize>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn segment(&self, rid: Rid) -> EdgeSegment {
            self.segments.lock()[&rid].clone()
        }

        /// Builds a chain from oldest to newest and returns the head.
        pub fn chain(&self, capacity: usize, segments: &[&[(Rid, Rid)]]) -> EdgeSegment {
            let mut previous = None;
            let mut head = None;
            for entries in segments {
                let segment = self.allocate_segment(capacity, previous).unwrap();
                let mut m = segment.modify();
                for (edge, vertex) in *entries {
                    m.add(*edge, *vertex).unwrap();
                }
                let segment = m.freeze();
                self.write_segment(&segment).unwrap();
                previous = Some(segment.identity());
                head = Some(segment);
            }
            head.unwrap()
        }
    }

    impl SegmentStore for MemoryStore {
        fn read_segment(&self, rid: Rid) -> Result<EdgeSegment> {
            self.segments
                .lock()
                .get(&rid)
                .cloned()
                .ok_or(Error::RecordNotFound(rid))
        }

        fn write_segment(&self, segment: &EdgeSegment) -> Result<()> {
            *self.writes.lock() += 1;
            self.segments
                .lock()
                .insert(segment.identity(), segment.clone());
            Ok(())
        }

        fn allocate_segment(&self, capacity: usize, previous: Option<Rid>) -> Result<EdgeSegment> {
            let position = {
                let mut next = self.next_position.lock();
                *next += 1;
                *next - 1
            };
            let segment = EdgeSegment::new(Rid::new(SEGMENT_BUCKET, position), capacity, previous)?;
            self.segments
                .lock()
                .insert(segment.identity(), segment.clone());
            Ok(segment)
        }
    }

    impl EdgeStore for MemoryStore {
        fn delete_edge(&self, edge: Rid, vertex: Rid, direction: Direction) -> Result<()> {
            if self.missing_edges.lock().contains(&edge) {
                return Err(Error::RecordNotFound(edge));
            }
            if self.failing_edges.lock().contains(&edge) {
                return Err(Error::Internal(format!("cannot delete {edge}")));
            }
            self.deleted_edges.lock().push((edge, vertex, direction));
            Ok(())
        }

        fn delete_light_edge(&self, edge: &LightEdge, direction: Direction) -> Result<()> {
            self.deleted_light_edges.lock().push((edge.clone(), direction));
            Ok(())
        }
    }

    impl SchemaResolver for MemoryStore {
        fn type_by_bucket(&self, bucket_id: i32) -> Option<Arc<str>> {
            (bucket_id == LIGHT_EDGE_BUCKET).then(|| Arc::from("Knows"))
        }

        fn property_type(&self, _type_name: &str, _property: &str) -> Option<BinaryType> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::Out.opposite(), Direction::In);
        assert_eq!(Direction::In.opposite(), Direction::Out);
    }
}
