//! Pull iterator over one adjacency chain.
//!
//! The cursor walks the head segment first, then follows `previous` links,
//! so pairs come out newest segment first and in insertion order within a
//! segment. Segments are fetched lazily as the cursor reaches them.

use trellis_common::types::Rid;
use trellis_common::utils::error::{Error, Result};
use trellis_common::utils::hash::FxHashSet;

use super::segment::{CONTENT_START_POSITION, ENTRY_SIZE};
use super::{Direction, EdgeSegment, EdgeStore, SegmentStore};
use crate::record::LightEdge;
use crate::schema::SchemaResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// The cursor sits inside `current`; it may or may not have data left.
    Positioned,
    /// `current` is used up; the next step loads its predecessor.
    ChunkExhausted,
    /// No older segment exists.
    Done,
}

/// The pair handed out by the last `next_entry` call.
#[derive(Debug, Clone, Copy)]
struct LastEntry {
    segment: Rid,
    start: usize,
    edge: Rid,
    vertex: Rid,
}

/// Iterator over the `(edge, vertex)` pairs of one vertex and direction.
pub struct EdgeVertexIterator<'a, G: SegmentStore + ?Sized> {
    store: &'a G,
    vertex: Rid,
    direction: Direction,
    current: Option<EdgeSegment>,
    position: usize,
    state: CursorState,
    last: Option<LastEntry>,
    visited: FxHashSet<Rid>,
}

impl<'a, G: SegmentStore + ?Sized> EdgeVertexIterator<'a, G> {
    /// Creates an iterator starting at `head`, or an empty one.
    pub fn new(store: &'a G, vertex: Rid, direction: Direction, head: Option<EdgeSegment>) -> Self {
        let mut visited = FxHashSet::default();
        let state = match &head {
            Some(segment) => {
                visited.insert(segment.identity());
                CursorState::Positioned
            }
            None => CursorState::Done,
        };
        Self {
            store,
            vertex,
            direction,
            current: head,
            position: CONTENT_START_POSITION,
            state,
            last: None,
            visited,
        }
    }

    /// Creates an iterator from the head RID stored on a vertex.
    ///
    /// # Errors
    ///
    /// Propagates the store's error if the head segment cannot be read.
    pub fn from_head(
        store: &'a G,
        vertex: Rid,
        direction: Direction,
        head: Option<Rid>,
    ) -> Result<Self> {
        let head = head.map(|rid| store.read_segment(rid)).transpose()?;
        Ok(Self::new(store, vertex, direction, head))
    }

    /// Returns the vertex this iterator walks.
    #[must_use]
    pub fn vertex(&self) -> Rid {
        self.vertex
    }

    /// Returns the direction this iterator walks.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns true if another pair is available, loading older segments
    /// as needed.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops back on itself, or the store's
    /// error if a segment cannot be read.
    pub fn has_next(&mut self) -> Result<bool> {
        loop {
            match self.state {
                CursorState::Positioned => match &self.current {
                    Some(segment) if self.position < segment.used() => return Ok(true),
                    Some(_) => self.state = CursorState::ChunkExhausted,
                    None => self.state = CursorState::Done,
                },
                CursorState::ChunkExhausted => {
                    let Some(previous) = self.current.as_ref().and_then(EdgeSegment::previous)
                    else {
                        self.state = CursorState::Done;
                        continue;
                    };
                    if !self.visited.insert(previous) {
                        self.state = CursorState::Done;
                        return Err(Error::corruption(format!(
                            "edge segment chain of vertex {} loops back to {previous}",
                            self.vertex
                        )));
                    }
                    self.current = Some(self.store.read_segment(previous)?);
                    self.position = CONTENT_START_POSITION;
                    self.state = CursorState::Positioned;
                }
                CursorState::Done => return Ok(false),
            }
        }
    }

    /// Returns the next `(edge, vertex)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchElement`] when the chain is exhausted.
    pub fn next_entry(&mut self) -> Result<(Rid, Rid)> {
        if !self.has_next()? {
            return Err(Error::NoSuchElement);
        }
        let Some(segment) = &self.current else {
            return Err(Error::NoSuchElement);
        };
        let start = self.position;
        let (edge, vertex) = segment.entry_at(start)?;
        self.last = Some(LastEntry {
            segment: segment.identity(),
            start,
            edge,
            vertex,
        });
        self.position += ENTRY_SIZE;
        Ok((edge, vertex))
    }
}

impl<G> EdgeVertexIterator<'_, G>
where
    G: SegmentStore + EdgeStore + SchemaResolver + ?Sized,
{
    /// Removes the pair returned by the last [`next_entry`](Self::next_entry).
    ///
    /// The edge itself is deleted through the [`EdgeStore`] hooks first. A
    /// missing edge record is treated as already deleted and other hook
    /// failures are logged; in both cases the adjacency entry is still
    /// removed and the updated segment written back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if there is no pair to remove, either
    /// because `next_entry` was never called or the pair was already removed.
    pub fn remove(&mut self) -> Result<()> {
        let last = self.last.take().ok_or_else(|| {
            Error::IllegalState("remove() requires a preceding call to next()".to_string())
        })?;

        self.delete_edge(&last);

        let in_current = self
            .current
            .as_ref()
            .is_some_and(|segment| segment.identity() == last.segment);
        let segment = match &self.current {
            Some(segment) if in_current => segment.clone(),
            _ => self.store.read_segment(last.segment)?,
        };
        if segment.entry_at(last.start)? != (last.edge, last.vertex) {
            return Err(Error::corruption(format!(
                "edge segment {} changed under the iterator of vertex {}",
                last.segment, self.vertex
            )));
        }

        let mut edit = segment.modify();
        edit.remove_entry(last.start, last.start + ENTRY_SIZE)?;
        let updated = edit.freeze();
        self.store.write_segment(&updated)?;

        if in_current {
            self.current = Some(updated);
            self.position = last.start;
        }
        Ok(())
    }

    fn delete_edge(&self, last: &LastEntry) {
        let result = if last.edge.is_virtual() {
            self.delete_light_edge(last)
        } else {
            self.store.delete_edge(last.edge, self.vertex, self.direction)
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("Edge {} was already deleted", last.edge);
            }
            Err(e) => {
                tracing::warn!(
                    "Error deleting edge {} of vertex {}, removing adjacency entry anyway: {}",
                    last.edge,
                    self.vertex,
                    e
                );
            }
        }
    }

    fn delete_light_edge(&self, last: &LastEntry) -> Result<()> {
        let type_name = self.store.type_by_bucket(last.edge.bucket_id()).ok_or_else(|| {
            Error::Schema(format!(
                "no edge type owns bucket {} of light edge {}",
                last.edge.bucket_id(),
                last.edge
            ))
        })?;
        let (out, in_) = match self.direction {
            Direction::Out => (self.vertex, last.vertex),
            Direction::In => (last.vertex, self.vertex),
        };
        let edge = LightEdge::new(last.edge, type_name, out, in_);
        tracing::debug!("Deleting light edge {} ({} -> {})", edge.identity(), out, in_);
        self.store.delete_light_edge(&edge, self.direction)
    }
}

impl<G: SegmentStore + ?Sized> Iterator for EdgeVertexIterator<'_, G> {
    type Item = Result<(Rid, Rid)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_entry()),
            Ok(false) => None,
            Err(e) => {
                self.state = CursorState::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{LIGHT_EDGE_BUCKET, MemoryStore};

    const V: Rid = Rid::new(1, 0);

    fn e(i: i64) -> Rid {
        Rid::new(3, i)
    }

    fn n(i: i64) -> Rid {
        Rid::new(1, 100 + i)
    }

    fn collect<G: SegmentStore + ?Sized>(it: EdgeVertexIterator<'_, G>) -> Vec<(Rid, Rid)> {
        it.map(Result::unwrap).collect()
    }

    #[test]
    fn test_single_segment_insertion_order() {
        let store = MemoryStore::new();
        let head = store.chain(128, &[&[(e(1), n(1)), (e(2), n(2)), (e(3), n(3))]]);
        let it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        assert_eq!(collect(it), vec![(e(1), n(1)), (e(2), n(2)), (e(3), n(3))]);
    }

    #[test]
    fn test_newest_segment_first() {
        let store = MemoryStore::new();
        let head = store.chain(
            128,
            &[
                &[(e(1), n(1)), (e(2), n(2))],
                &[(e(3), n(3))],
                &[(e(4), n(4)), (e(5), n(5))],
            ],
        );
        let it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        let edges: Vec<_> = collect(it).into_iter().map(|(edge, _)| edge).collect();
        assert_eq!(edges, vec![e(4), e(5), e(3), e(1), e(2)]);
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let store = MemoryStore::new();
        let head = store.chain(128, &[&[(e(1), n(1))], &[], &[]]);
        let it = EdgeVertexIterator::new(&store, V, Direction::In, Some(head));
        assert_eq!(collect(it), vec![(e(1), n(1))]);
    }

    #[test]
    fn test_no_head_is_empty() {
        let store = MemoryStore::new();
        let mut it = EdgeVertexIterator::new(&store, V, Direction::Out, None);
        assert!(!it.has_next().unwrap());
        assert!(matches!(it.next_entry(), Err(Error::NoSuchElement)));
        assert!(it.next().is_none());
    }

    #[test]
    fn test_from_head_reads_segment() {
        let store = MemoryStore::new();
        let head = store.chain(128, &[&[(e(1), n(1))]]);
        let it = EdgeVertexIterator::from_head(&store, V, Direction::Out, Some(head.identity()))
            .unwrap();
        assert_eq!(collect(it), vec![(e(1), n(1))]);
        assert!(EdgeVertexIterator::from_head(&store, V, Direction::Out, Some(Rid::new(90, 99)))
            .is_err());
    }

    #[test]
    fn test_remove_middle_entry() {
        let store = MemoryStore::new();
        let head = store.chain(128, &[&[(e(1), n(1)), (e(2), n(2)), (e(3), n(3))]]);
        let head_rid = head.identity();
        let used = head.used();

        let mut it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        assert_eq!(it.next_entry().unwrap(), (e(1), n(1)));
        assert_eq!(it.next_entry().unwrap(), (e(2), n(2)));
        it.remove().unwrap();
        // The cursor sees the shifted entry next
        assert_eq!(it.next_entry().unwrap(), (e(3), n(3)));
        assert!(!it.has_next().unwrap());

        let stored = store.segment(head_rid);
        assert_eq!(stored.used(), used - ENTRY_SIZE);
        let remaining: Vec<_> = stored.entries().map(|(_, edge, vertex)| (edge, vertex)).collect();
        assert_eq!(remaining, vec![(e(1), n(1)), (e(3), n(3))]);
        assert_eq!(
            store.deleted_edges.lock().as_slice(),
            &[(e(2), V, Direction::Out)]
        );
    }

    #[test]
    fn test_remove_requires_next() {
        let store = MemoryStore::new();
        let head = store.chain(128, &[&[(e(1), n(1)), (e(2), n(2))]]);
        let mut it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        assert!(matches!(it.remove(), Err(Error::IllegalState(_))));

        it.next_entry().unwrap();
        it.remove().unwrap();
        assert!(matches!(it.remove(), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_remove_light_edge_uses_hook() {
        let store = MemoryStore::new();
        let light = Rid::new(LIGHT_EDGE_BUCKET, -1);
        let other = Rid::new(1, 555);
        let head = store.chain(128, &[&[(e(1), n(1)), (light, n(2))]]);
        let unrelated = store.chain(128, &[&[(e(9), other)]]);

        let mut it = EdgeVertexIterator::new(&store, V, Direction::In, Some(head));
        it.next_entry().unwrap();
        assert_eq!(it.next_entry().unwrap(), (light, n(2)));
        it.remove().unwrap();

        assert!(store.deleted_edges.lock().is_empty());
        let deleted = store.deleted_light_edges.lock();
        assert_eq!(deleted.len(), 1);
        let (edge, direction) = &deleted[0];
        assert_eq!(edge.identity(), light);
        assert_eq!(edge.type_name(), "Knows");
        assert_eq!(edge.out(), n(2));
        assert_eq!(edge.in_(), V);
        assert_eq!(*direction, Direction::In);

        assert_eq!(store.segment(unrelated.identity()), unrelated);
    }

    #[test]
    fn test_missing_or_failing_edge_still_removes_entry() {
        let store = MemoryStore::new();
        store.missing_edges.lock().push(e(1));
        store.failing_edges.lock().push(e(2));
        let head = store.chain(128, &[&[(e(1), n(1)), (e(2), n(2)), (e(3), n(3))]]);
        let head_rid = head.identity();

        let mut it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        it.next_entry().unwrap();
        it.remove().unwrap();
        it.next_entry().unwrap();
        it.remove().unwrap();

        let edges: Vec<_> = store.segment(head_rid).entries().map(|(_, edge, _)| edge).collect();
        assert_eq!(edges, vec![e(3)]);
        assert!(store.deleted_edges.lock().is_empty());
    }

    #[test]
    fn test_remove_after_moving_to_older_segment() {
        let store = MemoryStore::new();
        let head = store.chain(128, &[&[(e(1), n(1))], &[(e(2), n(2))]]);
        let head_rid = head.identity();

        let mut it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        assert_eq!(it.next_entry().unwrap(), (e(2), n(2)));
        // Loads the older segment before the removal
        assert!(it.has_next().unwrap());
        it.remove().unwrap();
        assert_eq!(it.next_entry().unwrap(), (e(1), n(1)));

        assert!(store.segment(head_rid).is_empty());
    }

    #[test]
    fn test_cycle_is_corruption() {
        let store = MemoryStore::new();
        let older = store.chain(128, &[&[(e(1), n(1))]]);
        let head = store.allocate_segment(128, Some(older.identity())).unwrap();
        let mut edit = older.modify();
        edit.set_previous(Some(head.identity()));
        store.write_segment(&edit.freeze()).unwrap();

        let mut it = EdgeVertexIterator::new(&store, V, Direction::Out, Some(head));
        assert_eq!(it.next().unwrap().unwrap(), (e(1), n(1)));
        assert!(matches!(it.next(), Some(Err(Error::Storage(_)))));
        assert!(it.next().is_none());
    }
}
