//! Adjacency list of one vertex and direction.
//!
//! Appends always go to the head segment. When the head is full a new,
//! larger head is allocated and linked to the old one; the caller stores
//! the new head RID on the vertex. Older segments are never merged.

use trellis_common::types::Rid;
use trellis_common::utils::error::{Error, Result};
use trellis_common::utils::hash::FxHashSet;

use super::segment::ENTRY_SIZE;
use super::{Direction, EdgeSegment, EdgeVertexIterator, SegmentStore};

/// Edge chain rooted at a vertex's head segment.
pub struct EdgeLinkedList<'a, S: SegmentStore + ?Sized> {
    store: &'a S,
    vertex: Rid,
    direction: Direction,
    head: EdgeSegment,
    max_segment_size: usize,
}

impl<'a, S: SegmentStore + ?Sized> EdgeLinkedList<'a, S> {
    /// Wraps an already loaded head segment.
    pub fn new(
        store: &'a S,
        vertex: Rid,
        direction: Direction,
        head: EdgeSegment,
        max_segment_size: usize,
    ) -> Self {
        Self {
            store,
            vertex,
            direction,
            head,
            max_segment_size,
        }
    }

    /// Allocates the first segment of a new chain.
    ///
    /// # Errors
    ///
    /// Propagates allocation failures from the store.
    pub fn create(
        store: &'a S,
        vertex: Rid,
        direction: Direction,
        initial_segment_size: usize,
        max_segment_size: usize,
    ) -> Result<Self> {
        let head = store.allocate_segment(initial_segment_size, None)?;
        tracing::debug!(
            "Created {:?} edge segment {} for vertex {}",
            direction,
            head.identity(),
            vertex
        );
        Ok(Self::new(store, vertex, direction, head, max_segment_size))
    }

    /// Loads the chain whose head is stored at `head`.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the store.
    pub fn open(
        store: &'a S,
        vertex: Rid,
        direction: Direction,
        head: Rid,
        max_segment_size: usize,
    ) -> Result<Self> {
        let head = store.read_segment(head)?;
        Ok(Self::new(store, vertex, direction, head, max_segment_size))
    }

    /// Returns the head segment.
    #[must_use]
    pub fn head(&self) -> &EdgeSegment {
        &self.head
    }

    /// Returns the owning vertex.
    #[must_use]
    pub fn vertex(&self) -> Rid {
        self.vertex
    }

    /// Returns the direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Re-reads the head after it was changed through an iterator.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the store.
    pub fn reload(&mut self) -> Result<()> {
        self.head = self.store.read_segment(self.head.identity())?;
        Ok(())
    }

    /// Appends a pair.
    ///
    /// Returns the RID of the new head when the chain had to grow.
    ///
    /// # Errors
    ///
    /// Propagates write and allocation failures from the store.
    pub fn add(&mut self, edge: Rid, vertex: Rid) -> Result<Option<Rid>> {
        let mut edit = self.head.modify();
        if edit.add(edge, vertex).is_ok() {
            let head = edit.freeze();
            self.store.write_segment(&head)?;
            self.head = head;
            return Ok(None);
        }

        let capacity = self.head.capacity();
        let new_capacity = (capacity * 2).min(self.max_segment_size).max(capacity);
        let next = self
            .store
            .allocate_segment(new_capacity, Some(self.head.identity()))?;
        tracing::debug!(
            "Edge segment {} of vertex {} is full, linking new {}-byte head {}",
            self.head.identity(),
            self.vertex,
            new_capacity,
            next.identity()
        );

        let mut edit = next.modify();
        edit.add(edge, vertex)
            .map_err(|full| Error::Internal(full.to_string()))?;
        let head = edit.freeze();
        self.store.write_segment(&head)?;
        let rid = head.identity();
        self.head = head;
        Ok(Some(rid))
    }

    /// Returns an iterator over the chain, newest segment first.
    #[must_use]
    pub fn iter(&self) -> EdgeVertexIterator<'a, S> {
        EdgeVertexIterator::new(self.store, self.vertex, self.direction, Some(self.head.clone()))
    }

    fn previous_of(
        &self,
        segment: &EdgeSegment,
        visited: &mut FxHashSet<Rid>,
    ) -> Result<Option<EdgeSegment>> {
        let Some(previous) = segment.previous() else {
            return Ok(None);
        };
        if !visited.insert(previous) {
            return Err(Error::corruption(format!(
                "edge segment chain of vertex {} loops back to {previous}",
                self.vertex
            )));
        }
        self.store.read_segment(previous).map(Some)
    }

    /// Walks every segment, newest first, until `visit` returns true.
    fn walk(&self, mut visit: impl FnMut(&EdgeSegment) -> Result<bool>) -> Result<()> {
        let mut visited = FxHashSet::default();
        visited.insert(self.head.identity());
        let mut current = Some(self.head.clone());
        while let Some(segment) = current {
            if visit(&segment)? {
                break;
            }
            current = self.previous_of(&segment, &mut visited)?;
        }
        Ok(())
    }

    /// Counts the pairs in the whole chain.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops, or the store's read error.
    pub fn count(&self) -> Result<usize> {
        let mut total = 0;
        self.walk(|segment| {
            total += segment.count();
            Ok(false)
        })?;
        Ok(total)
    }

    /// Returns true if the chain holds no pairs.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops, or the store's read error.
    pub fn is_empty(&self) -> Result<bool> {
        let mut empty = true;
        self.walk(|segment| {
            empty = segment.is_empty();
            Ok(!empty)
        })?;
        Ok(empty)
    }

    /// Returns true if any pair references `edge`.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops, or the store's read error.
    pub fn contains_edge(&self, edge: Rid) -> Result<bool> {
        let mut found = false;
        self.walk(|segment| {
            found = segment.contains_edge(edge);
            Ok(found)
        })?;
        Ok(found)
    }

    /// Returns true if any pair points at `vertex`.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops, or the store's read error.
    pub fn contains_vertex(&self, vertex: Rid) -> Result<bool> {
        let mut found = false;
        self.walk(|segment| {
            found = segment.contains_vertex(vertex);
            Ok(found)
        })?;
        Ok(found)
    }

    fn store_updated(&mut self, segment: EdgeSegment) -> Result<()> {
        self.store.write_segment(&segment)?;
        if segment.identity() == self.head.identity() {
            self.head = segment;
        }
        Ok(())
    }

    /// Removes the first pair that references `edge`.
    ///
    /// Returns false if no pair matched.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops, or the store's read or write
    /// error.
    pub fn remove_edge(&mut self, edge: Rid) -> Result<bool> {
        let mut updated = None;
        self.walk(|segment| {
            let Some((start, _, _)) = segment.entries().find(|(_, e, _)| *e == edge) else {
                return Ok(false);
            };
            let mut edit = segment.modify();
            edit.remove_entry(start, start + ENTRY_SIZE)?;
            updated = Some(edit.freeze());
            Ok(true)
        })?;

        match updated {
            Some(segment) => {
                self.store_updated(segment)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every pair that points at `vertex`.
    ///
    /// Returns the number of pairs removed.
    ///
    /// # Errors
    ///
    /// Returns corruption if the chain loops, or the store's read or write
    /// error.
    pub fn remove_vertex(&mut self, vertex: Rid) -> Result<usize> {
        let mut updated = Vec::new();
        let mut removed = 0;
        self.walk(|segment| {
            let starts: Vec<usize> = segment
                .entries()
                .filter(|(_, _, v)| *v == vertex)
                .map(|(start, _, _)| start)
                .collect();
            if starts.is_empty() {
                return Ok(false);
            }
            let mut edit = segment.modify();
            // Back to front so earlier offsets stay valid
            for start in starts.iter().rev() {
                edit.remove_entry(*start, *start + ENTRY_SIZE)?;
            }
            removed += starts.len();
            updated.push(edit.freeze());
            Ok(false)
        })?;

        for segment in updated {
            self.store_updated(segment)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::segment::MIN_SEGMENT_SIZE;
    use crate::graph::testing::MemoryStore;

    const V: Rid = Rid::new(1, 0);

    fn e(i: i64) -> Rid {
        Rid::new(3, i)
    }

    fn n(i: i64) -> Rid {
        Rid::new(1, 100 + i)
    }

    fn edges<S: SegmentStore + ?Sized>(list: &EdgeLinkedList<'_, S>) -> Vec<Rid> {
        list.iter().map(|pair| pair.unwrap().0).collect()
    }

    // Two entries per segment
    const SMALL: usize = MIN_SEGMENT_SIZE + ENTRY_SIZE;

    #[test]
    fn test_add_without_growth() {
        let store = MemoryStore::new();
        let mut list = EdgeLinkedList::create(&store, V, Direction::Out, 128, 1024).unwrap();
        for i in 0..3 {
            assert_eq!(list.add(e(i), n(i)).unwrap(), None);
        }
        assert_eq!(edges(&list), vec![e(0), e(1), e(2)]);
        assert_eq!(list.count().unwrap(), 3);
        assert_eq!(store.segment(list.head().identity()).count(), 3);
    }

    #[test]
    fn test_growth_links_larger_head() {
        let store = MemoryStore::new();
        let mut list = EdgeLinkedList::create(&store, V, Direction::Out, SMALL, 2 * SMALL).unwrap();
        let first = list.head().identity();

        assert_eq!(list.add(e(1), n(1)).unwrap(), None);
        assert_eq!(list.add(e(2), n(2)).unwrap(), None);
        let grown = list.add(e(3), n(3)).unwrap().unwrap();

        assert_eq!(list.head().identity(), grown);
        assert_eq!(list.head().capacity(), 2 * SMALL);
        assert_eq!(list.head().previous(), Some(first));
        assert_eq!(edges(&list), vec![e(3), e(1), e(2)]);

        // Capped at the maximum size
        for i in 4..8 {
            list.add(e(i), n(i)).unwrap();
        }
        assert_eq!(list.head().capacity(), 2 * SMALL);
        assert_eq!(list.count().unwrap(), 7);
    }

    #[test]
    fn test_contains() {
        let store = MemoryStore::new();
        let mut list = EdgeLinkedList::create(&store, V, Direction::In, SMALL, SMALL).unwrap();
        assert!(list.is_empty().unwrap());
        for i in 0..5 {
            list.add(e(i), n(i)).unwrap();
        }
        assert!(!list.is_empty().unwrap());
        assert!(list.contains_edge(e(0)).unwrap());
        assert!(list.contains_vertex(n(4)).unwrap());
        assert!(!list.contains_edge(e(9)).unwrap());
        assert!(!list.contains_vertex(n(9)).unwrap());
    }

    #[test]
    fn test_remove_edge_in_older_segment() {
        let store = MemoryStore::new();
        let mut list = EdgeLinkedList::create(&store, V, Direction::Out, SMALL, SMALL).unwrap();
        for i in 0..5 {
            list.add(e(i), n(i)).unwrap();
        }
        assert!(list.remove_edge(e(1)).unwrap());
        assert!(!list.remove_edge(e(1)).unwrap());
        assert_eq!(edges(&list), vec![e(4), e(2), e(3), e(0)]);
    }

    #[test]
    fn test_remove_vertex_across_segments() {
        let store = MemoryStore::new();
        let mut list = EdgeLinkedList::create(&store, V, Direction::Out, SMALL, SMALL).unwrap();
        let target = n(0);
        for i in 0..6 {
            let neighbor = if i % 2 == 0 { target } else { n(i) };
            list.add(e(i), neighbor).unwrap();
        }
        assert_eq!(list.remove_vertex(target).unwrap(), 3);
        assert!(!list.contains_vertex(target).unwrap());
        assert_eq!(edges(&list), vec![e(5), e(3), e(1)]);
        assert_eq!(list.head().count(), 1);
    }

    #[test]
    fn test_reload_after_iterator_removal() {
        let store = MemoryStore::new();
        let mut list = EdgeLinkedList::create(&store, V, Direction::Out, 128, 128).unwrap();
        list.add(e(1), n(1)).unwrap();
        list.add(e(2), n(2)).unwrap();

        let mut it = list.iter();
        it.next_entry().unwrap();
        it.remove().unwrap();
        drop(it);

        assert_eq!(list.head().count(), 2);
        list.reload().unwrap();
        assert_eq!(list.head().count(), 1);
        assert_eq!(edges(&list), vec![e(2)]);
    }

    #[test]
    fn test_open_existing_chain() {
        let store = MemoryStore::new();
        let head = {
            let mut list = EdgeLinkedList::create(&store, V, Direction::Out, SMALL, SMALL).unwrap();
            for i in 0..3 {
                list.add(e(i), n(i)).unwrap();
            }
            list.head().identity()
        };
        let list = EdgeLinkedList::open(&store, V, Direction::Out, head, SMALL).unwrap();
        assert_eq!(list.count().unwrap(), 3);
    }
}
