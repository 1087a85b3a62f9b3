//! Edge segments.
//!
//! A segment is a fixed-capacity page of `(edge, vertex)` RID pairs for one
//! vertex and direction, linked to the next older segment of the chain:
//!
//! ```text
//! [previous: i32 bucket + i64 position]   (-1, -1) for the oldest segment
//! [used: i32]                             absolute end of the entries
//! { [edge: rid][vertex: rid] } x N        fixed-width, back to back
//! [free space up to capacity]
//! ```
//!
//! [`EdgeSegment`] is immutable. Edits go through [`EdgeSegment::modify`],
//! which hands out a private [`MutableEdgeSegment`] copy; freezing it yields
//! the new segment to persist.

use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use trellis_common::types::Rid;
use trellis_common::utils::error::{Error, Result};

use crate::storage::RID_SIZE;

/// Offset of the `used` field.
const USED_POSITION: usize = RID_SIZE;

/// Offset of the first entry.
pub const CONTENT_START_POSITION: usize = RID_SIZE + 4;

/// Size of one `(edge, vertex)` entry.
pub const ENTRY_SIZE: usize = 2 * RID_SIZE;

/// Smallest capacity that holds one entry.
pub const MIN_SEGMENT_SIZE: usize = CONTENT_START_POSITION + ENTRY_SIZE;

/// Returned when a segment has no room for another entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("edge segment {0} is full")]
pub struct SegmentFull(pub Rid);

fn read_rid(content: &[u8], position: usize) -> Rid {
    Rid::new(
        BigEndian::read_i32(&content[position..position + 4]),
        BigEndian::read_i64(&content[position + 4..position + RID_SIZE]),
    )
}

fn write_rid(content: &mut [u8], position: usize, rid: Rid) {
    BigEndian::write_i32(&mut content[position..position + 4], rid.bucket_id());
    BigEndian::write_i64(&mut content[position + 4..position + RID_SIZE], rid.position());
}

/// An immutable edge segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSegment {
    identity: Rid,
    content: Bytes,
}

impl EdgeSegment {
    /// Creates an empty segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `capacity` cannot hold one entry.
    pub fn new(identity: Rid, capacity: usize, previous: Option<Rid>) -> Result<Self> {
        if capacity < MIN_SEGMENT_SIZE || i32::try_from(capacity).is_err() {
            return Err(Error::InvalidArgument(format!(
                "edge segment capacity {capacity} must be between {MIN_SEGMENT_SIZE} and {}",
                i32::MAX
            )));
        }
        let mut content = BytesMut::zeroed(capacity);
        write_rid(&mut content, 0, previous.unwrap_or(Rid::NULL));
        BigEndian::write_i32(
            &mut content[USED_POSITION..CONTENT_START_POSITION],
            CONTENT_START_POSITION as i32,
        );
        Ok(Self {
            identity,
            content: content.freeze(),
        })
    }

    /// Wraps stored bytes, validating the layout.
    ///
    /// # Errors
    ///
    /// Returns corruption if `used` is out of range or not entry aligned.
    pub fn from_bytes(identity: Rid, content: Bytes) -> Result<Self> {
        if content.len() < MIN_SEGMENT_SIZE {
            return Err(Error::corruption(format!(
                "edge segment {identity} is {} bytes, smaller than {MIN_SEGMENT_SIZE}",
                content.len()
            )));
        }
        let used = BigEndian::read_i32(&content[USED_POSITION..CONTENT_START_POSITION]);
        let valid = usize::try_from(used).ok().filter(|used| {
            *used >= CONTENT_START_POSITION
                && *used <= content.len()
                && (*used - CONTENT_START_POSITION) % ENTRY_SIZE == 0
        });
        if valid.is_none() {
            return Err(Error::corruption(format!(
                "edge segment {identity} has invalid used size {used}"
            )));
        }
        Ok(Self { identity, content })
    }

    /// Returns the segment RID.
    #[must_use]
    pub fn identity(&self) -> Rid {
        self.identity
    }

    /// Returns the raw page.
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Returns the page size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.content.len()
    }

    /// Returns the absolute end offset of the entries.
    #[must_use]
    pub fn used(&self) -> usize {
        BigEndian::read_i32(&self.content[USED_POSITION..CONTENT_START_POSITION]) as usize
    }

    /// Returns the next older segment of the chain.
    #[must_use]
    pub fn previous(&self) -> Option<Rid> {
        let rid = read_rid(&self.content, 0);
        Rid::from_parts(rid.bucket_id(), rid.position())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn count(&self) -> usize {
        (self.used() - CONTENT_START_POSITION) / ENTRY_SIZE
    }

    /// Returns true if the segment holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used() == CONTENT_START_POSITION
    }

    /// Returns true if another entry fits.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.used() + ENTRY_SIZE <= self.capacity()
    }

    /// Reads the entry starting at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `position` is not the start of
    /// a stored entry.
    pub fn entry_at(&self, position: usize) -> Result<(Rid, Rid)> {
        check_entry(position, self.used())?;
        Ok((
            read_rid(&self.content, position),
            read_rid(&self.content, position + RID_SIZE),
        ))
    }

    /// Iterates `(position, edge, vertex)` in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, Rid, Rid)> + '_ {
        (CONTENT_START_POSITION..self.used())
            .step_by(ENTRY_SIZE)
            .map(|position| {
                (
                    position,
                    read_rid(&self.content, position),
                    read_rid(&self.content, position + RID_SIZE),
                )
            })
    }

    /// Returns true if any entry references `edge`.
    #[must_use]
    pub fn contains_edge(&self, edge: Rid) -> bool {
        self.entries().any(|(_, e, _)| e == edge)
    }

    /// Returns true if any entry points at `vertex`.
    #[must_use]
    pub fn contains_vertex(&self, vertex: Rid) -> bool {
        self.entries().any(|(_, _, v)| v == vertex)
    }

    /// Starts an edit on a private copy of the page.
    #[must_use]
    pub fn modify(&self) -> MutableEdgeSegment {
        MutableEdgeSegment {
            identity: self.identity,
            content: BytesMut::from(&self.content[..]),
        }
    }
}

fn check_entry(position: usize, used: usize) -> Result<()> {
    if position < CONTENT_START_POSITION
        || (position - CONTENT_START_POSITION) % ENTRY_SIZE != 0
        || position + ENTRY_SIZE > used
    {
        return Err(Error::InvalidArgument(format!(
            "no edge segment entry starts at {position} (used {used})"
        )));
    }
    Ok(())
}

/// An edge segment being edited.
#[derive(Debug)]
pub struct MutableEdgeSegment {
    identity: Rid,
    content: BytesMut,
}

impl MutableEdgeSegment {
    /// Returns the segment RID.
    #[must_use]
    pub fn identity(&self) -> Rid {
        self.identity
    }

    /// Returns the absolute end offset of the entries.
    #[must_use]
    pub fn used(&self) -> usize {
        BigEndian::read_i32(&self.content[USED_POSITION..CONTENT_START_POSITION]) as usize
    }

    fn set_used(&mut self, used: usize) {
        BigEndian::write_i32(
            &mut self.content[USED_POSITION..CONTENT_START_POSITION],
            used as i32,
        );
    }

    /// Returns the page size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.content.len()
    }

    /// Returns the next older segment of the chain.
    #[must_use]
    pub fn previous(&self) -> Option<Rid> {
        let rid = read_rid(&self.content, 0);
        Rid::from_parts(rid.bucket_id(), rid.position())
    }

    /// Relinks the segment.
    pub fn set_previous(&mut self, previous: Option<Rid>) {
        write_rid(&mut self.content, 0, previous.unwrap_or(Rid::NULL));
    }

    /// Appends an entry.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentFull`] when the entry does not fit; the caller links
    /// a new segment and appends there.
    pub fn add(&mut self, edge: Rid, vertex: Rid) -> std::result::Result<(), SegmentFull> {
        let used = self.used();
        if used + ENTRY_SIZE > self.capacity() {
            return Err(SegmentFull(self.identity));
        }
        write_rid(&mut self.content, used, edge);
        write_rid(&mut self.content, used + RID_SIZE, vertex);
        self.set_used(used + ENTRY_SIZE);
        Ok(())
    }

    /// Removes the bytes `start..end` by shifting the following entries left.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless the range covers whole
    /// stored entries.
    pub fn remove_entry(&mut self, start: usize, end: usize) -> Result<()> {
        let used = self.used();
        if end <= start || (end - start) % ENTRY_SIZE != 0 || end > used {
            return Err(Error::InvalidArgument(format!(
                "cannot remove bytes {start}..{end} from edge segment {} (used {used})",
                self.identity
            )));
        }
        check_entry(start, used)?;

        self.content.copy_within(end..used, start);
        let new_used = used - (end - start);
        self.content[new_used..used].fill(0);
        self.set_used(new_used);
        Ok(())
    }

    /// Finishes the edit.
    #[must_use]
    pub fn freeze(self) -> EdgeSegment {
        EdgeSegment {
            identity: self.identity,
            content: self.content.freeze(),
        }
    }
}
