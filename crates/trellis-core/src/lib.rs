//! # trellis-core
//!
//! Core layer for Trellis: the binary record codec and the edge storage it
//! points into.
//!
//! This crate turns records into self-describing byte buffers and back, and
//! stores graph adjacency as chains of fixed-capacity edge segments. It
//! depends only on `trellis-common`; persistence and schema are reached
//! through the traits in [`schema`] and [`graph`].
//!
//! ## Modules
//!
//! - [`storage`] - Byte cursor, dictionary, type tags, and value encryption
//! - [`serializer`] - Binary record codec (header table + content region)
//! - [`record`] - In-memory record wrappers (documents, vertices, edges)
//! - [`schema`] - Schema resolver contract consumed by the codec
//! - [`graph`] - Edge segments, adjacency iterator, and edge linked lists

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod graph;
pub mod record;
pub mod schema;
pub mod serializer;
pub mod storage;

// Re-export commonly used types
pub use graph::{
    Direction, EdgeLinkedList, EdgeSegment, EdgeStore, EdgeVertexIterator, MutableEdgeSegment,
    SegmentStore,
};
pub use record::{Document, Edge, LightEdge, Record, RecordType, Vertex};
pub use schema::SchemaResolver;
pub use serializer::BinarySerializer;
pub use storage::{
    AesGcmEncryption, BinaryType, DataEncryption, DateTimePrecision, Dictionary, EncryptionKey,
};
