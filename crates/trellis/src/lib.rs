//! # Trellis
//!
//! An embedded multi-model storage core. Documents, vertices, and edges are
//! stored as compact self-describing byte buffers, and every vertex keeps
//! its edges in chains of fixed-size segments so traversals never touch an
//! index.
//!
//! Start with [`Database`]: create types, save records, connect vertices,
//! and walk their edges.
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::{Database, Direction, Value};
//!
//! let db = Database::new();
//! db.create_vertex_type("Person")?;
//! db.create_edge_type("Knows")?;
//!
//! let mut alice = db.new_vertex("Person")?;
//! alice.set("name", "Alice");
//! let alice = db.save_vertex(&mut alice)?;
//!
//! let mut bob = db.new_vertex("Person")?;
//! bob.set("name", "Bob");
//! let bob = db.save_vertex(&mut bob)?;
//!
//! db.new_edge("Knows", alice, bob, [("since", Value::from(2021))])?;
//!
//! for pair in db.edges(alice, Direction::Out)? {
//!     let (edge, friend) = pair?;
//!     assert_eq!(db.property(friend, "name")?, Some(Value::from("Bob")));
//!     assert_eq!(db.property(edge, "since")?, Some(Value::from(2021)));
//! }
//! # Ok::<(), trellis::Error>(())
//! ```

// Re-export the main database API
pub use trellis_engine::{Catalog, CatalogError, Config, Database, TypeDefinition, TypeKind};

// Re-export core types - you'll need these for records and traversal
pub use trellis_common::types::{EmbeddedContent, EmbeddedDocument, Rid, Value};
pub use trellis_common::utils::error::{Error, Result};
pub use trellis_core::graph::{Direction, EdgeVertexIterator};
pub use trellis_core::record::{Document, Edge, LightEdge, Record, Vertex};
pub use trellis_core::serializer::BinarySerializer;
pub use trellis_core::storage::{
    AesGcmEncryption, BinaryType, DataEncryption, DateTimePrecision, Dictionary, EncryptionKey,
};
