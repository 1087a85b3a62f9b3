//! # trellis-common
//!
//! Foundation layer for Trellis: identifiers, runtime values, and errors.
//!
//! This crate provides the fundamental building blocks used by all other
//! Trellis crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (Rid, Value, EmbeddedDocument)
//! - [`utils`] - Utility functions and helpers (hashing, errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::{EmbeddedContent, EmbeddedDocument, Rid, Value};
pub use utils::error::{Error, Result, StorageError};
