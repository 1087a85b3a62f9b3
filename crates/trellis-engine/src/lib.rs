//! # trellis-engine
//!
//! The main entry point for Trellis: an in-memory database that stores
//! every record through the binary codec and keeps graph adjacency in
//! edge segment chains.
//!
//! ## Modules
//!
//! - [`database`] - Database struct: records, edges, and traversal
//! - [`config`] - Configuration options
//! - [`catalog`] - Types, buckets, and property type hints

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod database;

pub use catalog::{Catalog, CatalogError, TypeDefinition, TypeKind};
pub use config::Config;
pub use database::Database;
