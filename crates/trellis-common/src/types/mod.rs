//! Core type definitions for Trellis.
//!
//! This module contains the fundamental types shared by the codec and the
//! graph layer:
//! - Record identifiers ([`Rid`])
//! - Property values ([`Value`])
//! - Nested documents stored inline ([`EmbeddedDocument`])

mod embedded;
mod rid;
mod value;

pub use embedded::{EmbeddedContent, EmbeddedDocument};
pub use rid::Rid;
pub use value::Value;
