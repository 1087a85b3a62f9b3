//! Storage primitives shared by the record codec and the edge segments.
//!
//! - [`binary`] - Checked byte cursor and varint writers
//! - [`dictionary`] - Name to id dictionary used to compress strings
//! - [`types`] - The closed registry of binary type tags
//! - [`encryption`] - Pluggable per-value encryption
//!
//! # Varints
//!
//! | Helper | Encoding |
//! |--------|----------|
//! | `put_unsigned_number` | LEB128, 7 bits per byte |
//! | `put_number` | zigzag, then LEB128 |
//! | `put_byte_array` | unsigned length, then raw bytes |
//! | `put_string` | `put_byte_array` of the UTF-8 form |

pub mod binary;
pub mod dictionary;
pub mod encryption;
pub mod types;

// Re-export commonly used types
pub use binary::{
    BinaryReader, BinaryWriter, RID_SIZE, unsigned_number_size, zigzag_decode, zigzag_encode,
};
pub use dictionary::Dictionary;
pub use encryption::{AesGcmEncryption, DataEncryption, EncryptionKey};
pub use types::{BinaryType, DateTimePrecision};
