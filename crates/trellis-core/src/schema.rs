//! Schema contract consumed by the codec and the adjacency iterator.
//!
//! The core never owns a schema. It asks a [`SchemaResolver`] for the two
//! facts it needs: which type owns a bucket, and which tag a declared
//! property should be stored with.

use std::sync::Arc;

use crate::storage::BinaryType;

/// Read-only view of the type system.
pub trait SchemaResolver: Send + Sync {
    /// Returns the name of the type that owns `bucket_id`.
    fn type_by_bucket(&self, bucket_id: i32) -> Option<Arc<str>>;

    /// Returns the declared storage tag of `property` on `type_name`, if any.
    fn property_type(&self, type_name: &str, property: &str) -> Option<BinaryType>;
}
