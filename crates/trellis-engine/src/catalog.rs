//! Schema catalog.
//!
//! Each type owns exactly one bucket; the catalog maps buckets back to
//! types for the codec and the adjacency iterator, and keeps the declared
//! storage tag of each property.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use trellis_common::utils::error::Error;
use trellis_common::utils::hash::FxHashMap;
use trellis_core::schema::SchemaResolver;
use trellis_core::storage::{BinaryType, Dictionary};

/// Bucket reserved for edge segments.
pub const SEGMENT_BUCKET: i32 = 0;

/// What kind of records a type holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Plain documents.
    Document,
    /// Vertices with adjacency lists.
    Vertex,
    /// Edges between vertices.
    Edge,
}

/// Catalog failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A type with this name already exists.
    #[error("type '{0}' already exists")]
    TypeExists(String),
    /// No type with this name.
    #[error("type '{0}' not found")]
    TypeNotFound(String),
    /// The type exists but holds other records.
    #[error("type '{name}' is a {found:?} type, expected {expected:?}")]
    WrongKind {
        /// Type name.
        name: String,
        /// Kind the caller needed.
        expected: TypeKind,
        /// Kind the type has.
        found: TypeKind,
    },
    /// The tag cannot hold property values.
    #[error("'{0}' cannot be declared as a property type")]
    InvalidPropertyType(BinaryType),
}

impl From<CatalogError> for Error {
    fn from(e: CatalogError) -> Self {
        Error::Schema(e.to_string())
    }
}

/// A registered type.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    name: Arc<str>,
    kind: TypeKind,
    bucket_id: i32,
    properties: FxHashMap<String, BinaryType>,
}

impl TypeDefinition {
    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Returns the bucket holding the type's records.
    #[must_use]
    pub fn bucket_id(&self) -> i32 {
        self.bucket_id
    }

    /// Returns the declared tag of a property.
    #[must_use]
    pub fn property_type(&self, property: &str) -> Option<BinaryType> {
        self.properties.get(property).copied()
    }
}

#[derive(Default)]
struct CatalogInner {
    types: FxHashMap<Arc<str>, TypeDefinition>,
    buckets: FxHashMap<i32, Arc<str>>,
}

/// Registry of types, buckets, and property hints.
pub struct Catalog {
    dictionary: Arc<Dictionary>,
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    /// Creates an empty catalog that registers type names in `dictionary`.
    #[must_use]
    pub fn new(dictionary: Arc<Dictionary>) -> Self {
        Self {
            dictionary,
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    /// Registers a type and assigns it the next free bucket.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TypeExists`] if the name is taken.
    pub fn create_type(&self, name: &str, kind: TypeKind) -> Result<i32, CatalogError> {
        let mut inner = self.inner.write();
        if inner.types.contains_key(name) {
            return Err(CatalogError::TypeExists(name.to_string()));
        }
        let bucket_id = SEGMENT_BUCKET + 1 + inner.types.len() as i32;
        let name: Arc<str> = Arc::from(name);
        // Embedded documents store their type as a dictionary id
        self.dictionary.get_or_create_id(&name);
        inner.buckets.insert(bucket_id, Arc::clone(&name));
        inner.types.insert(
            Arc::clone(&name),
            TypeDefinition {
                name,
                kind,
                bucket_id,
                properties: FxHashMap::default(),
            },
        );
        Ok(bucket_id)
    }

    /// Declares the storage tag of a property.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TypeNotFound`] for an unknown type, or
    /// [`CatalogError::InvalidPropertyType`] for tags that only exist on the
    /// wire (null, compressed string, compressed RID).
    pub fn set_property_type(
        &self,
        type_name: &str,
        property: &str,
        tag: BinaryType,
    ) -> Result<(), CatalogError> {
        if matches!(
            tag,
            BinaryType::Null | BinaryType::CompressedString | BinaryType::CompressedRid
        ) {
            return Err(CatalogError::InvalidPropertyType(tag));
        }
        let mut inner = self.inner.write();
        let definition = inner
            .types
            .get_mut(type_name)
            .ok_or_else(|| CatalogError::TypeNotFound(type_name.to_string()))?;
        definition.properties.insert(property.to_string(), tag);
        Ok(())
    }

    /// Returns a copy of a type definition.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<TypeDefinition> {
        self.inner.read().types.get(name).cloned()
    }

    /// Returns the bucket of `name`, checking its kind.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TypeNotFound`] or [`CatalogError::WrongKind`].
    pub fn require(&self, name: &str, kind: TypeKind) -> Result<i32, CatalogError> {
        let inner = self.inner.read();
        let definition = inner
            .types
            .get(name)
            .ok_or_else(|| CatalogError::TypeNotFound(name.to_string()))?;
        if definition.kind != kind {
            return Err(CatalogError::WrongKind {
                name: name.to_string(),
                expected: kind,
                found: definition.kind,
            });
        }
        Ok(definition.bucket_id)
    }

    /// Returns the kind of the type owning `bucket_id`.
    #[must_use]
    pub fn kind_of_bucket(&self, bucket_id: i32) -> Option<TypeKind> {
        let inner = self.inner.read();
        let name = inner.buckets.get(&bucket_id)?;
        inner.types.get(name).map(|t| t.kind)
    }

    /// Returns the number of types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.inner.read().types.len()
    }

    /// Returns the type names, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read()
            .types
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort();
        names
    }
}

impl SchemaResolver for Catalog {
    fn type_by_bucket(&self, bucket_id: i32) -> Option<Arc<str>> {
        self.inner.read().buckets.get(&bucket_id).cloned()
    }

    fn property_type(&self, type_name: &str, property: &str) -> Option<BinaryType> {
        self.inner
            .read()
            .types
            .get(type_name)
            .and_then(|t| t.property_type(property))
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("types", &self.type_names())
            .finish()
    }
}
