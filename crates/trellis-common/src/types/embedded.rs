//! Documents stored inline inside another record.

use bytes::Bytes;
use indexmap::IndexMap;

use super::Value;

/// Content of an embedded document.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedContent {
    /// Materialized properties, in insertion order.
    Properties(IndexMap<String, Value>),
    /// Encoded header and content, decoded on demand.
    Serialized(Bytes),
}

/// A nested document with a type but no identity of its own.
///
/// Decoding a record never materializes its embedded documents eagerly: the
/// decoder hands back a [`EmbeddedContent::Serialized`] slice of the parent
/// buffer and the codec decodes fields from it when they are read.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedDocument {
    type_name: String,
    content: EmbeddedContent,
}

impl EmbeddedDocument {
    /// Creates an empty embedded document of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self::with_properties(type_name, IndexMap::new())
    }

    /// Creates an embedded document from materialized properties.
    pub fn with_properties(type_name: impl Into<String>, properties: IndexMap<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            content: EmbeddedContent::Properties(properties),
        }
    }

    /// Wraps an encoded buffer without decoding it.
    pub fn from_serialized(type_name: impl Into<String>, buffer: Bytes) -> Self {
        Self {
            type_name: type_name.into(),
            content: EmbeddedContent::Serialized(buffer),
        }
    }

    /// Returns the type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the content, loaded or not.
    #[must_use]
    pub fn content(&self) -> &EmbeddedContent {
        &self.content
    }

    /// Returns true if the properties are materialized.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.content, EmbeddedContent::Properties(_))
    }

    /// Returns the materialized properties, if loaded.
    #[must_use]
    pub fn properties(&self) -> Option<&IndexMap<String, Value>> {
        match &self.content {
            EmbeddedContent::Properties(properties) => Some(properties),
            EmbeddedContent::Serialized(_) => None,
        }
    }

    /// Replaces the content with materialized properties.
    pub fn set_properties(&mut self, properties: IndexMap<String, Value>) {
        self.content = EmbeddedContent::Properties(properties);
    }

    /// Sets a property on a loaded document.
    ///
    /// Returns `false` when the document is still serialized; load it through
    /// the codec first.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        match &mut self.content {
            EmbeddedContent::Properties(properties) => {
                properties.insert(name.into(), value.into());
                true
            }
            EmbeddedContent::Serialized(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_on_loaded_document() {
        let mut doc = EmbeddedDocument::new("Address");
        assert!(doc.is_loaded());
        assert!(doc.set("city", "Rome"));
        assert_eq!(
            doc.properties().and_then(|p| p.get("city")),
            Some(&Value::from("Rome"))
        );
    }

    #[test]
    fn test_serialized_document_is_read_only() {
        let mut doc = EmbeddedDocument::from_serialized("Address", Bytes::from_static(&[4, 0]));
        assert!(!doc.is_loaded());
        assert!(!doc.set("city", "Rome"));
        assert!(doc.properties().is_none());
        assert_eq!(doc.type_name(), "Address");
    }
}
