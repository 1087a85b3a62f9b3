//! Name dictionary.
//!
//! Maps property and type names to small integer ids so records store a
//! varint instead of the name. Ids are assigned in creation order starting
//! at zero and are never reused or renamed.

use std::sync::Arc;

use parking_lot::RwLock;
use trellis_common::utils::error::{Error, Result};
use trellis_common::utils::hash::FxHashMap;

#[derive(Debug, Default)]
struct DictionaryInner {
    ids: FxHashMap<Arc<str>, u32>,
    names: Vec<Arc<str>>,
}

/// Bidirectional, append-only name to id mapping.
///
/// Safe to share between threads. Concurrent creation of the same name
/// resolves to a single id that every caller observes.
#[derive(Debug, Default)]
pub struct Dictionary {
    inner: RwLock<DictionaryInner>,
}

impl Dictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a dictionary from names listed in id order.
    ///
    /// # Errors
    ///
    /// Returns corruption if a name appears twice.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = DictionaryInner::default();
        for name in names {
            let name: Arc<str> = name.as_ref().into();
            let id = inner.names.len() as u32;
            if inner.ids.insert(Arc::clone(&name), id).is_some() {
                return Err(Error::corruption(format!(
                    "duplicate dictionary entry '{name}'"
                )));
            }
            inner.names.push(name);
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Returns the id for `name`, creating it if absent.
    pub fn get_or_create_id(&self, name: &str) -> u32 {
        if let Some(&id) = self.inner.read().ids.get(name) {
            return id;
        }

        let mut inner = self.inner.write();
        // Another writer may have won the race between the two locks
        if let Some(&id) = inner.ids.get(name) {
            return id;
        }
        let id = inner.names.len() as u32;
        let name: Arc<str> = name.into();
        inner.ids.insert(Arc::clone(&name), id);
        inner.names.push(name);
        id
    }

    /// Looks up `name`, optionally creating it.
    pub fn get_id(&self, name: &str, create: bool) -> Option<u32> {
        if create {
            Some(self.get_or_create_id(name))
        } else {
            self.inner.read().ids.get(name).copied()
        }
    }

    /// Returns the name registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns corruption if `id` was never assigned: stored data refers to a
    /// name this dictionary does not know.
    pub fn get_name(&self, id: u32) -> Result<Arc<str>> {
        self.inner
            .read()
            .names
            .get(id as usize)
            .cloned()
            .ok_or_else(|| Error::corruption(format!("dictionary id {id} has no name")))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Returns true if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of all names in id order.
    #[must_use]
    pub fn names(&self) -> Vec<Arc<str>> {
        self.inner.read().names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_stable_ids() {
        let dict = Dictionary::new();
        let name = dict.get_or_create_id("name");
        let age = dict.get_or_create_id("age");

        assert_eq!(dict.get_or_create_id("name"), name);
        assert_ne!(name, age);
        assert_eq!(&*dict.get_name(name).unwrap(), "name");
        assert_eq!(&*dict.get_name(age).unwrap(), "age");
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_get_id_without_create() {
        let dict = Dictionary::new();
        assert_eq!(dict.get_id("missing", false), None);
        assert!(dict.is_empty());

        let id = dict.get_id("missing", true).unwrap();
        assert_eq!(dict.get_id("missing", false), Some(id));
    }

    #[test]
    fn test_unknown_id_is_corruption() {
        let dict = Dictionary::new();
        dict.get_or_create_id("x");
        assert!(matches!(
            dict.get_name(42),
            Err(Error::Storage(trellis_common::StorageError::Corruption(_)))
        ));
    }

    #[test]
    fn test_from_names() {
        let dict = Dictionary::from_names(["a", "b", "c"]).unwrap();
        assert_eq!(dict.get_id("c", false), Some(2));
        assert_eq!(dict.get_or_create_id("d"), 3);
        let names: Vec<String> = dict.names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);

        assert!(Dictionary::from_names(["a", "a"]).is_err());
    }

    #[test]
    fn test_concurrent_creation_yields_one_id() {
        let dict = Arc::new(Dictionary::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dict = Arc::clone(&dict);
                thread::spawn(move || dict.get_or_create_id("shared"))
            })
            .collect();
        let ids: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(dict.len(), 1);
    }
}
