//! Hash map aliases backed by a fast non-cryptographic hasher.

/// Hash map used for in-memory lookup tables.
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// Hash set used for in-memory lookup tables.
pub type FxHashSet<K> = hashbrown::HashSet<K, ahash::RandomState>;
