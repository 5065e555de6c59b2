//! Shared collection aliases.
//!
//! Maps keyed by interned symbols use FxHash; ordered tables (globals,
//! symbol names) use `IndexMap` with the same hasher so iteration order is
//! the insertion order.

pub use rustc_hash::FxHashMap;

pub type IndexMap<K, V> =
    indexmap::IndexMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: core::hash::Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}
