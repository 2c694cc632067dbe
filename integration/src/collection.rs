//! Fast collection aliases reused by the [`crate::bus::EventBus`], the risk
//! ledger, and the instance registry.

/// `IndexMap` using the FNV hasher — faster than the default `SipHash` for
/// the small string/enum keys used throughout (symbols, exchange names,
/// topics).
pub type FnvIndexMap<K, V> = indexmap::IndexMap<K, V, fnv::FnvBuildHasher>;

/// `IndexSet` counterpart of [`FnvIndexMap`].
pub type FnvIndexSet<T> = indexmap::IndexSet<T, fnv::FnvBuildHasher>;
