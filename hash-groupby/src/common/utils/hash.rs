//! Utils for hash

use std::hash::Hash;

use crate::common::types::HashValue;

/// Default hash builder
pub type BuildHasherDefault = ahash::RandomState;

/// Constant build hasher default. Seeds are fixed: every table built by the crate maps
/// the same key to the same home slot
pub const BUILD_HASHER_DEFAULT: BuildHasherDefault = BuildHasherDefault::with_seeds(9, 7, 9, 8);

/// Hash the key with [`BUILD_HASHER_DEFAULT`]
#[inline]
pub fn hash_one<K: Hash>(key: K) -> HashValue {
    BUILD_HASHER_DEFAULT.hash_one(key)
}
