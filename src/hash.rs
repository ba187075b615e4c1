//! Zero-sized hash builder and the collection aliases built on it.
//!
//! Every internal map in the crate is keyed by property names, node paths or
//! pointer identities, none of which need HashDoS resistance, so they share one
//! fixed-seed foldhash builder.

use std::hash::BuildHasher;

pub use foldhash::fast::{FixedState, FoldHasher};

/// A zero-sized BuildHasher that uses foldhash with a fixed seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x517cc1b727220a95).build_hasher()
    }
}

/// `HashMap` with [`FastHashBuilder`].
pub type FastHashMap<K, V> = std::collections::HashMap<K, V, FastHashBuilder>;

/// Insertion-ordered map with [`FastHashBuilder`].
pub type FastIndexMap<K, V> = indexmap::IndexMap<K, V, FastHashBuilder>;
