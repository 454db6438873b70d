#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod error;
mod hash_table;

/// A chained hash map with stable slots and a free list.
///
/// This module provides [`Mapping`], whose entries never move once placed, so
/// a slot index stays valid for a key until that key is removed.
pub mod mapping;

/// A chained hash map with packed storage and positional access.
///
/// This module provides [`IndexedMap`], which keeps its entries in `0..len`
/// and fills removal holes by moving the last entry.
pub mod indexed_map;

pub mod unique_ref_table;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod testing;

pub use error::IndexOutOfRange;
pub use hash_table::DEFAULT_CAPACITY;
pub use hash_table::DEFAULT_PRIME_CAPACITY;
pub use hash_table::DefaultHashBuilder;
#[cfg(feature = "stats")]
pub use hash_table::TableStats;
pub use indexed_map::IndexedMap;
pub use mapping::Mapping;
pub use unique_ref_table::IdLookup;
pub use unique_ref_table::NULL_ID;
pub use unique_ref_table::UniqueRefTable;
