//! Identity-keyed ID assignment for graph traversals.
//!
//! [`UniqueRefTable`] hands out one dense ID per distinct referent, which lets
//! a serializer emit shared or cyclic structures once and refer back to them.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::marker::PhantomData;

use crate::hash_table::Buckets;
use crate::hash_table::Links;
use crate::hash_table::Sizing;

/// Returned by [`UniqueRefTable::get_id`] for a null reference.
pub const NULL_ID: i32 = i32::MIN;

/// Largest ID the table hands out. Its complement stays clear of
/// [`NULL_ID`].
const MAX_ID: i32 = i32::MAX - 1;

/// Assigns dense integer IDs to references by identity.
///
/// The first time a referent is seen it is appended and gets the next ID
/// (`0`, `1`, `2`, ...). Every later sighting of the same referent returns
/// the bitwise complement `!id`, which is always negative, so a caller can
/// tell from one integer whether to emit the object or a back-reference.
/// Two distinct objects that compare equal still get distinct IDs: only the
/// address matters.
///
/// The table borrows everything it has seen for `'a` and cannot be cloned
/// or sent to another thread, so it lives exactly as long as one traversal.
/// Referents must not be zero-sized, since distinct zero-sized values may
/// share an address.
///
/// # Examples
///
/// ```rust
/// use chain_hash::IdLookup;
/// use chain_hash::NULL_ID;
/// use chain_hash::UniqueRefTable;
///
/// let root = String::from("root");
/// let leaf = String::from("leaf");
///
/// let mut seen = UniqueRefTable::new();
/// assert_eq!(seen.get_id(Some(&root)), 0);
/// assert_eq!(seen.get_id(Some(&leaf)), 1);
/// assert_eq!(seen.get_id(Some(&root)), !0);
/// assert_eq!(seen.get_id(None), NULL_ID);
///
/// assert_eq!(IdLookup::from_raw(!0), IdLookup::Seen(0));
/// assert_eq!(seen.get(0), Some(&root));
/// ```
pub struct UniqueRefTable<'a, T: ?Sized> {
    buckets: Buckets,
    links: Links,
    refs: Vec<&'a T>,
    identity_hash: fn(usize) -> u32,
    _not_send: PhantomData<*const ()>,
}

/// Decoded form of an ID returned by [`UniqueRefTable::get_id`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdLookup {
    /// The referent was appended with this ID.
    New(usize),
    /// The referent had already been assigned this ID.
    Seen(usize),
    /// The reference was null.
    Null,
}

impl IdLookup {
    /// Decodes a raw ID.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            NULL_ID => IdLookup::Null,
            id if id < 0 => IdLookup::Seen(!id as usize),
            id => IdLookup::New(id as usize),
        }
    }
}

#[inline]
fn address_of<T: ?Sized>(value: &T) -> usize {
    (value as *const T).cast::<()>() as usize
}

// Addresses are aligned, so the low bits carry little information on their
// own. Multiply and fold so they reach the bits `hash % len` looks at.
#[inline]
fn address_hash(address: usize) -> u32 {
    let mixed = (address as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (mixed ^ (mixed >> 32)) as u32
}

#[cold]
#[inline(never)]
fn id_overflow() -> ! {
    panic!("unique reference id overflow")
}

/// The ID the entry appended at position `len` would get.
#[inline]
fn next_id(len: usize) -> i32 {
    match i32::try_from(len) {
        Ok(id) if id <= MAX_ID => id,
        _ => id_overflow(),
    }
}

impl<'a, T: ?Sized> UniqueRefTable<'a, T> {
    /// Creates an empty table. No buckets are allocated until the first
    /// reference is added.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty table with at least `capacity` buckets, rounded up
    /// to a prime.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_identity_hash(capacity, address_hash)
    }

    fn with_identity_hash(capacity: usize, identity_hash: fn(usize) -> u32) -> Self {
        let buckets = Buckets::with_capacity(Sizing::Prime, capacity);
        let reserved = buckets.len();
        Self {
            buckets,
            links: Links::with_capacity(reserved),
            refs: Vec::with_capacity(reserved),
            identity_hash,
            _not_send: PhantomData,
        }
    }

    /// Number of distinct referents seen.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns `true` if no referent has been seen.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Current bucket count.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn find(&self, hash: u32, value: &T) -> Option<usize> {
        self.buckets
            .find(&self.links, hash, |i| core::ptr::eq(self.refs[i], value))
            .map(|probe| probe.index as usize)
    }

    /// Returns the ID for `value`.
    ///
    /// * `None` returns [`NULL_ID`] and leaves the table untouched.
    /// * A referent seen before returns `!id` (negative).
    /// * A new referent is appended and its `id` (non-negative) returned.
    ///
    /// # Panics
    ///
    /// Panics if the table already holds `i32::MAX` referents.
    pub fn get_id(&mut self, value: Option<&'a T>) -> i32 {
        let Some(value) = value else {
            return NULL_ID;
        };

        let hash = (self.identity_hash)(address_of(value));
        if let Some(index) = self.find(hash, value) {
            return !(index as i32);
        }

        let id = next_id(self.refs.len());
        if self.buckets.is_full(self.refs.len()) {
            self.buckets.grow(&mut self.links);
            let additional = self.buckets.len() - self.refs.len();
            self.refs.reserve(additional);
            self.links.reserve(additional);
        }
        let index = self.links.push(hash);
        self.refs.push(value);
        self.buckets.link(&mut self.links, index);
        id
    }

    /// Returns the ID already assigned to `value`, without adding it.
    pub fn id_of(&self, value: &T) -> Option<usize> {
        let hash = (self.identity_hash)(address_of(value));
        self.find(hash, value)
    }

    /// Returns `true` if this exact referent has been seen.
    pub fn contains(&self, value: &T) -> bool {
        self.id_of(value).is_some()
    }

    /// Returns the referent that was assigned `id`.
    pub fn get(&self, id: usize) -> Option<&'a T> {
        self.refs.get(id).copied()
    }

    /// Iterates over the seen referents in ID order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a T> + '_ {
        self.refs.iter().copied()
    }

    /// Returns chain and collision statistics for the table.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> crate::TableStats {
        self.buckets.stats(&self.links, self.refs.len())
    }
}

impl<T: ?Sized> Default for UniqueRefTable<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Debug> Debug for UniqueRefTable<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.refs.iter().enumerate()).finish()
    }
}

#[cfg(test)]
impl<T: ?Sized> UniqueRefTable<'_, T> {
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.refs.len(), self.links.len());
        assert!(self.refs.len() <= self.buckets.len());
        self.buckets.assert_chains(&self.links, 0..self.refs.len());
        for (id, &value) in self.refs.iter().enumerate() {
            assert_eq!(self.id_of(value), Some(id));
        }
    }
}
