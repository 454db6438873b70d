use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::hash_table::Buckets;
use crate::hash_table::ChainLinks;
use crate::hash_table::DefaultHashBuilder;
use crate::hash_table::NIL;
use crate::hash_table::Sizing;
use crate::hash_table::hash32;

#[derive(Clone)]
struct Slot<K, V> {
    hash: u32,
    /// Chain successor while live, free-list successor while vacant.
    next: u32,
    entry: Option<(K, V)>,
}

impl<K, V> Slot<K, V> {
    #[inline(always)]
    fn key(&self) -> Option<&K> {
        self.entry.as_ref().map(|(k, _)| k)
    }
}

impl<K, V> ChainLinks for Vec<Slot<K, V>> {
    #[inline(always)]
    fn hash_at(&self, index: u32) -> u32 {
        self[index as usize].hash
    }

    #[inline(always)]
    fn next_at(&self, index: u32) -> u32 {
        self[index as usize].next
    }

    #[inline(always)]
    fn set_next(&mut self, index: u32, next: u32) {
        self[index as usize].next = next;
    }
}

/// A hash map whose entries live in slots that never move.
///
/// `Mapping<K, V, S>` keeps one slot per bucket. Collisions are resolved by
/// chaining slot indices, and removed slots are pushed onto a free list to be
/// reused by later inserts. Because entries are never relocated, the slot
/// index returned by [`find_slot`] identifies a key until that key is
/// removed, no matter how often the table grows.
///
/// The table grows (doubling its bucket count) when the number of entries
/// reaches the number of buckets.
///
/// # Examples
///
/// ```rust
/// use chain_hash::Mapping;
///
/// let mut map = Mapping::with_capacity(8);
/// map.insert("a", 1);
/// map.insert("b", 2);
/// map.insert("c", 3);
/// assert_eq!(map.len(), 3);
/// assert_eq!(map.get("b"), Some(&2));
///
/// assert_eq!(map.remove("b"), Some(2));
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.get("b"), None);
/// assert_eq!(map.get("a"), Some(&1));
/// ```
///
/// [`find_slot`]: Mapping::find_slot
#[derive(Clone)]
pub struct Mapping<K, V, S = DefaultHashBuilder> {
    buckets: Buckets,
    slots: Vec<Slot<K, V>>,
    free_head: u32,
    len: usize,
    hash_builder: S,
}

impl<K, V, S> Debug for Mapping<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Mapping<K, V, S> {
    /// Returns the number of elements in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of elements the map can hold before it grows.
    ///
    /// This is also the number of buckets and the number of slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let map: Mapping<i32, i32> = Mapping::with_capacity(100);
    /// assert_eq!(map.capacity(), 128);
    /// ```
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the key and value stored in slot `index`, or `None` if the
    /// slot is out of bounds or vacant.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert("k", 7);
    /// let slot = map.find_slot("k").unwrap();
    /// assert_eq!(map.slot(slot), Some((&"k", &7)));
    ///
    /// map.remove("k");
    /// assert_eq!(map.slot(slot), None);
    /// ```
    pub fn slot(&self, index: usize) -> Option<(&K, &V)> {
        self.slots
            .get(index)?
            .entry
            .as_ref()
            .map(|(k, v)| (k, v))
    }

    /// Returns the key and a mutable reference to the value stored in slot
    /// `index`, or `None` if the slot is out of bounds or vacant.
    pub fn slot_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        self.slots
            .get_mut(index)?
            .entry
            .as_mut()
            .map(|(k, v)| (&*k, v))
    }

    /// Removes every element, keeping the allocated capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert(1, "a");
    /// let capacity = map.capacity();
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.entry = None;
        }
        self.buckets.clear();
        self.free_head = NIL;
        self.link_virgin(0);
        self.len = 0;
    }

    /// Returns an iterator over the key-value pairs of the map, in slot
    /// order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let mut pairs: Vec<_> = map.iter().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [(&1, &"a"), (&2, &"b")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.slots.iter(),
            remaining: self.len,
        }
    }

    /// Returns an iterator over the key-value pairs of the map with mutable
    /// references to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.slots.iter_mut(),
            remaining: self.len,
        }
    }

    /// Returns an iterator over the keys of the map.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values of the map.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Appends vacant slots until there is one per bucket, linking the new
    /// run `start, start + 1, ...` in front of the current free list.
    fn link_virgin(&mut self, start: usize) {
        let end = self.buckets.len();
        self.slots.reserve(end.saturating_sub(self.slots.len()));
        for index in start..end {
            let next = if index + 1 == end {
                self.free_head
            } else {
                (index + 1) as u32
            };
            if index < self.slots.len() {
                self.slots[index].next = next;
            } else {
                self.slots.push(Slot {
                    hash: 0,
                    next,
                    entry: None,
                });
            }
        }
        if start < end {
            self.free_head = start as u32;
        }
    }

    fn grow(&mut self) {
        let start = self.slots.len();
        self.buckets.grow(&mut self.slots);
        self.link_virgin(start);
    }

    #[inline]
    fn entry_mut(&mut self, index: u32) -> &mut (K, V) {
        match self.slots[index as usize].entry.as_mut() {
            Some(entry) => entry,
            None => unreachable!("linked slot {index} is vacant"),
        }
    }

    /// Returns chain and collision statistics for the map.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> crate::TableStats {
        self.buckets.stats(&self.slots, self.len)
    }

    /// Resets the collision counter reported by [`stats`](Self::stats).
    #[cfg(feature = "stats")]
    pub fn reset_collisions(&self) {
        self.buckets.reset_collisions();
    }
}

impl<K, V, S> Mapping<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map which will use the given hasher builder.
    ///
    /// The map does not allocate until the first insertion.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates an empty map with at least `capacity` slots, using the given
    /// hasher builder. The capacity is rounded up to a power of two.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let mut map = Self {
            buckets: Buckets::with_capacity(Sizing::PowerOfTwo, capacity),
            slots: Vec::new(),
            free_head: NIL,
            len: 0,
            hash_builder,
        };
        map.link_virgin(0);
        map
    }

    #[inline]
    fn probe<Q>(&self, hash: u32, key: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.buckets
            .find(&self.slots, hash, |i| {
                self.slots[i].key().is_some_and(|k| k.borrow() == key)
            })
            .map(|probe| probe.index)
    }

    /// Claims a slot from the free list for a key known to be absent.
    fn insert_new(&mut self, hash: u32, key: K, value: V) -> u32 {
        if self.buckets.is_full(self.len) {
            self.grow();
        }

        let index = self.free_head;
        debug_assert_ne!(index, NIL, "free list exhausted below capacity");
        let slot = &mut self.slots[index as usize];
        self.free_head = slot.next;
        slot.hash = hash;
        slot.entry = Some((key, value));
        self.buckets.link(&mut self.slots, index);
        self.len += 1;
        index
    }

    /// Returns the slot index holding `key`, if present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert("a", 1);
    /// let slot = map.find_slot("a").unwrap();
    ///
    /// // Slots are stable across growth.
    /// for i in 0..100 {
    ///     map.insert(if i % 2 == 0 { "even" } else { "odd" }, i);
    /// }
    /// assert_eq!(map.find_slot("a"), Some(slot));
    /// assert_eq!(map.find_slot("z"), None);
    /// ```
    pub fn find_slot<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash32(&self.hash_builder, key);
        self.probe(hash, key).map(|index| index as usize)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the key was already present its value is overwritten in place and
    /// the old value is returned; the entry keeps its slot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = hash32(&self.hash_builder, &key);
        match self.probe(hash, &key) {
            Some(index) => Some(core::mem::replace(&mut self.entry_mut(index).1, value)),
            None => {
                self.insert_new(hash, key, value);
                None
            }
        }
    }

    /// Returns a mutable reference to the value for `key`, inserting the
    /// result of `default` first if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut counts: Mapping<&str, u32> = Mapping::new();
    /// for word in ["a", "b", "a"] {
    ///     *counts.get_or_insert_with(word, || 0) += 1;
    /// }
    /// assert_eq!(counts.get("a"), Some(&2));
    /// assert_eq!(counts.get("b"), Some(&1));
    /// ```
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = hash32(&self.hash_builder, &key);
        let index = match self.probe(hash, &key) {
            Some(index) => index,
            None => self.insert_new(hash, key, default()),
        };
        &mut self.entry_mut(index).1
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value corresponding to the key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.find_slot(key)?;
        self.slot(index)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert(1, "a");
    /// if let Some(x) = map.get_mut(&1) {
    ///     *x = "b";
    /// }
    /// assert_eq!(map.get(&1), Some(&"b"));
    /// ```
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.find_slot(key)?;
        self.slot_mut(index).map(|(_, v)| v)
    }

    /// Returns `true` if the map contains a value for the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_slot(key).is_some()
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// The vacated slot goes to the front of the free list and is the next
    /// one reused. Removing an absent key changes nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::Mapping;
    ///
    /// let mut map = Mapping::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was present.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash32(&self.hash_builder, key);
        let probe = self.buckets.find(&self.slots, hash, |i| {
            self.slots[i].key().is_some_and(|k| k.borrow() == key)
        })?;

        self.buckets.unlink(&mut self.slots, probe);
        let slot = &mut self.slots[probe.index as usize];
        slot.next = self.free_head;
        self.free_head = probe.index;
        self.len -= 1;
        slot.entry.take()
    }

    /// Reserves capacity for at least `additional` more elements.
    pub fn reserve(&mut self, additional: usize) {
        let wanted = self.len.saturating_add(additional);
        while self.buckets.len() < wanted {
            self.grow();
        }
    }
}

#[cfg(any(feature = "foldhash", feature = "std"))]
impl<K, V> Mapping<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    /// Creates an empty map using the default hasher builder.
    ///
    /// The map does not allocate until the first insertion.
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates an empty map with at least `capacity` slots using the default
    /// hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S> Default for Mapping<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> Extend<(K, V)> for Mapping<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for Mapping<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a Mapping<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut Mapping<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// An iterator over the key-value pairs of a [`Mapping`].
pub struct Iter<'a, K, V> {
    inner: core::slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        for slot in self.inner.by_ref() {
            if let Some((k, v)) = &slot.entry {
                self.remaining -= 1;
                return Some((k, v));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// A mutable iterator over the key-value pairs of a [`Mapping`].
pub struct IterMut<'a, K, V> {
    inner: core::slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        for slot in self.inner.by_ref() {
            if let Some((k, v)) = &mut slot.entry {
                self.remaining -= 1;
                return Some((&*k, v));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a [`Mapping`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An iterator over the values of a [`Mapping`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
impl<K, V, S> Mapping<K, V, S> {
    /// Checks chain integrity, free-list shape and slot accounting.
    pub(crate) fn assert_invariants(&self) {
        use alloc::collections::BTreeSet;

        assert_eq!(self.slots.len(), self.buckets.len());

        let live: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].entry.is_some())
            .collect();
        assert_eq!(live.len(), self.len, "len disagrees with occupied slots");
        self.buckets.assert_chains(&self.slots, live.iter().copied());

        let mut free = BTreeSet::new();
        let mut cursor = self.free_head;
        while cursor != NIL {
            let slot = &self.slots[cursor as usize];
            assert!(slot.entry.is_none(), "free list holds live slot {cursor}");
            assert!(free.insert(cursor), "free list revisits slot {cursor}");
            cursor = slot.next;
        }
        assert_eq!(
            free.len() + self.len,
            self.slots.len(),
            "some vacant slot is unreachable from the free list"
        );
    }
}
