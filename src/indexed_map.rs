use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::error::IndexOutOfRange;
use crate::hash_table::Buckets;
use crate::hash_table::DefaultHashBuilder;
use crate::hash_table::Links;
use crate::hash_table::Probe;
use crate::hash_table::Sizing;
use crate::hash_table::hash32;

/// A hash map whose entries are always packed at positions `0..len`.
///
/// Keys, values and chain links are kept in parallel arrays. Removal moves
/// the last entry into the vacated position (swap-delete), so live entries
/// never leave gaps and can be visited by position with [`at`] or by slice
/// with [`keys`]/[`values`], without walking any chain.
///
/// Positions are therefore *not* stable: removing a key may relocate the
/// entry that was last. References returned by the accessors borrow the map,
/// so growth or removal cannot invalidate them while they are held.
///
/// # Examples
///
/// ```rust
/// use chain_hash::IndexedMap;
///
/// let mut map = IndexedMap::new();
/// map.insert("a", 1);
/// map.insert("b", 2);
/// map.insert("c", 3);
///
/// map.remove("a");
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.at(0), (&"c", &mut 3));
/// assert_eq!(map.at(1), (&"b", &mut 2));
/// ```
///
/// [`at`]: IndexedMap::at
/// [`keys`]: IndexedMap::keys
/// [`values`]: IndexedMap::values
#[derive(Clone)]
pub struct IndexedMap<K, V, S = DefaultHashBuilder> {
    buckets: Buckets,
    links: Links,
    keys: Vec<K>,
    values: Vec<V>,
    hash_builder: S,
}

impl<K, V, S> Debug for IndexedMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> IndexedMap<K, V, S> {
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the number of entries the map can hold before it grows.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns a reference to the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// The live keys, in position order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// The live values, in position order.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// The live values, in position order, mutably.
    pub fn values_mut(&mut self) -> &mut [V] {
        &mut self.values
    }

    /// Returns the entry at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::IndexedMap;
    ///
    /// let mut map = IndexedMap::new();
    /// map.insert("x", 10);
    /// map.insert("y", 20);
    ///
    /// for i in 0..map.len() {
    ///     let (_, value) = map.at(i);
    ///     *value += 1;
    /// }
    /// assert_eq!(map.values(), &[11, 21]);
    /// ```
    pub fn at(&mut self, index: usize) -> (&K, &mut V) {
        match self.try_at(index) {
            Ok(entry) => entry,
            Err(err) => panic!("{err}"),
        }
    }

    /// Returns the entry at `index`, or an error if `index >= self.len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::IndexOutOfRange;
    /// use chain_hash::IndexedMap;
    ///
    /// let mut map = IndexedMap::new();
    /// map.insert('a', 1);
    /// assert!(map.try_at(0).is_ok());
    /// assert_eq!(map.try_at(1), Err(IndexOutOfRange { index: 1, len: 1 }));
    /// ```
    pub fn try_at(&mut self, index: usize) -> Result<(&K, &mut V), IndexOutOfRange> {
        let len = self.keys.len();
        if index >= len {
            return Err(IndexOutOfRange { index, len });
        }
        Ok((&self.keys[index], &mut self.values[index]))
    }

    /// Returns the entry at `index`, or `None` if out of range.
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        Some((self.keys.get(index)?, &self.values[index]))
    }

    /// Returns an iterator over the entries in position order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.keys.iter().zip(self.values.iter()),
        }
    }

    /// Returns an iterator over the entries in position order, with mutable
    /// references to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.keys.iter().zip(self.values.iter_mut()),
        }
    }

    /// Removes every entry, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.links.clear();
        self.buckets.clear();
    }

    fn grow(&mut self) {
        self.buckets.grow(&mut self.links);
        let additional = self.buckets.len() - self.keys.len();
        self.keys.reserve(additional);
        self.values.reserve(additional);
        self.links.reserve(additional);
    }

    fn push_new(&mut self, hash: u32, key: K, value: V) -> usize {
        if self.buckets.is_full(self.keys.len()) {
            self.grow();
        }

        let index = self.links.push(hash);
        self.keys.push(key);
        self.values.push(value);
        self.buckets.link(&mut self.links, index);
        index as usize
    }

    /// Unlinks the probed entry, then moves the last entry into its position
    /// and points the one chain edge that referenced the last entry at the
    /// new position.
    fn swap_delete(&mut self, probe: Probe) -> (K, V) {
        self.buckets.unlink(&mut self.links, probe);

        let last = (self.keys.len() - 1) as u32;
        if probe.index != last {
            self.buckets.redirect(&mut self.links, last, probe.index);
        }

        let index = probe.index as usize;
        self.links.swap_remove(probe.index);
        let key = self.keys.swap_remove(index);
        let value = self.values.swap_remove(index);
        (key, value)
    }

    /// Returns chain and collision statistics for the map.
    ///
    /// Only available with the `stats` feature.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> crate::TableStats {
        self.buckets.stats(&self.links, self.keys.len())
    }

    /// Resets the collision counter reported by [`stats`](Self::stats).
    #[cfg(feature = "stats")]
    pub fn reset_collisions(&self) {
        self.buckets.reset_collisions();
    }
}

impl<K, V, S> IndexedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates an empty map which will use the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates an empty map with room for at least `capacity` entries, using
    /// the given hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let buckets = Buckets::with_capacity(Sizing::PowerOfTwo, capacity);
        let reserved = buckets.len();
        Self {
            buckets,
            links: Links::with_capacity(reserved),
            keys: Vec::with_capacity(reserved),
            values: Vec::with_capacity(reserved),
            hash_builder,
        }
    }

    #[inline]
    fn probe<Q>(&self, hash: u32, key: &Q) -> Option<Probe>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.buckets
            .find(&self.links, hash, |i| self.keys[i].borrow() == key)
    }

    /// Returns the position of `key`, if present.
    pub fn get_index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash32(&self.hash_builder, key);
        self.probe(hash, key).map(|probe| probe.index as usize)
    }

    /// Returns a reference to the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.get_index_of(key)?;
        Some(&self.values[index])
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.get_index_of(key)?;
        Some(&mut self.values[index])
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_index_of(key).is_some()
    }

    /// Inserts a key-value pair.
    ///
    /// An existing key keeps its position and has its value replaced, and
    /// the old value is returned. A new key is appended at position `len`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = hash32(&self.hash_builder, &key);
        match self.probe(hash, &key) {
            Some(probe) => Some(core::mem::replace(
                &mut self.values[probe.index as usize],
                value,
            )),
            None => {
                self.push_new(hash, key, value);
                None
            }
        }
    }

    /// Returns a mutable reference to the value for `key`, appending a
    /// default value first if the key is absent.
    ///
    /// This is an upsert: looking up a missing key this way creates it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::IndexedMap;
    ///
    /// let mut totals: IndexedMap<&str, u32> = IndexedMap::new();
    /// *totals.get_or_insert("apples") += 3;
    /// *totals.get_or_insert("pears") += 1;
    /// *totals.get_or_insert("apples") += 2;
    ///
    /// assert_eq!(totals.keys(), &["apples", "pears"]);
    /// assert_eq!(totals.values(), &[5, 1]);
    ///
    /// // Reading through the upsert path materializes the key.
    /// let _ = totals.get_or_insert("plums");
    /// assert_eq!(totals.len(), 3);
    /// ```
    pub fn get_or_insert(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Returns a mutable reference to the value for `key`, appending the
    /// result of `default` first if the key is absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = hash32(&self.hash_builder, &key);
        let index = match self.probe(hash, &key) {
            Some(probe) => probe.index as usize,
            None => self.push_new(hash, key, default()),
        };
        &mut self.values[index]
    }

    /// Removes `key` and returns its value.
    ///
    /// The last entry is moved into the vacated position, so after removing
    /// the entry at position `i` the entry formerly at `len - 1` is found at
    /// `i`. Every other position is unaffected. Removing an absent key
    /// changes nothing.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes `key` and returns the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = hash32(&self.hash_builder, key);
        let probe = self.probe(hash, key)?;
        Some(self.swap_delete(probe))
    }

    /// Reserves capacity for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        let wanted = self.keys.len().saturating_add(additional);
        while self.buckets.len() < wanted {
            self.grow();
        }
    }
}

#[cfg(any(feature = "foldhash", feature = "std"))]
impl<K, V> IndexedMap<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    /// Creates an empty map using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates an empty map with room for at least `capacity` entries using
    /// the default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S> Default for IndexedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> Extend<(K, V)> for IndexedMap<K, V, S>
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

impl<K, V, S> FromIterator<(K, V)> for IndexedMap<K, V, S>
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

impl<'a, K, V, S> IntoIterator for &'a IndexedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut IndexedMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// An iterator over the entries of an [`IndexedMap`] in position order.
pub struct Iter<'a, K, V> {
    inner: core::iter::Zip<core::slice::Iter<'a, K>, core::slice::Iter<'a, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of an [`IndexedMap`] in position
/// order.
pub struct IterMut<'a, K, V> {
    inner: core::iter::Zip<core::slice::Iter<'a, K>, core::slice::IterMut<'a, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

#[cfg(test)]
impl<K, V, S> IndexedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Checks packing, chain integrity and that every position is found by
    /// its own key.
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.keys.len(), self.values.len());
        assert_eq!(self.keys.len(), self.links.len());
        assert!(self.keys.len() <= self.buckets.len());
        self.buckets.assert_chains(&self.links, 0..self.keys.len());
        for (index, key) in self.keys.iter().enumerate() {
            assert_eq!(self.get_index_of(key), Some(index));
        }
    }
}
