use alloc::vec;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::hash::Hash;

/// Chain terminator and empty-bucket marker.
pub(crate) const NIL: u32 = u32::MAX;

/// Bucket count used by power-of-two tables on their first growth.
pub const DEFAULT_CAPACITY: usize = 8;

/// Bucket count used by prime-sized tables on their first growth.
pub const DEFAULT_PRIME_CAPACITY: usize = 7;

/// Prime bucket counts, each roughly 1.2x the previous one. Growth picks the
/// first entry at least twice the current size, falling back to trial
/// division once the table is exhausted.
const PRIMES: [usize; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is specified.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder when neither `foldhash` nor `std` is enabled. It does not
        /// implement `BuildHasher`, so tables must be built with an explicit
        /// hasher through `with_hasher`.
        pub enum DefaultHashBuilder {}
    }
}

/// Hashes `key` with `hash_builder` and folds the result to the 32 bits the
/// tables cache per entry.
#[inline(always)]
pub(crate) fn hash32<S, Q>(hash_builder: &S, key: &Q) -> u32
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    let hash = hash_builder.hash_one(key);
    (hash ^ (hash >> 32)) as u32
}

#[cold]
#[inline(never)]
pub(crate) fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

fn is_prime(candidate: usize) -> bool {
    if candidate < 2 {
        return false;
    }
    if candidate % 2 == 0 {
        return candidate == 2;
    }

    let mut divisor = 3usize;
    while divisor.saturating_mul(divisor) <= candidate {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Smallest prime bucket count that is `>= min`.
pub(crate) fn next_prime(min: usize) -> usize {
    if let Some(&prime) = PRIMES.iter().find(|&&p| p >= min) {
        return prime;
    }

    let mut candidate = min | 1;
    while !is_prime(candidate) {
        candidate = candidate
            .checked_add(2)
            .unwrap_or_else(|| capacity_overflow());
    }
    candidate
}

/// How a bucket array is sized and how a hash is reduced to a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Sizing {
    /// `hash & (len - 1)`, doubling on growth.
    PowerOfTwo,
    /// `hash % len`, moving to the next prime at least twice as large.
    Prime,
}

impl Sizing {
    fn initial(self, requested: usize) -> usize {
        let len = match self {
            Sizing::PowerOfTwo => requested
                .checked_next_power_of_two()
                .unwrap_or_else(|| capacity_overflow()),
            Sizing::Prime => next_prime(requested),
        };
        Self::checked(len)
    }

    fn grown(self, current: usize) -> usize {
        let len = match (self, current) {
            (Sizing::PowerOfTwo, 0) => DEFAULT_CAPACITY,
            (Sizing::Prime, 0) => DEFAULT_PRIME_CAPACITY,
            (Sizing::PowerOfTwo, _) => current
                .checked_mul(2)
                .unwrap_or_else(|| capacity_overflow()),
            (Sizing::Prime, _) => next_prime(
                current
                    .checked_mul(2)
                    .unwrap_or_else(|| capacity_overflow()),
            ),
        };
        Self::checked(len)
    }

    // Entry indices must stay below `NIL`, and no table holds more entries
    // than it has buckets.
    #[inline]
    fn checked(len: usize) -> usize {
        if len > NIL as usize {
            capacity_overflow();
        }
        len
    }
}

/// Per-entry chain metadata, however a table chooses to store it.
pub(crate) trait ChainLinks {
    fn hash_at(&self, index: u32) -> u32;
    fn next_at(&self, index: u32) -> u32;
    fn set_next(&mut self, index: u32, next: u32);
}

/// Parallel `hash`/`next` arrays for tables whose entries are packed in
/// `[0, len)`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Links {
    hashes: Vec<u32>,
    next: Vec<u32>,
}

impl Links {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            hashes: Vec::with_capacity(capacity),
            next: Vec::with_capacity(capacity),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Appends an unlinked entry and returns its index.
    #[inline]
    pub(crate) fn push(&mut self, hash: u32) -> u32 {
        let index = self.hashes.len() as u32;
        self.hashes.push(hash);
        self.next.push(NIL);
        index
    }

    /// Moves the last entry's metadata into `index`. The caller is
    /// responsible for having redirected the chain edge that pointed at the
    /// last entry.
    #[inline]
    pub(crate) fn swap_remove(&mut self, index: u32) {
        self.hashes.swap_remove(index as usize);
        self.next.swap_remove(index as usize);
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.hashes.reserve(additional);
        self.next.reserve(additional);
    }

    pub(crate) fn clear(&mut self) {
        self.hashes.clear();
        self.next.clear();
    }
}

impl ChainLinks for Links {
    #[inline(always)]
    fn hash_at(&self, index: u32) -> u32 {
        self.hashes[index as usize]
    }

    #[inline(always)]
    fn next_at(&self, index: u32) -> u32 {
        self.next[index as usize]
    }

    #[inline(always)]
    fn set_next(&mut self, index: u32, next: u32) {
        self.next[index as usize] = next;
    }
}

/// Location of a matched entry together with its chain predecessor, so the
/// entry can be unlinked without walking the chain again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Probe {
    /// Predecessor in the chain, or `NIL` if the entry is the bucket head.
    pub(crate) prev: u32,
    pub(crate) index: u32,
}

cfg_if::cfg_if! {
    if #[cfg(feature = "stats")] {
        /// Counts chain-walk comparisons that did not match.
        #[derive(Clone, Debug, Default)]
        pub(crate) struct CollisionCounter {
            misses: core::cell::Cell<u64>,
        }

        impl CollisionCounter {
            #[inline(always)]
            pub(crate) fn record(&self) {
                self.misses.set(self.misses.get().wrapping_add(1));
            }

            pub(crate) fn get(&self) -> u64 {
                self.misses.get()
            }

            pub(crate) fn reset(&self) {
                self.misses.set(0);
            }
        }
    } else {
        #[derive(Clone, Debug, Default)]
        pub(crate) struct CollisionCounter;

        impl CollisionCounter {
            #[inline(always)]
            pub(crate) fn record(&self) {}
        }
    }
}

/// Chain and load statistics for a table.
///
/// Only available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    /// Number of live entries.
    pub len: usize,
    /// Number of buckets.
    pub buckets: usize,
    /// Buckets whose chain is non-empty.
    pub used_buckets: usize,
    /// Length of the longest chain.
    pub longest_chain: usize,
    /// Chain-walk comparisons that did not match, since creation or the last
    /// reset.
    pub collisions: u64,
    /// `len / buckets`; growth happens when this reaches 1.0.
    pub load_factor: f64,
    /// `chain_histogram[n]` is the number of buckets whose chain holds `n`
    /// entries.
    pub chain_histogram: Vec<usize>,
}

#[cfg(feature = "stats")]
impl TableStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Chain Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.len,
            self.buckets,
            self.load_factor * 100.0
        );
        println!(
            "Bucket Usage: {}/{} used, longest chain {}",
            self.used_buckets, self.buckets, self.longest_chain
        );
        println!("Collisions: {}", self.collisions);

        let max = self.chain_histogram.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("chain histogram: empty");
            return;
        }
        let max_bar = 60usize;
        for (length, &count) in self.chain_histogram.iter().enumerate() {
            let width = (count * max_bar).div_ceil(max);
            println!("{:>3} | {} ({})", length, "█".repeat(width), count);
        }
    }
}

/// The bucket index shared by every table: an array of chain heads plus the
/// chain-walking, linking and growth algorithms over entry indices.
#[derive(Clone, Debug)]
pub(crate) struct Buckets {
    heads: Vec<u32>,
    sizing: Sizing,
    collisions: CollisionCounter,
}

impl Buckets {
    pub(crate) fn new(sizing: Sizing) -> Self {
        Self {
            heads: Vec::new(),
            sizing,
            collisions: CollisionCounter::default(),
        }
    }

    pub(crate) fn with_capacity(sizing: Sizing, capacity: usize) -> Self {
        let mut buckets = Self::new(sizing);
        if capacity > 0 {
            buckets.heads = vec![NIL; sizing.initial(capacity)];
        }
        buckets
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.heads.len()
    }

    /// Load factor 1.0 is the growth trigger.
    #[inline]
    pub(crate) fn is_full(&self, populated: usize) -> bool {
        populated >= self.heads.len()
    }

    /// Bucket count the next growth would produce.
    pub(crate) fn next_len(&self) -> usize {
        self.sizing.grown(self.heads.len())
    }

    #[inline(always)]
    fn bucket(&self, hash: u32) -> usize {
        debug_assert!(!self.heads.is_empty());
        match self.sizing {
            Sizing::PowerOfTwo => hash as usize & (self.heads.len() - 1),
            Sizing::Prime => hash as usize % self.heads.len(),
        }
    }

    /// Walks the chain for `hash`, comparing the cached hash first and only
    /// then calling `eq` with the candidate's index.
    #[inline]
    pub(crate) fn find<L>(&self, links: &L, hash: u32, mut eq: impl FnMut(usize) -> bool) -> Option<Probe>
    where
        L: ChainLinks + ?Sized,
    {
        if self.heads.is_empty() {
            return None;
        }

        let mut prev = NIL;
        let mut cursor = self.heads[self.bucket(hash)];
        while cursor != NIL {
            if links.hash_at(cursor) == hash && eq(cursor as usize) {
                return Some(Probe {
                    prev,
                    index: cursor,
                });
            }
            self.collisions.record();
            prev = cursor;
            cursor = links.next_at(cursor);
        }

        None
    }

    /// Pushes `index` onto the head of its bucket's chain.
    #[inline]
    pub(crate) fn link<L>(&mut self, links: &mut L, index: u32)
    where
        L: ChainLinks + ?Sized,
    {
        let bucket = self.bucket(links.hash_at(index));
        links.set_next(index, self.heads[bucket]);
        self.heads[bucket] = index;
    }

    /// Removes a probed entry from its chain. The entry's own `next` is left
    /// untouched for the caller to repurpose.
    #[inline]
    pub(crate) fn unlink<L>(&mut self, links: &mut L, probe: Probe)
    where
        L: ChainLinks + ?Sized,
    {
        let next = links.next_at(probe.index);
        if probe.prev == NIL {
            let bucket = self.bucket(links.hash_at(probe.index));
            debug_assert_eq!(self.heads[bucket], probe.index);
            self.heads[bucket] = next;
        } else {
            links.set_next(probe.prev, next);
        }
    }

    /// Redirects the single chain edge pointing at `from` so that it points
    /// at `to` instead. `to` must not be linked anywhere.
    pub(crate) fn redirect<L>(&mut self, links: &mut L, from: u32, to: u32)
    where
        L: ChainLinks + ?Sized,
    {
        let bucket = self.bucket(links.hash_at(from));
        if self.heads[bucket] == from {
            self.heads[bucket] = to;
            return;
        }

        let mut cursor = self.heads[bucket];
        while cursor != NIL {
            let next = links.next_at(cursor);
            if next == from {
                links.set_next(cursor, to);
                return;
            }
            cursor = next;
        }

        unreachable!("entry {from} is not reachable from its bucket");
    }

    /// Replaces the bucket array with one of the next size and relinks every
    /// entry reachable from the old chains. Entry indices do not change and
    /// only cached hashes are read.
    pub(crate) fn grow<L>(&mut self, links: &mut L)
    where
        L: ChainLinks + ?Sized,
    {
        let new_len = self.next_len();
        let old = core::mem::replace(&mut self.heads, vec![NIL; new_len]);
        for head in old {
            let mut cursor = head;
            while cursor != NIL {
                let next = links.next_at(cursor);
                self.link(links, cursor);
                cursor = next;
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.heads.fill(NIL);
    }

    /// Visits every linked entry index, chain by chain.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn for_each_linked<L>(&self, links: &L, mut f: impl FnMut(usize, u32))
    where
        L: ChainLinks + ?Sized,
    {
        for (bucket, &head) in self.heads.iter().enumerate() {
            let mut cursor = head;
            while cursor != NIL {
                f(bucket, cursor);
                cursor = links.next_at(cursor);
            }
        }
    }

    #[cfg(feature = "stats")]
    pub(crate) fn reset_collisions(&self) {
        self.collisions.reset();
    }

    #[cfg(feature = "stats")]
    pub(crate) fn stats<L>(&self, links: &L, len: usize) -> TableStats
    where
        L: ChainLinks + ?Sized,
    {
        let mut lengths = vec![0usize; self.heads.len()];
        self.for_each_linked(links, |bucket, _| lengths[bucket] += 1);

        let longest_chain = lengths.iter().copied().max().unwrap_or(0);
        let mut chain_histogram = vec![0usize; longest_chain + 1];
        for &length in &lengths {
            chain_histogram[length] += 1;
        }

        TableStats {
            len,
            buckets: self.heads.len(),
            used_buckets: lengths.iter().filter(|&&l| l > 0).count(),
            longest_chain,
            collisions: self.collisions.get(),
            load_factor: if self.heads.is_empty() {
                0.0
            } else {
                len as f64 / self.heads.len() as f64
            },
            chain_histogram,
        }
    }

    /// Panics unless every index yielded by `live` is linked exactly once,
    /// in the bucket its cached hash selects, and nothing else is linked.
    #[cfg(test)]
    pub(crate) fn assert_chains<L>(&self, links: &L, live: impl IntoIterator<Item = usize>)
    where
        L: ChainLinks + ?Sized,
    {
        use alloc::collections::BTreeMap;

        let mut linked: BTreeMap<usize, usize> = BTreeMap::new();
        self.for_each_linked(links, |bucket, index| {
            assert_eq!(
                self.bucket(links.hash_at(index)),
                bucket,
                "entry {index} linked into the wrong bucket"
            );
            *linked.entry(index as usize).or_default() += 1;
        });

        let mut expected = 0usize;
        for index in live {
            expected += 1;
            assert_eq!(
                linked.get(&index).copied(),
                Some(1),
                "live entry {index} must be linked exactly once"
            );
        }
        assert_eq!(linked.len(), expected, "dead entries are still linked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links_with(hashes: &[u32]) -> Links {
        let mut links = Links::default();
        for &hash in hashes {
            links.push(hash);
        }
        links
    }

    fn chain_of(buckets: &Buckets, links: &Links, hash: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cursor = buckets.heads[buckets.bucket(hash)];
        while cursor != NIL {
            out.push(cursor);
            cursor = links.next_at(cursor);
        }
        out
    }

    #[test]
    fn power_of_two_sizing() {
        assert_eq!(Buckets::with_capacity(Sizing::PowerOfTwo, 0).len(), 0);
        assert_eq!(Buckets::with_capacity(Sizing::PowerOfTwo, 1).len(), 1);
        assert_eq!(Buckets::with_capacity(Sizing::PowerOfTwo, 5).len(), 8);
        assert_eq!(Buckets::with_capacity(Sizing::PowerOfTwo, 64).len(), 64);

        let buckets = Buckets::new(Sizing::PowerOfTwo);
        assert_eq!(buckets.next_len(), DEFAULT_CAPACITY);
        let buckets = Buckets::with_capacity(Sizing::PowerOfTwo, 16);
        assert_eq!(buckets.next_len(), 32);
    }

    #[test]
    fn prime_sizing() {
        assert_eq!(next_prime(0), 3);
        assert_eq!(next_prime(8), 11);
        assert_eq!(next_prime(14), 17);
        assert_eq!(next_prime(7199369), 7199369);
        let big = next_prime(7199370);
        assert!(big > 7199369);
        assert!(is_prime(big));

        let buckets = Buckets::new(Sizing::Prime);
        assert_eq!(buckets.next_len(), DEFAULT_PRIME_CAPACITY);
        let buckets = Buckets::with_capacity(Sizing::Prime, 7);
        assert_eq!(buckets.next_len(), 17);
        for &p in PRIMES.iter() {
            assert!(is_prime(p), "{p} is not prime");
        }
    }

    #[test]
    fn link_find_unlink() {
        let mut links = links_with(&[1, 9, 17, 2]);
        let mut buckets = Buckets::with_capacity(Sizing::PowerOfTwo, 8);
        for index in 0..4 {
            buckets.link(&mut links, index);
        }

        // 1, 9 and 17 share bucket 1; newest entry is the head.
        assert_eq!(chain_of(&buckets, &links, 1), vec![2, 1, 0]);
        assert_eq!(chain_of(&buckets, &links, 2), vec![3]);

        let probe = buckets.find(&links, 9, |i| i == 1).unwrap();
        assert_eq!(probe, Probe { prev: 2, index: 1 });
        assert!(buckets.find(&links, 9, |_| false).is_none());
        assert!(buckets.find(&links, 25, |_| true).is_none());

        buckets.unlink(&mut links, probe);
        assert_eq!(chain_of(&buckets, &links, 1), vec![2, 0]);

        let head = buckets.find(&links, 17, |i| i == 2).unwrap();
        assert_eq!(head.prev, NIL);
        buckets.unlink(&mut links, head);
        assert_eq!(chain_of(&buckets, &links, 1), vec![0]);
        buckets.assert_chains(&links, [0, 3]);
    }

    #[test]
    fn redirect_head_and_interior_edges() {
        let mut links = links_with(&[3, 11, 19, 4, 4]);
        let mut buckets = Buckets::with_capacity(Sizing::PowerOfTwo, 8);
        for index in 0..3 {
            buckets.link(&mut links, index);
        }
        // Chain for bucket 3: 2 -> 1 -> 0. Index 3 is a free spot.
        buckets.redirect(&mut links, 1, 3);
        links.set_next(3, links.next_at(1));
        assert_eq!(chain_of(&buckets, &links, 3), vec![2, 3, 0]);

        buckets.redirect(&mut links, 2, 4);
        links.set_next(4, links.next_at(2));
        assert_eq!(chain_of(&buckets, &links, 3), vec![4, 3, 0]);
    }

    #[test]
    fn grow_relinks_every_chain() {
        let hashes: Vec<u32> = (0..8u32).map(|i| i.wrapping_mul(0x9E37_79B9)).collect();
        let mut links = links_with(&hashes);
        let mut buckets = Buckets::with_capacity(Sizing::PowerOfTwo, 8);
        for index in 0..8 {
            buckets.link(&mut links, index);
        }
        assert!(buckets.is_full(8));

        buckets.grow(&mut links);
        assert_eq!(buckets.len(), 16);
        assert!(!buckets.is_full(8));
        buckets.assert_chains(&links, 0..8);
        for (index, &hash) in hashes.iter().enumerate() {
            assert!(buckets.find(&links, hash, |i| i == index).is_some());
        }
    }

    #[test]
    fn grow_prime_table_from_empty() {
        let mut links = Links::default();
        let mut buckets = Buckets::new(Sizing::Prime);
        assert!(buckets.is_full(0));
        buckets.grow(&mut links);
        assert_eq!(buckets.len(), DEFAULT_PRIME_CAPACITY);

        for hash in [0u32, 7, 14, 21, 5] {
            let index = links.push(hash);
            buckets.link(&mut links, index);
        }
        buckets.grow(&mut links);
        assert_eq!(buckets.len(), 17);
        buckets.assert_chains(&links, 0..5);
    }

    #[test]
    fn hash32_folds_high_bits() {
        use siphasher::sip::SipHasher;

        struct Keyed;
        impl BuildHasher for Keyed {
            type Hasher = SipHasher;

            fn build_hasher(&self) -> SipHasher {
                SipHasher::new_with_keys(7, 11)
            }
        }

        let full = Keyed.hash_one(42u64);
        assert_eq!(hash32(&Keyed, &42u64), (full ^ (full >> 32)) as u32);
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn oversized_bucket_array_panics() {
        let _ = Sizing::PowerOfTwo.initial(usize::MAX);
    }
}
