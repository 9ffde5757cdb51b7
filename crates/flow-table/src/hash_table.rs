//! Fixed-capacity chained hash table with a pluggable hashing strategy.
//!
//! The bucket array is sized once at construction and never grows: under
//! sustained load the chains lengthen and lookups degrade gracefully
//! instead of triggering a rehash pause. A side list of non-empty buckets
//! keeps iteration proportional to the entries actually stored, not to the
//! bucket count, so a sparsely occupied table with tens of thousands of
//! buckets still iterates cheaply.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::mem;

/// Default number of buckets: the largest prime below 2^16.
///
/// A table holding a few thousand entries stays at chain length one almost
/// everywhere at this size.
pub const DEFAULT_BUCKET_COUNT: usize = 65521;

/// Hashing and equality for table keys, chosen once at construction.
///
/// Implementations must be consistent: keys that compare equal must hash
/// equal. The table never re-derives the strategy, so entries inserted
/// under one strategy are only ever probed with the same one.
pub trait HashStrategy<K> {
    /// Hashes a key. Only the value modulo the bucket count is used.
    fn hash_key(&self, key: &K) -> u64;

    /// Compares two keys for equality.
    fn keys_equal(&self, x: &K, y: &K) -> bool;
}

/// The default strategy: the key's own [`Hash`]/[`Eq`] through a seeded
/// [`ahash`] state.
///
/// The seeds are fixed, so bucket placement is deterministic from run
/// to run.
pub struct DefaultStrategy {
    state: ahash::RandomState,
}

impl DefaultStrategy {
    pub fn new() -> Self {
        DefaultStrategy {
            state: ahash::RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
        }
    }
}

impl Default for DefaultStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq> HashStrategy<K> for DefaultStrategy {
    fn hash_key(&self, key: &K) -> u64 {
        self.state.hash_one(key)
    }

    fn keys_equal(&self, x: &K, y: &K) -> bool {
        x == y
    }
}

struct Entry<K, V> {
    key: K,
    value: V,
}

struct Bucket<K, V> {
    /// Collision chain, most recently inserted entry at the front.
    chain: VecDeque<Entry<K, V>>,
    /// Position of this bucket in the occupied list.
    /// Meaningful only while the chain is non-empty.
    occupied_slot: usize,
}

/// A key/value store over a fixed bucket array.
///
/// # Examples
///
/// ```
/// use flow_table::HashTable;
///
/// let mut table: HashTable<&str, &str> = HashTable::new();
/// table.insert("A", "Apple");
/// table.insert("B", "Bat");
///
/// assert_eq!(table.lookup(&"A"), Some(&"Apple"));
/// assert_eq!(table.delete(&"B"), Some("Bat"));
/// assert_eq!(table.len(), 1);
/// ```
pub struct HashTable<K, V> {
    strategy: Box<dyn HashStrategy<K> + Send + Sync>,
    buckets: Box<[Bucket<K, V>]>,
    /// Indices of buckets with non-empty chains, in no particular order.
    occupied: Vec<usize>,
    len: usize,
}

impl<K: Hash + Eq, V> HashTable<K, V> {
    /// Creates a table with [`DEFAULT_BUCKET_COUNT`] buckets and the
    /// default strategy.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_COUNT)
    }

    /// Creates a table with `bucket_count` buckets and the default
    /// strategy. A count of zero is bumped to one.
    pub fn with_buckets(bucket_count: usize) -> Self {
        Self::with_strategy(DefaultStrategy::new(), bucket_count)
    }
}

impl<K, V> HashTable<K, V> {
    /// Creates a table with a caller-supplied strategy.
    pub fn with_strategy<S>(strategy: S, bucket_count: usize) -> Self
    where
        S: HashStrategy<K> + Send + Sync + 'static,
    {
        let bucket_count = bucket_count.max(1);
        let mut buckets = Vec::with_capacity(bucket_count);
        for _ in 0..bucket_count {
            buckets.push(Bucket {
                chain: VecDeque::new(),
                occupied_slot: 0,
            });
        }
        HashTable {
            strategy: Box::new(strategy),
            buckets: buckets.into_boxed_slice(),
            occupied: Vec::new(),
            len: 0,
        }
    }

    /// Number of entries stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the bucket array; constant for the table's lifetime.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of buckets currently holding at least one entry.
    pub fn occupied_buckets(&self) -> usize {
        self.occupied.len()
    }

    /// Inserts a key/value pair, transferring ownership to the table.
    ///
    /// If the key is already present (per the strategy), the value is
    /// replaced in place, keeping the entry's position in its collision
    /// chain, and the previous value is returned. A new key is pushed at
    /// the head of its chain.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let index = self.bucket_index(&key);
        let strategy = &self.strategy;
        let bucket = &mut self.buckets[index];

        if let Some(entry) = bucket
            .chain
            .iter_mut()
            .find(|entry| strategy.keys_equal(&entry.key, &key))
        {
            return Some(mem::replace(&mut entry.value, value));
        }

        if bucket.chain.is_empty() {
            bucket.occupied_slot = self.occupied.len();
            self.occupied.push(index);
        }
        self.buckets[index].chain.push_front(Entry { key, value });
        self.len += 1;
        None
    }

    /// Returns a reference to the value stored under `key`, if any.
    pub fn lookup(&self, key: &K) -> Option<&V> {
        let index = self.bucket_index(key);
        self.buckets[index]
            .chain
            .iter()
            .find(|entry| self.strategy.keys_equal(&entry.key, key))
            .map(|entry| &entry.value)
    }

    /// Returns a mutable reference to the value stored under `key`, if any.
    pub fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.bucket_index(key);
        let strategy = &self.strategy;
        self.buckets[index]
            .chain
            .iter_mut()
            .find(|entry| strategy.keys_equal(&entry.key, key))
            .map(|entry| &mut entry.value)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.lookup(key).is_some()
    }

    /// Removes the entry for `key`, handing its value back to the caller.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let index = self.bucket_index(key);
        let entry = {
            let strategy = &self.strategy;
            let bucket = &mut self.buckets[index];
            let position = bucket
                .chain
                .iter()
                .position(|entry| strategy.keys_equal(&entry.key, key))?;
            bucket.chain.remove(position)?
        };
        self.len -= 1;
        if self.buckets[index].chain.is_empty() {
            self.release_occupied(index);
        }
        Some(entry.value)
    }

    /// Applies `f` to the value stored under `key`; does nothing if the
    /// key is absent.
    pub fn map_value<F>(&mut self, key: &K, f: F)
    where
        F: FnOnce(&mut V),
    {
        if let Some(value) = self.lookup_mut(key) {
            f(value);
        }
    }

    /// Calls `f` for every stored pair. Visiting order follows the
    /// non-empty bucket list and is unspecified, but stable between
    /// mutations.
    pub fn foreach<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (key, value) in self.iter() {
            f(key, value);
        }
    }

    /// Iterates over stored pairs. The borrow taken here statically
    /// prevents inserts and deletes while the iterator is alive.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            table: self,
            occupied_pos: 0,
            chain_pos: 0,
            remaining: self.len,
        }
    }

    fn bucket_index(&self, key: &K) -> usize {
        (self.strategy.hash_key(key) % self.buckets.len() as u64) as usize
    }

    /// Drops `bucket` from the occupied list after its chain emptied,
    /// patching the back-pointer of the entry swapped into its slot.
    fn release_occupied(&mut self, bucket: usize) {
        let slot = self.buckets[bucket].occupied_slot;
        let removed = self.occupied.swap_remove(slot);
        assert_eq!(removed, bucket, "non-empty bucket tracking out of sync");
        if let Some(&moved) = self.occupied.get(slot) {
            self.buckets[moved].occupied_slot = slot;
        }
    }
}

impl<K: Hash + Eq, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for HashTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a HashTable<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`HashTable`].
///
/// Advances bucket to bucket along the non-empty list, so wide but
/// sparsely occupied tables are not scanned end to end.
pub struct Iter<'a, K, V> {
    table: &'a HashTable<K, V>,
    occupied_pos: usize,
    chain_pos: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &bucket = self.table.occupied.get(self.occupied_pos)?;
            let chain = &self.table.buckets[bucket].chain;
            if let Some(entry) = chain.get(self.chain_pos) {
                self.chain_pos += 1;
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            self.occupied_pos += 1;
            self.chain_pos = 0;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    /// Degenerate strategy that lands every key in bucket 0, turning the
    /// table into a single chain.
    struct OneBucket;

    impl<K: Eq> HashStrategy<K> for OneBucket {
        fn hash_key(&self, _key: &K) -> u64 {
            0
        }

        fn keys_equal(&self, x: &K, y: &K) -> bool {
            x == y
        }
    }

    /// Case-insensitive string strategy.
    struct CaseFold;

    impl HashStrategy<String> for CaseFold {
        fn hash_key(&self, key: &String) -> u64 {
            DefaultStrategy::new().hash_key(&key.to_lowercase())
        }

        fn keys_equal(&self, x: &String, y: &String) -> bool {
            x.eq_ignore_ascii_case(y)
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table: HashTable<String, u32> = HashTable::new();
        assert!(table.is_empty());

        assert_eq!(table.insert("alpha".to_string(), 1), None);
        assert_eq!(table.insert("beta".to_string(), 2), None);

        assert_eq!(table.lookup(&"alpha".to_string()), Some(&1));
        assert_eq!(table.lookup(&"beta".to_string()), Some(&2));
        assert_eq!(table.lookup(&"gamma".to_string()), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut table: HashTable<u32, &str> = HashTable::with_strategy(OneBucket, 4);
        table.insert(1, "one");
        table.insert(2, "two");
        table.insert(3, "three");

        // Replacement keeps the chain position and returns the old value.
        assert_eq!(table.insert(2, "TWO"), Some("two"));
        assert_eq!(table.len(), 3);

        let order: Vec<(u32, &str)> = table.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(order, vec![(3, "three"), (2, "TWO"), (1, "one")]);
    }

    #[test]
    fn test_chain_head_insertion_order() {
        let mut table: HashTable<u32, u32> = HashTable::with_strategy(OneBucket, 4);
        for i in 0..4 {
            table.insert(i, i * 10);
        }

        let keys: Vec<u32> = table.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_delete_returns_value() {
        let mut table: HashTable<String, u32> = HashTable::new();
        table.insert("alpha".to_string(), 1);

        assert_eq!(table.delete(&"alpha".to_string()), Some(1));
        assert_eq!(table.delete(&"alpha".to_string()), None);
        assert_eq!(table.lookup(&"alpha".to_string()), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_lookup_mut_and_map_value() {
        let mut table: HashTable<u32, Vec<u32>> = HashTable::new();
        table.insert(7, vec![1]);

        if let Some(list) = table.lookup_mut(&7) {
            list.push(2);
        }
        table.map_value(&7, |list| list.push(3));
        table.map_value(&8, |list| list.push(99));

        assert_eq!(table.lookup(&7), Some(&vec![1, 2, 3]));
        assert_eq!(table.lookup(&8), None);
    }

    #[test]
    fn test_occupied_bucket_tracking() {
        let mut table: HashTable<u32, u32> = HashTable::with_buckets(8);
        assert_eq!(table.occupied_buckets(), 0);

        for i in 0..32 {
            table.insert(i, i);
        }
        let occupied = table.occupied_buckets();
        assert!(occupied >= 1 && occupied <= 8);

        for i in 0..32 {
            table.delete(&i);
        }
        assert_eq!(table.occupied_buckets(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_bucket_count_never_changes() {
        let mut table: HashTable<u32, u32> = HashTable::with_buckets(4);
        for i in 0..100 {
            table.insert(i, i);
        }
        assert_eq!(table.bucket_count(), 4);
        assert_eq!(table.len(), 100);
        for i in 0..100 {
            assert_eq!(table.lookup(&i), Some(&i));
        }
        for i in (0..100).step_by(2) {
            table.delete(&i);
        }
        assert_eq!(table.bucket_count(), 4);
        assert_eq!(table.len(), 50);
    }

    #[test]
    fn test_iterator_visits_each_entry_once() {
        let mut table: HashTable<u32, u32> = HashTable::with_buckets(16);
        for i in 0..100 {
            table.insert(i, i + 1000);
        }

        let seen: HashSet<u32> = table.iter().map(|(k, _)| *k).collect();
        assert_eq!(seen.len(), 100);
        assert_eq!(table.iter().count(), 100);
    }

    #[test]
    fn test_iterator_is_exact_size() {
        let mut table: HashTable<u32, u32> = HashTable::with_buckets(16);
        for i in 0..10 {
            table.insert(i, i);
        }

        let mut iter = table.iter();
        assert_eq!(iter.len(), 10);
        iter.next();
        assert_eq!(iter.len(), 9);
    }

    #[test]
    fn test_foreach_completeness_single_chain() {
        let mut table: HashTable<u32, u32> = HashTable::with_strategy(OneBucket, 8);
        for i in 0..50 {
            table.insert(i, i);
        }
        assert_eq!(table.occupied_buckets(), 1);

        let mut count = 0;
        table.foreach(|_, _| count += 1);
        assert_eq!(count, 50);
    }

    #[test]
    fn test_custom_strategy_equality() {
        let mut table: HashTable<String, u32> = HashTable::with_strategy(CaseFold, 16);
        table.insert("Flow".to_string(), 1);

        assert_eq!(table.lookup(&"FLOW".to_string()), Some(&1));
        assert_eq!(table.insert("flow".to_string(), 2), Some(1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.delete(&"fLoW".to_string()), Some(2));
    }

    #[test]
    fn test_zero_bucket_request_is_bumped() {
        let mut table: HashTable<u32, u32> = HashTable::with_buckets(0);
        assert_eq!(table.bucket_count(), 1);
        table.insert(1, 1);
        assert_eq!(table.lookup(&1), Some(&1));
    }
}
