//! Priority-ordered flow matching table.
//!
//! Installed rules live in one of two indices. Fully-specified keys go
//! into an exact-match hash index probed in O(1); everything else goes
//! into a wildcard list kept sorted by descending priority and scanned
//! linearly. Classification probes the exact index first: a rule that
//! constrains every field outranks any wildcard rule no matter the
//! numeric priorities, which is the host protocol's precedence rule.
//! Within the wildcard list, higher priority wins outright; specificity
//! is never inferred from the pattern.

use crate::hash_table::{HashTable, DEFAULT_BUCKET_COUNT};
use flow_types::FlowKey;
use std::error::Error;
use std::fmt;
use std::mem;
use tracing::warn;

/// Returned by [`FlowTable::insert`] when an entry for the same key and
/// priority is already installed. Carries the rejected data back to the
/// caller, who never relinquished it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateEntry<T>(pub T);

impl<T> DuplicateEntry<T> {
    /// Consumes the error, returning the rejected data.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for DuplicateEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow entry already installed for this key and priority")
    }
}

impl<T: fmt::Debug> Error for DuplicateEntry<T> {}

/// Returned by [`FlowTable::update`] when no entry exists for the given
/// key and priority. Carries the would-be replacement data back to the
/// caller; updates never insert implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryNotFound<T>(pub T);

impl<T> EntryNotFound<T> {
    /// Consumes the error, returning the data that was not installed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for EntryNotFound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no flow entry installed for this key and priority")
    }
}

impl<T: fmt::Debug> Error for EntryNotFound<T> {}

#[derive(Debug, Clone)]
struct FlowEntry<T> {
    key: FlowKey,
    priority: u16,
    data: T,
}

/// A flow table mapping match patterns to opaque forwarding data.
///
/// Data ownership transfers into the table at [`insert`](Self::insert)
/// and back out at [`delete`](Self::delete) (or in the return value of
/// [`update`](Self::update)); dropping the table drops whatever is still
/// installed. The table performs no internal locking: `&mut self` on
/// every mutating operation leaves serialization to the owner.
///
/// # Examples
///
/// ```
/// use flow_table::FlowTable;
/// use flow_types::{EtherType, FlowKey};
///
/// let mut table = FlowTable::new();
/// let arp = FlowKey::any().with_ether_type(EtherType::ARP);
/// table.insert(arp, 100, "to-controller").unwrap();
///
/// let probe = FlowKey::any()
///     .with_in_port(1)
///     .with_ether_type(EtherType::ARP);
/// assert_eq!(table.lookup(&probe), Some(&"to-controller"));
/// ```
#[derive(Debug)]
pub struct FlowTable<T> {
    /// Entries whose key constrains every field; at most one per key.
    exact: HashTable<FlowKey, FlowEntry<T>>,
    /// Remaining entries, sorted by descending priority; entries of equal
    /// priority stay in insertion order.
    wildcard: Vec<FlowEntry<T>>,
}

impl<T> FlowTable<T> {
    /// Creates a table with the default exact-index size.
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKET_COUNT)
    }

    /// Creates a table with `bucket_count` buckets in the exact index.
    pub fn with_buckets(bucket_count: usize) -> Self {
        FlowTable {
            exact: HashTable::with_buckets(bucket_count),
            wildcard: Vec::new(),
        }
    }

    /// Number of installed entries across both indices.
    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Installs an entry, taking ownership of `data`.
    ///
    /// Fails if an entry with the identical key and priority is already
    /// installed. An exact key additionally conflicts with any installed
    /// entry for the same key regardless of priority: the exact index
    /// holds one entry per key, because a second one could never be
    /// observed by classification.
    pub fn insert(&mut self, key: FlowKey, priority: u16, data: T) -> Result<(), DuplicateEntry<T>> {
        if key.is_exact() {
            if self.exact.contains_key(&key) {
                warn!("exact flow entry already installed: {}", key);
                return Err(DuplicateEntry(data));
            }
            self.exact.insert(key, FlowEntry { key, priority, data });
            return Ok(());
        }

        if self.position_strict(&key, priority).is_some() {
            warn!("flow entry already installed: {}, priority {}", key, priority);
            return Err(DuplicateEntry(data));
        }
        // First position whose priority is strictly lower: keeps the list
        // sorted and places equal-priority entries after existing ones.
        let position = self.wildcard.partition_point(|entry| entry.priority >= priority);
        self.wildcard.insert(position, FlowEntry { key, priority, data });
        Ok(())
    }

    /// Looks up the entry whose key and priority both match exactly.
    ///
    /// This is the rule-management lookup; classification goes through
    /// [`lookup`](Self::lookup).
    pub fn lookup_strict(&self, key: &FlowKey, priority: u16) -> Option<&T> {
        if key.is_exact() {
            return self
                .exact
                .lookup(key)
                .filter(|entry| entry.priority == priority)
                .map(|entry| &entry.data);
        }
        self.position_strict(key, priority)
            .map(|position| &self.wildcard[position].data)
    }

    /// Classifies `probe`, returning the data of the highest-precedence
    /// matching entry.
    ///
    /// The exact index is probed first; on a miss the wildcard list is
    /// scanned in priority order and the first covering entry wins.
    /// Probes are normally the fully-specified keys the classifier
    /// builds, but any key works: a wildcarded probe field satisfies
    /// only rules that wildcard that field too.
    pub fn lookup(&self, probe: &FlowKey) -> Option<&T> {
        if let Some(entry) = self.exact.lookup(probe) {
            return Some(&entry.data);
        }
        self.wildcard
            .iter()
            .find(|entry| entry.key.covers(probe))
            .map(|entry| &entry.data)
    }

    /// Replaces the data of the entry with this exact key and priority,
    /// returning the previous data.
    ///
    /// Never inserts: if no such entry exists the new data is handed back
    /// untouched inside the error.
    pub fn update(&mut self, key: &FlowKey, priority: u16, data: T) -> Result<T, EntryNotFound<T>> {
        if key.is_exact() {
            return match self.exact.lookup_mut(key) {
                Some(entry) if entry.priority == priority => {
                    Ok(mem::replace(&mut entry.data, data))
                }
                _ => {
                    warn!("no flow entry to update: {}, priority {}", key, priority);
                    Err(EntryNotFound(data))
                }
            };
        }

        match self.position_strict(key, priority) {
            Some(position) => Ok(mem::replace(&mut self.wildcard[position].data, data)),
            None => {
                warn!("no flow entry to update: {}, priority {}", key, priority);
                Err(EntryNotFound(data))
            }
        }
    }

    /// Removes the entry with this exact key and priority, handing its
    /// data back to the caller. Removing an absent entry is a no-op
    /// returning `None`.
    pub fn delete(&mut self, key: &FlowKey, priority: u16) -> Option<T> {
        if key.is_exact() {
            return match self.exact.lookup(key) {
                Some(entry) if entry.priority == priority => {
                    self.exact.delete(key).map(|entry| entry.data)
                }
                _ => {
                    warn!("no flow entry to delete: {}, priority {}", key, priority);
                    None
                }
            };
        }

        match self.position_strict(key, priority) {
            Some(position) => Some(self.wildcard.remove(position).data),
            None => {
                warn!("no flow entry to delete: {}, priority {}", key, priority);
                None
            }
        }
    }

    /// Calls `f` for every installed entry: exact-index entries first,
    /// then wildcard entries in precedence order.
    pub fn foreach<F>(&self, mut f: F)
    where
        F: FnMut(&FlowKey, u16, &T),
    {
        for (key, priority, data) in self.iter() {
            f(key, priority, data);
        }
    }

    /// Iterates over `(key, priority, data)` for every installed entry.
    /// The borrow statically prevents mutation while iterating.
    pub fn iter(&self) -> impl Iterator<Item = (&FlowKey, u16, &T)> {
        self.exact
            .iter()
            .map(|(_, entry)| entry)
            .chain(self.wildcard.iter())
            .map(|entry| (&entry.key, entry.priority, &entry.data))
    }

    /// Position in the wildcard list of the entry strictly equal to
    /// `(key, priority)`, if installed.
    fn position_strict(&self, key: &FlowKey, priority: u16) -> Option<usize> {
        let run_start = self
            .wildcard
            .partition_point(|entry| entry.priority > priority);
        self.wildcard[run_start..]
            .iter()
            .take_while(|entry| entry.priority == priority)
            .position(|entry| entry.key == *key)
            .map(|offset| run_start + offset)
    }
}

impl<T> Default for FlowTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
