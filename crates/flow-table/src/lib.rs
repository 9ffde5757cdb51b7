//! The rule-matching core: a priority-ordered flow table and the generic
//! hash table it is built on.
//!
//! [`FlowTable`] answers "which installed rule applies to this packet?"
//! using two complementary indices that agree on semantics: an O(1)
//! exact-match index backed by [`HashTable`], and a wildcard list scanned
//! in descending priority order. [`HashTable`] itself is a fixed-capacity
//! chained table with a pluggable [`HashStrategy`] and a non-empty-bucket
//! list that keeps iteration cost proportional to occupancy.
//!
//! Neither structure locks internally; `&mut self` on every mutating
//! operation makes the owner responsible for serialization, and the
//! borrow checker rules out structural mutation during iteration.

pub mod hash_table;
pub mod match_table;

pub use hash_table::{DefaultStrategy, HashStrategy, HashTable, Iter, DEFAULT_BUCKET_COUNT};
pub use match_table::{DuplicateEntry, EntryNotFound, FlowTable};
