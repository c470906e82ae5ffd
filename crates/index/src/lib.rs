//! # Index - In-Memory Key Directory
//!
//! A totally ordered map from key bytes (compared lexicographically) to the
//! [`RecordPos`] of the key's latest record on disk. The engine consults it
//! on every read and updates it after every successful append, so lookups
//! cost one map probe plus one disk seek regardless of dataset size.
//!
//! The index owns its own reader/writer lock: readers do not block each
//! other, writers are exclusive. Iterators observe a snapshot taken at
//! creation time.

use logfile::RecordPos;

mod btree;
pub use btree::BTreeIndex;


/// Pluggable index backend contract.
pub trait Index: Send + Sync {
    /// Inserts or replaces the position for `key`, returning the previous
    /// position if one was replaced.
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos>;

    /// Looks up the position for `key`.
    fn get(&self, key: &[u8]) -> Option<RecordPos>;

    /// Removes `key`, returning whether it existed.
    fn delete(&self, key: &[u8]) -> bool;

    /// Number of keys currently indexed.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates an iterator over a snapshot of the index. `reverse` yields
    /// keys in descending order.
    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator>;
}

/// Cursor over an index snapshot. Dropping the iterator releases it.
pub trait IndexIterator: Send {
    /// Returns to the first entry.
    fn rewind(&mut self);

    /// Positions at the first key `>= key` (`<= key` when iterating in
    /// reverse).
    fn seek(&mut self, key: &[u8]);

    /// Advances to the next entry.
    fn next(&mut self);

    /// Whether the cursor currently points at an entry.
    fn valid(&self) -> bool;

    /// Key at the cursor. Panics if `!valid()`.
    fn key(&self) -> &[u8];

    /// Position at the cursor. Panics if `!valid()`.
    fn value(&self) -> RecordPos;
}

/// Selects the index backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// Ordered-tree backend ([`BTreeIndex`]).
    Btree = 1,
    /// Adaptive radix tree; reserved.
    Art = 2,
}

/// Constructs the backend for `typ`.
pub fn new_index(typ: IndexType) -> Box<dyn Index> {
    match typ {
        IndexType::Btree => Box::new(BTreeIndex::new()),
        IndexType::Art => unimplemented!("adaptive radix tree index is not yet implemented"),
    }
}
