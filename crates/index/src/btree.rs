//! Ordered-tree index backend over `std::collections::BTreeMap`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use logfile::RecordPos;

use crate::{Index, IndexIterator};

/// The default index backend.
pub struct BTreeIndex {
    tree: RwLock<BTreeMap<Vec<u8>, RecordPos>>,
}

impl BTreeIndex {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for BTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Index for BTreeIndex {
    fn put(&self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos> {
        self.tree.write().expect("index lock poisoned").insert(key, pos)
    }

    fn get(&self, key: &[u8]) -> Option<RecordPos> {
        self.tree
            .read()
            .expect("index lock poisoned")
            .get(key)
            .copied()
    }

    fn delete(&self, key: &[u8]) -> bool {
        self.tree
            .write()
            .expect("index lock poisoned")
            .remove(key)
            .is_some()
    }

    fn len(&self) -> usize {
        self.tree.read().expect("index lock poisoned").len()
    }

    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        // Materialize the snapshot under the read lock; the iterator stays
        // stable while the live tree keeps mutating.
        let tree = self.tree.read().expect("index lock poisoned");
        let mut entries: Vec<(Vec<u8>, RecordPos)> =
            tree.iter().map(|(k, p)| (k.clone(), *p)).collect();
        if reverse {
            entries.reverse();
        }
        Box::new(BTreeIterator {
            entries,
            current: 0,
            reverse,
        })
    }
}

/// Snapshot iterator for [`BTreeIndex`].
struct BTreeIterator {
    /// Entries in iteration order: ascending, or descending when `reverse`.
    entries: Vec<(Vec<u8>, RecordPos)>,
    current: usize,
    reverse: bool,
}

impl IndexIterator for BTreeIterator {
    fn rewind(&mut self) {
        self.current = 0;
    }

    fn seek(&mut self, key: &[u8]) {
        self.current = if self.reverse {
            self.entries.partition_point(|(k, _)| k.as_slice() > key)
        } else {
            self.entries.partition_point(|(k, _)| k.as_slice() < key)
        };
    }

    fn next(&mut self) {
        self.current += 1;
    }

    fn valid(&self) -> bool {
        self.current < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.current].0
    }

    fn value(&self) -> RecordPos {
        self.entries[self.current].1
    }
}
