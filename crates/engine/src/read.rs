//! Read path: `get()`, `list_keys()`, and `fold()`.
//!
//! Reads take the engine lock shared, so they proceed concurrently with each
//! other and block only while a writer holds the lock. The lock is acquired
//! *before* the index lookup: a batch commit updates the index while holding
//! the lock exclusively, so readers observe either none or all of a batch.

use logfile::{RecordPos, RecordType};

use crate::{Engine, EngineState, Error, Result};

impl Engine {
    /// Looks up the value for `key`.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] if the key has never been written, was
    /// deleted, or its latest record is a tombstone.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let state = self.state_read()?;
        let pos = self.index.get(key).ok_or(Error::KeyNotFound)?;
        self.read_value(&state, pos)
    }

    /// Returns every live key in ascending lexicographic order.
    pub fn list_keys(&self) -> Result<Vec<Vec<u8>>> {
        let _state = self.state_read()?;
        let mut iter = self.index.iterator(false);
        let mut keys = Vec::with_capacity(self.index.len());
        while iter.valid() {
            keys.push(iter.key().to_vec());
            iter.next();
        }
        Ok(keys)
    }

    /// Calls `f` with every live key-value pair in ascending key order,
    /// stopping early when `f` returns `false`.
    pub fn fold<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let state = self.state_read()?;
        let mut iter = self.index.iterator(false);
        while iter.valid() {
            let value = self.read_value(&state, iter.value())?;
            if !f(iter.key(), &value) {
                break;
            }
            iter.next();
        }
        Ok(())
    }

    /// Dereferences a locator: resolves the segment, reads the record, and
    /// returns its value.
    pub(crate) fn read_value(&self, state: &EngineState, pos: RecordPos) -> Result<Vec<u8>> {
        let data_file = if pos.file_id == state.active.file_id() {
            &state.active
        } else {
            state.older.get(&pos.file_id).ok_or(Error::DataFileNotFound)?
        };

        let read = data_file
            .read_log_record(pos.offset)?
            .ok_or(Error::CorruptedRecord)?;

        if read.record.rec_type == RecordType::Tombstone {
            return Err(Error::KeyNotFound);
        }
        Ok(read.record.value)
    }
}
