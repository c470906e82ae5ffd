//! Write path: `put()`, `delete()`, and the locked append primitive.
//!
//! Every mutation is encoded as a log record, appended to the active
//! segment (rotating it when the cap is reached), and only then reflected in
//! the index. The engine write lock is held across both steps so concurrent
//! writers cannot leave the index pointing at a superseded record.

use logfile::{encode_log_record, DataFile, LogRecord, RecordPos, RecordType};

use crate::batch::{tag_key, NON_TXN_SEQ_NO};
use crate::{Engine, EngineState, Error, Result};

impl Engine {
    /// Inserts or overwrites a key-value pair.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyKey`] for an empty key; I/O errors from the append.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let record = LogRecord {
            key: tag_key(&key, NON_TXN_SEQ_NO),
            value,
            rec_type: RecordType::Normal,
        };

        let mut state = self.state_write()?;
        let pos = self.append_log_record(&mut state, &record)?;
        self.index.put(key, pos);
        Ok(())
    }

    /// Deletes a key.
    ///
    /// If the key is not present this is a no-op: nothing is written and
    /// `Ok(())` is returned. Otherwise a tombstone record is appended and the
    /// key is removed from the index; the dead records are reclaimed by the
    /// next merge.
    pub fn delete(&self, key: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let mut state = self.state_write()?;
        if self.index.get(&key).is_none() {
            return Ok(());
        }

        let record = LogRecord {
            key: tag_key(&key, NON_TXN_SEQ_NO),
            value: Vec::new(),
            rec_type: RecordType::Tombstone,
        };
        self.append_log_record(&mut state, &record)?;

        if !self.index.delete(&key) {
            return Err(Error::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Appends an encoded record to the active segment, rotating it first if
    /// the record would push it past the configured cap. Returns the position
    /// of the written record.
    ///
    /// Callers must hold the engine write lock. The active segment's write
    /// offset advances only on a successful write, so a failed append leaves
    /// the segment state unchanged.
    pub(crate) fn append_log_record(
        &self,
        state: &mut EngineState,
        record: &LogRecord,
    ) -> Result<RecordPos> {
        let (encoded, size) = encode_log_record(record);

        if state.active.write_off() + size as i64 > self.options.data_file_size {
            // Seal the full segment and open its successor.
            state.active.sync()?;
            let next_id = state.active.file_id() + 1;
            let new_active = DataFile::open(&self.options.dir_path, next_id)?;
            let sealed = std::mem::replace(&mut state.active, new_active);
            state.older.insert(sealed.file_id(), sealed);
        }

        let write_off = state.active.write_off();
        state.active.write(&encoded)?;

        if self.options.sync_writes {
            state.active.sync()?;
        }

        Ok(RecordPos {
            file_id: state.active.file_id(),
            offset: write_off,
        })
    }
}
