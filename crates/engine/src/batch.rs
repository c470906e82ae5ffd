//! Atomic write batches.
//!
//! A batch stages mutations in memory and commits them in one shot. On
//! commit, every staged record is appended with its key tagged by a fresh
//! sequence number, followed by a single [`RecordType::TxnCommit`] record
//! carrying the same number. Recovery makes the members visible only after
//! observing the commit record, so a batch interrupted by a crash leaves no
//! trace: its orphan records are on disk but invisible forever.
//!
//! Non-transactional `put`/`delete` reuse the same on-disk tagging with
//! sequence number zero and skip the staging and commit-record steps.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use logfile::{decode_varint, encode_varint, LogRecord, RecordPos, RecordType};

use crate::{BatchOptions, Engine, Error, Result};

/// Sequence number tag of writes that are not part of a batch.
pub(crate) const NON_TXN_SEQ_NO: u64 = 0;

/// Prefixes `key` with the varint-encoded `seq_no`, forming the on-disk key.
pub(crate) fn tag_key(key: &[u8], seq_no: u64) -> Vec<u8> {
    let mut tagged = Vec::with_capacity(key.len() + 10);
    encode_varint(seq_no as i64, &mut tagged);
    tagged.extend_from_slice(key);
    tagged
}

/// Splits an on-disk key into the user key and its sequence-number tag.
pub(crate) fn parse_key(key: &[u8]) -> Result<(Vec<u8>, u64)> {
    let (seq_no, n) = decode_varint(key).ok_or(Error::CorruptedRecord)?;
    Ok((key[n..].to_vec(), seq_no as u64))
}

/// A mutation staged in a [`Batch`], remembered with its staging order so
/// the commit writes records in the order they were staged.
struct StagedRecord {
    order: usize,
    value: Vec<u8>,
    rec_type: RecordType,
}

/// A set of mutations committed atomically.
///
/// Created by [`Engine::new_batch`]. Staged entries are keyed by user key;
/// staging the same key twice overwrites the earlier entry. Nothing touches
/// disk until [`Batch::commit`].
pub struct Batch<'a> {
    engine: &'a Engine,
    options: BatchOptions,
    pending: HashMap<Vec<u8>, StagedRecord>,
    next_order: usize,
}

impl Engine {
    /// Creates an empty batch against this engine.
    pub fn new_batch(&self, options: BatchOptions) -> Batch<'_> {
        Batch {
            engine: self,
            options,
            pending: HashMap::new(),
            next_order: 0,
        }
    }
}

impl Batch<'_> {
    /// Stages an insert or overwrite.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.stage(key, value, RecordType::Normal)
    }

    /// Stages a deletion.
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        self.stage(key, Vec::new(), RecordType::Tombstone)
    }

    /// Number of currently staged records.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn stage(&mut self, key: Vec<u8>, value: Vec<u8>, rec_type: RecordType) -> Result<()> {
        match self.pending.entry(key) {
            Entry::Occupied(mut slot) => {
                // Overwrite in place; the key keeps its original position in
                // the commit order.
                let staged = slot.get_mut();
                staged.value = value;
                staged.rec_type = rec_type;
            }
            Entry::Vacant(slot) => {
                if self.next_order >= self.options.max_batch_num {
                    return Err(Error::BatchTooLarge(self.options.max_batch_num));
                }
                slot.insert(StagedRecord {
                    order: self.next_order,
                    value,
                    rec_type,
                });
                self.next_order += 1;
            }
        }
        Ok(())
    }

    /// Commits every staged record atomically.
    ///
    /// Under the engine write lock: allocates the next sequence number,
    /// appends each member record with its key tagged by that number, then
    /// appends the commit record and (optionally) fsyncs. Only after the
    /// commit record is written does the index absorb the staged entries, so
    /// readers observe none or all of the batch.
    ///
    /// # Errors
    ///
    /// An error from any member append abandons the batch without writing
    /// the commit record and without touching the index; the orphan records
    /// are ignored by recovery.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.pending.len() > self.options.max_batch_num {
            return Err(Error::BatchTooLarge(self.options.max_batch_num));
        }

        let mut state = self.engine.state_write()?;
        state.seq_no += 1;
        let seq_no = state.seq_no;

        let mut staged: Vec<(&Vec<u8>, &StagedRecord)> = self.pending.iter().collect();
        staged.sort_by_key(|(_, s)| s.order);

        let mut written: Vec<(Vec<u8>, RecordType, RecordPos)> =
            Vec::with_capacity(staged.len());
        for (key, record) in staged {
            let disk_record = LogRecord {
                key: tag_key(key, seq_no),
                value: record.value.clone(),
                rec_type: record.rec_type,
            };
            let pos = self.engine.append_log_record(&mut state, &disk_record)?;
            written.push((key.clone(), record.rec_type, pos));
        }

        // The commit record seals the batch: an empty user key tagged with
        // the batch's sequence number.
        let commit_record = LogRecord {
            key: tag_key(&[], seq_no),
            value: Vec::new(),
            rec_type: RecordType::TxnCommit,
        };
        self.engine.append_log_record(&mut state, &commit_record)?;

        if self.options.sync_writes {
            state.active.sync()?;
        }

        // Durable now; flip visibility.
        for (key, rec_type, pos) in written {
            if rec_type == RecordType::Tombstone {
                self.engine.index.delete(&key);
            } else {
                self.engine.index.put(key, pos);
            }
        }

        self.pending.clear();
        self.next_order = 0;
        Ok(())
    }
}
