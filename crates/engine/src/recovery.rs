//! Cold-start recovery: segment enumeration and index reconstruction.
//!
//! Recovery replays records in strictly ascending `(file_id, offset)` order.
//! Non-transactional records apply to the index immediately; records tagged
//! with a sequence number are buffered until that number's `TxnCommit`
//! record is seen, then applied in buffer order. Buffers left over at the
//! end (batches whose commit record never made it to disk) are discarded
//! silently: that is the crash-atomicity guarantee.
//!
//! When a merge has completed, the hint file replays first and segments
//! below the merge boundary are skipped entirely.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use index::Index;
use logfile::{
    DataFile, LogRecord, RecordPos, RecordType, DATA_FILE_SUFFIX, HINT_FILE_NAME,
    MERGE_FINISHED_FILE_NAME,
};

use crate::batch::{parse_key, NON_TXN_SEQ_NO};
use crate::{EngineState, Error, Result};

/// Enumerates the `*.data` segments in `dir`, sorted ascending by id, and
/// opens them. The highest id becomes the active segment; a fresh segment 0
/// is created for an empty directory. Returns the sorted ids alongside the
/// open files.
pub(crate) fn load_data_files(
    dir: &Path,
) -> Result<(Vec<u32>, DataFile, HashMap<u32, DataFile>)> {
    let mut file_ids: Vec<u32> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };
        if let Some(stem) = name.strip_suffix(DATA_FILE_SUFFIX) {
            let id: u32 = stem
                .parse()
                .map_err(|_| Error::DataDirectoryCorrupted(name.to_string()))?;
            file_ids.push(id);
        }
    }
    file_ids.sort_unstable();

    let mut older = HashMap::new();
    let mut active = None;
    for (i, &fid) in file_ids.iter().enumerate() {
        let data_file = DataFile::open(dir, fid)?;
        if i == file_ids.len() - 1 {
            active = Some(data_file);
        } else {
            older.insert(fid, data_file);
        }
    }

    let active = match active {
        Some(f) => f,
        None => DataFile::open(dir, 0)?,
    };
    Ok((file_ids, active, older))
}

/// Seeds the index from the hint file, if one exists. Hint records map a
/// user key directly to an encoded locator, so this skips re-reading the
/// merged segments themselves.
pub(crate) fn load_index_from_hint_file(dir: &Path, index: &dyn Index) -> Result<()> {
    if !dir.join(HINT_FILE_NAME).is_file() {
        return Ok(());
    }

    let hint = DataFile::open_hint_file(dir)?;
    let mut offset = 0i64;
    while let Some(read) = hint.read_log_record(offset)? {
        let pos = RecordPos::decode(&read.record.value).ok_or(Error::CorruptedRecord)?;
        index.put(read.record.key, pos);
        offset += read.size as i64;
    }
    Ok(())
}

/// Replays the segments into the index, restoring the engine's sequence
/// number and the active segment's write offset.
pub(crate) fn load_index_from_data_files(
    dir: &Path,
    file_ids: &[u32],
    state: &mut EngineState,
    index: &dyn Index,
) -> Result<()> {
    if file_ids.is_empty() {
        return Ok(());
    }

    // Segments below the merge boundary are already covered by the hint
    // file.
    let mut non_merge_file_id = 0u32;
    if dir.join(MERGE_FINISHED_FILE_NAME).is_file() {
        non_merge_file_id = read_non_merge_file_id(dir)?;
    }

    let mut txn_pending: HashMap<u64, Vec<(LogRecord, RecordPos)>> = HashMap::new();
    let mut max_seq_no = NON_TXN_SEQ_NO;
    let active_id = state.active.file_id();
    let mut active_off = state.active.write_off();

    for (i, &file_id) in file_ids.iter().enumerate() {
        if file_id < non_merge_file_id {
            continue;
        }

        let data_file = if file_id == active_id {
            &state.active
        } else {
            state.older.get(&file_id).ok_or(Error::DataFileNotFound)?
        };

        let mut offset = 0i64;
        while let Some(read) = data_file.read_log_record(offset)? {
            let size = read.size;
            let pos = RecordPos { file_id, offset };
            let (real_key, seq_no) = parse_key(&read.record.key)?;

            if seq_no == NON_TXN_SEQ_NO {
                apply_to_index(index, &real_key, read.record.rec_type, pos);
            } else if read.record.rec_type == RecordType::TxnCommit {
                // The batch is sealed: everything buffered under this
                // sequence number becomes visible, in buffer order.
                if let Some(records) = txn_pending.remove(&seq_no) {
                    for (record, record_pos) in records {
                        apply_to_index(index, &record.key, record.rec_type, record_pos);
                    }
                }
            } else {
                let mut record = read.record;
                record.key = real_key;
                txn_pending.entry(seq_no).or_default().push((record, pos));
            }

            max_seq_no = max_seq_no.max(seq_no);
            offset += size as i64;
        }

        if i == file_ids.len() - 1 {
            active_off = offset;
        }
    }

    state.seq_no = max_seq_no;
    state.active.set_write_off(active_off);

    // A crash mid-append can leave a torn record after the last decodable
    // one. Appends land at the physical end of the file, so the garbage
    // must be cut off for the write offset to stay truthful.
    let size = state.active.size()? as i64;
    if size > active_off {
        let path = DataFile::file_name(dir, active_id);
        let file = fs::OpenOptions::new().write(true).open(path)?;
        file.set_len(active_off as u64)?;
        file.sync_all()?;
    }
    Ok(())
}

/// Applies one recovered record to the index. A tombstone for an absent key
/// is a no-op: merged logs legitimately contain tombstones whose targets
/// were already reclaimed.
fn apply_to_index(index: &dyn Index, key: &[u8], rec_type: RecordType, pos: RecordPos) {
    if rec_type == RecordType::Tombstone {
        index.delete(key);
    } else {
        index.put(key.to_vec(), pos);
    }
}

/// Reads the merge boundary, the smallest file id that did not participate
/// in the completed merge, from the marker file in `dir`.
pub(crate) fn read_non_merge_file_id(dir: &Path) -> Result<u32> {
    let marker = DataFile::open_merge_finished_file(dir)?;
    let read = marker.read_log_record(0)?.ok_or(Error::CorruptedRecord)?;
    let value = &read.record.value;
    if value.len() < 4 {
        return Err(Error::CorruptedRecord);
    }
    Ok(u32::from_le_bytes([value[0], value[1], value[2], value[3]]))
}
