//! Merge: compaction of the immutable segments.
//!
//! Merge rewrites every *live* record (one whose locator the index still
//! points at) into a fresh segment sequence inside the sibling
//! `<dir>-merge` directory, writing a hint record for each so the next open
//! can skip re-reading the merged data. Once the outputs are synced and the
//! `merge-finished` marker (carrying the merge boundary) is durable, the old
//! segments are deleted and the outputs renamed into the data directory.
//!
//! Crash protocol: the marker is the commit point. If a restart finds the
//! merge directory without it, the partial output is discarded; with it, the
//! swap is completed before recovery runs. Either way no committed record is
//! ever lost.

use std::fs;
use std::path::{Path, PathBuf};

use logfile::{
    encode_log_record, DataFile, LogRecord, RecordPos, RecordType, DATA_FILE_SUFFIX,
    MERGE_FINISHED_FILE_NAME,
};

use crate::batch::{parse_key, tag_key, NON_TXN_SEQ_NO};
use crate::recovery::read_non_merge_file_id;
use crate::{Engine, Error, Result};

/// Key of the single record inside the merge-finished marker file.
const MERGE_FINISHED_KEY: &[u8] = b"merge-finished";

/// Sibling directory the merge output is staged in: `<dir>-merge`.
pub(crate) fn merge_path(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("-merge");
    dir.with_file_name(name)
}

impl Engine {
    /// Compacts the immutable segments, reclaiming dead records.
    ///
    /// Runs concurrently with foreground reads and writes; the engine write
    /// lock is held only to rotate the active segment at the start and to
    /// swap the compacted files in at the end.
    ///
    /// # Errors
    ///
    /// [`Error::MergeInProgress`] if another merge is running on this
    /// engine; otherwise I/O errors from the rewrite.
    pub fn merge(&self) -> Result<()> {
        let guard = self.merge_lock.try_lock();
        let _guard = match guard {
            Ok(g) => g,
            Err(_) => return Err(Error::MergeInProgress),
        };

        // Rotate the active segment so merge only ever touches immutable
        // files. Its pre-rotation id is the merge boundary: everything below
        // it participates, it and everything after does not.
        let (non_merge_file_id, merge_ids) = {
            let mut state = self.state_write()?;
            let boundary = state.active.file_id();
            state.active.sync()?;
            let new_active = DataFile::open(&self.options.dir_path, boundary + 1)?;
            let sealed = std::mem::replace(&mut state.active, new_active);
            state.older.insert(sealed.file_id(), sealed);

            let mut ids: Vec<u32> = state
                .older
                .keys()
                .copied()
                .filter(|id| *id < boundary)
                .collect();
            ids.sort_unstable();
            (boundary, ids)
        };

        if merge_ids.is_empty() {
            return Ok(());
        }

        let merge_dir = merge_path(&self.options.dir_path);
        if merge_dir.is_dir() {
            fs::remove_dir_all(&merge_dir)?;
        }
        fs::create_dir_all(&merge_dir)?;

        let mut outputs = vec![DataFile::open(&merge_dir, 0)?];
        let mut hint_file = DataFile::open_hint_file(&merge_dir)?;
        // Locator rewrites to apply to the live index once the swap is done.
        let mut remaps: Vec<(Vec<u8>, RecordPos, RecordPos)> = Vec::new();

        for &file_id in &merge_ids {
            // Fresh read-only handle; the shared one stays behind the engine
            // lock for foreground reads.
            let data_file = DataFile::open(&self.options.dir_path, file_id)?;
            let mut offset = 0i64;
            while let Some(read) = data_file.read_log_record(offset)? {
                let size = read.size;
                let (real_key, _) = parse_key(&read.record.key)?;
                let old_pos = RecordPos { file_id, offset };

                if self.index.get(&real_key) == Some(old_pos) {
                    // Live record. Its batch (if any) is long since durable,
                    // so the rewrite drops the transaction tag.
                    let record = LogRecord {
                        key: tag_key(&real_key, NON_TXN_SEQ_NO),
                        value: read.record.value,
                        rec_type: read.record.rec_type,
                    };
                    let new_pos = self.append_merge_record(&merge_dir, &mut outputs, &record)?;
                    hint_file.write_hint_record(&real_key, &new_pos)?;
                    remaps.push((real_key, old_pos, new_pos));
                }

                offset += size as i64;
            }
        }

        for output in &outputs {
            output.sync()?;
        }
        hint_file.sync()?;

        // The marker is the commit point: once durable, a crash before the
        // swap below is completed on the next open.
        let mut marker = DataFile::open_merge_finished_file(&merge_dir)?;
        let (encoded, _) = encode_log_record(&LogRecord {
            key: MERGE_FINISHED_KEY.to_vec(),
            value: non_merge_file_id.to_le_bytes().to_vec(),
            rec_type: RecordType::Normal,
        });
        marker.write(&encoded)?;
        marker.sync()?;

        let output_ids: Vec<u32> = outputs.iter().map(|f| f.file_id()).collect();
        drop(outputs);
        drop(hint_file);
        drop(marker);

        // Swap under the write lock so no reader observes a half-replaced
        // directory, then point the index at the rewritten records.
        let mut state = self.state_write()?;
        // Drop the old readers (releases the file handles) before deleting
        // the files they point at.
        for &file_id in &merge_ids {
            state.older.remove(&file_id);
        }
        replace_merged_files(&self.options.dir_path, &merge_dir, non_merge_file_id)?;
        for file_id in output_ids {
            state
                .older
                .insert(file_id, DataFile::open(&self.options.dir_path, file_id)?);
        }
        for (key, old_pos, new_pos) in remaps {
            // Skip keys overwritten or deleted while the merge was running.
            if self.index.get(&key) == Some(old_pos) {
                self.index.put(key, new_pos);
            }
        }
        Ok(())
    }

    /// Appends a record to the merge output, rotating to a new output
    /// segment at the configured cap.
    fn append_merge_record(
        &self,
        merge_dir: &Path,
        outputs: &mut Vec<DataFile>,
        record: &LogRecord,
    ) -> Result<RecordPos> {
        let (encoded, size) = encode_log_record(record);

        let needs_rotation = match outputs.last() {
            Some(current) => current.write_off() + size as i64 > self.options.data_file_size,
            None => true,
        };
        if needs_rotation {
            let next_id = outputs.last().map(|f| f.file_id() + 1).unwrap_or(0);
            outputs.push(DataFile::open(merge_dir, next_id)?);
        }

        let current = outputs.last_mut().ok_or(Error::DataFileNotFound)?;
        let write_off = current.write_off();
        current.write(&encoded)?;
        Ok(RecordPos {
            file_id: current.file_id(),
            offset: write_off,
        })
    }
}

/// Adopts or discards a merge directory left behind by a previous process.
/// Called before segment enumeration on open.
pub(crate) fn load_merge_files(dir: &Path) -> Result<()> {
    let merge_dir = merge_path(dir);
    if !merge_dir.is_dir() {
        return Ok(());
    }

    if !merge_dir.join(MERGE_FINISHED_FILE_NAME).is_file() {
        // Crashed before the commit point: the merge never happened.
        fs::remove_dir_all(&merge_dir)?;
        return Ok(());
    }

    let non_merge_file_id = read_non_merge_file_id(&merge_dir)?;
    replace_merged_files(dir, &merge_dir, non_merge_file_id)
}

/// Replaces the segments below the merge boundary with the merge output:
/// deletes the old files, then renames every staged file (segments, hint
/// file, marker) into the data directory and removes the staging directory.
pub(crate) fn replace_merged_files(
    data_dir: &Path,
    merge_dir: &Path,
    non_merge_file_id: u32,
) -> Result<()> {
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(n) => n,
            None => continue,
        };
        if let Some(stem) = name.strip_suffix(DATA_FILE_SUFFIX) {
            if let Ok(id) = stem.parse::<u32>() {
                if id < non_merge_file_id {
                    fs::remove_file(entry.path())?;
                }
            }
        }
    }

    for entry in fs::read_dir(merge_dir)? {
        let entry = entry?;
        let target = data_dir.join(entry.file_name());
        // A previous merge's hint file or marker may still be in place.
        if target.exists() {
            fs::remove_file(&target)?;
        }
        fs::rename(entry.path(), &target)?;
    }
    fs::remove_dir(merge_dir)?;
    Ok(())
}
