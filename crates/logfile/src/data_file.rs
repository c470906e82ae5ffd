//! Segment files: one open file handle plus its append offset.

use std::path::{Path, PathBuf};

use crc32fast::Hasher as Crc32;
use fio::{IoManager, StdFileIo};

use crate::record::{
    decode_header, encode_log_record, LogRecord, ReadLogRecord, RecordPos, RecordType,
    MAX_HEADER_SIZE,
};
use crate::{LogFileError, Result};

/// Filename suffix of ordinary data segments.
pub const DATA_FILE_SUFFIX: &str = ".data";

/// Index snapshot written at merge time; lets recovery skip merged segments.
pub const HINT_FILE_NAME: &str = "hint-index";

/// Marker recording the merge boundary; its single record's value holds the
/// smallest file id that did not participate in the completed merge.
pub const MERGE_FINISHED_FILE_NAME: &str = "merge-finished";

/// One append-only segment file.
///
/// The largest file id in a directory is the *active* segment, open for
/// append; all smaller ids are immutable. `write_off` is the offset the next
/// append will land at, advanced only on successful writes.
pub struct DataFile {
    file_id: u32,
    write_off: i64,
    io: Box<dyn IoManager>,
}

impl DataFile {
    /// Opens (or creates) segment `file_id` inside `dir`.
    pub fn open(dir: &Path, file_id: u32) -> Result<DataFile> {
        Self::open_path(Self::file_name(dir, file_id), file_id)
    }

    /// Opens the hint file inside `dir`.
    pub fn open_hint_file(dir: &Path) -> Result<DataFile> {
        Self::open_path(dir.join(HINT_FILE_NAME), 0)
    }

    /// Opens the merge-finished marker file inside `dir`.
    pub fn open_merge_finished_file(dir: &Path) -> Result<DataFile> {
        Self::open_path(dir.join(MERGE_FINISHED_FILE_NAME), 0)
    }

    /// Path of segment `file_id` inside `dir`: `NNNNNNNNN.data`.
    pub fn file_name(dir: &Path, file_id: u32) -> PathBuf {
        dir.join(format!("{:09}{}", file_id, DATA_FILE_SUFFIX))
    }

    fn open_path(path: PathBuf, file_id: u32) -> Result<DataFile> {
        let io = StdFileIo::open(path)?;
        let write_off = io.size()? as i64;
        Ok(DataFile {
            file_id,
            write_off,
            io: Box::new(io),
        })
    }

    pub fn file_id(&self) -> u32 {
        self.file_id
    }

    /// Offset the next append will be written at.
    pub fn write_off(&self) -> i64 {
        self.write_off
    }

    /// Repositions the logical append cursor; used by recovery after the
    /// active segment has been replayed.
    pub fn set_write_off(&mut self, off: i64) {
        self.write_off = off;
    }

    /// Current on-disk size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(self.io.size()?)
    }

    /// Appends raw encoded bytes, advancing `write_off` by exactly
    /// `buf.len()` on success.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.io.append(buf)?;
        self.write_off += n as i64;
        Ok(n)
    }

    /// Appends a hint record: the user key, with the encoded position as the
    /// value.
    pub fn write_hint_record(&mut self, key: &[u8], pos: &RecordPos) -> Result<()> {
        let record = LogRecord {
            key: key.to_vec(),
            value: pos.encode(),
            rec_type: RecordType::Normal,
        };
        let (buf, _) = encode_log_record(&record);
        self.write(&buf)?;
        Ok(())
    }

    /// Forces written data to disk.
    pub fn sync(&self) -> Result<()> {
        Ok(self.io.sync()?)
    }

    /// Flushes the file ahead of the handle being dropped.
    pub fn close(&self) -> Result<()> {
        Ok(self.io.close()?)
    }

    /// Decodes the record starting at `offset`.
    ///
    /// Returns `Ok(None)` at end-of-file: `offset` at or past the file size,
    /// an all-zero header, or a record truncated by a crash mid-append.
    /// Returns [`LogFileError::Corrupt`] when a fully-present record fails
    /// its CRC check or carries an unknown type byte. On success the result
    /// includes the record's on-disk length so the caller can advance.
    pub fn read_log_record(&self, offset: i64) -> Result<Option<ReadLogRecord>> {
        let size = self.io.size()? as i64;
        if offset < 0 || offset >= size {
            return Ok(None);
        }

        // Clamp the header read to the file tail.
        let window = (size - offset).min(MAX_HEADER_SIZE as i64) as usize;
        let mut header_buf = vec![0u8; window];
        self.io.read_at(&mut header_buf, offset as u64)?;

        let header = match decode_header(&header_buf) {
            Some(h) => h,
            // A full-size window that still fails to parse is corruption; a
            // short window is a truncated tail.
            None if window == MAX_HEADER_SIZE => return Err(LogFileError::Corrupt),
            None => return Ok(None),
        };

        // An all-zero header marks the end of written data.
        if header.crc == 0
            && header.type_byte == 0
            && header.key_len == 0
            && header.value_len == 0
        {
            return Ok(None);
        }

        let rec_type = RecordType::from_u8(header.type_byte).ok_or(LogFileError::Corrupt)?;
        if header.key_len < 0 || header.value_len < 0 {
            return Err(LogFileError::Corrupt);
        }
        let key_len = header.key_len as usize;
        let value_len = header.value_len as usize;
        let total = header.size as i64 + key_len as i64 + value_len as i64;
        if offset + total > size {
            // Payload runs past the end of the file: crash tail.
            return Ok(None);
        }

        let mut payload = vec![0u8; key_len + value_len];
        if !payload.is_empty() {
            self.io
                .read_at(&mut payload, (offset + header.size as i64) as u64)?;
        }

        let mut hasher = Crc32::new();
        hasher.update(&header_buf[4..header.size]);
        hasher.update(&payload);
        if hasher.finalize() != header.crc {
            return Err(LogFileError::Corrupt);
        }

        let value = payload.split_off(key_len);
        Ok(Some(ReadLogRecord {
            record: LogRecord {
                key: payload,
                value,
                rec_type,
            },
            size: total as u64,
        }))
    }
}
