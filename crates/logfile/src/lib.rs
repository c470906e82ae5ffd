//! # Logfile - Append-Only Segment Files
//!
//! The durable layer of the CinderKV storage engine. Every mutation is
//! encoded as a [`LogRecord`] and appended to the active segment file; the
//! engine's in-memory index maps each live key to the [`RecordPos`] of its
//! latest record.
//!
//! ## Binary Record Format
//!
//! ```text
//! [crc32: u32 LE][type: u8][key_len: varint][value_len: varint][key][value]
//! ```
//!
//! The CRC covers every byte after itself, i.e. `type` through the end of
//! `value`. `key_len` and `value_len` are plain LEB128 varints (no zig-zag);
//! both are non-negative and at most `u32::MAX`, so each fits in 5 bytes and
//! the header never exceeds [`record::MAX_HEADER_SIZE`] (15) bytes.
//!
//! ## Files
//!
//! Segments are named `NNNNNNNNN.data` (zero-padded 9-digit file id).
//! Two sibling files share the record format: `hint-index` (key → encoded
//! locator, written during merge to accelerate recovery) and
//! `merge-finished` (a single record marking the merge boundary).
//!
//! ## Example
//!
//! ```rust,no_run
//! use logfile::{DataFile, LogRecord, RecordType, encode_log_record};
//!
//! let mut df = DataFile::open(std::path::Path::new("/tmp/db"), 0).unwrap();
//! let (buf, _) = encode_log_record(&LogRecord {
//!     key: b"hello".to_vec(),
//!     value: b"world".to_vec(),
//!     rec_type: RecordType::Normal,
//! });
//! df.write(&buf).unwrap();
//!
//! let read = df.read_log_record(0).unwrap().unwrap();
//! assert_eq!(read.record.value, b"world");
//! ```

use std::io;

use thiserror::Error;

mod data_file;
pub mod record;

pub use data_file::{
    DataFile, DATA_FILE_SUFFIX, HINT_FILE_NAME, MERGE_FINISHED_FILE_NAME,
};
pub use record::{
    decode_varint, encode_log_record, encode_varint, LogRecord, ReadLogRecord, RecordPos,
    RecordType,
};

/// Errors that can occur while encoding, decoding, or storing log records.
#[derive(Debug, Error)]
pub enum LogFileError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record failed CRC validation or carried an unknown type byte.
    #[error("corrupt record")]
    Corrupt,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LogFileError>;
