//! The engine's public error surface.
//!
//! Input errors (`EmptyKey`, `ConfigInvalid`) are returned to the caller and
//! never logged. `KeyNotFound` is an expected outcome, not a fault. I/O
//! errors propagate unchanged from the file layer; the engine does not
//! retry. Corruption errors are fatal to the enclosing operation; during
//! recovery, fatal to `open`.

use std::io;

use logfile::LogFileError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The key passed to a mutating or reading operation was empty.
    #[error("key is empty")]
    EmptyKey,

    /// No live record exists for the key.
    #[error("key not found in database")]
    KeyNotFound,

    /// The index points at a segment the engine does not have open.
    #[error("data file not found")]
    DataFileNotFound,

    /// The index rejected an update it should have accepted.
    #[error("failed to update index")]
    IndexUpdateFailed,

    /// A record failed its CRC check, or a locator points at bytes that do
    /// not decode as a record.
    #[error("corrupted record")]
    CorruptedRecord,

    /// A file in the data directory does not follow the segment naming
    /// scheme.
    #[error("data directory corrupted: unexpected file {0:?}")]
    DataDirectoryCorrupted(String),

    /// The options passed to `open` failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A batch staged more records than its configured maximum.
    #[error("batch exceeds the maximum of {0} staged records")]
    BatchTooLarge(usize),

    /// Another merge is already running on this engine.
    #[error("merge already in progress")]
    MergeInProgress,

    /// A thread panicked while holding an engine lock.
    #[error("engine lock poisoned by a panicked thread")]
    LockPoisoned,

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<LogFileError> for Error {
    fn from(e: LogFileError) -> Self {
        match e {
            LogFileError::Io(e) => Error::Io(e),
            LogFileError::Corrupt => Error::CorruptedRecord,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
