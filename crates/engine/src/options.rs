//! Engine and batch configuration.

use std::path::PathBuf;

pub use index::IndexType;

use crate::{Error, Result};

/// Configuration for [`crate::Engine::open`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the segment files. Created if absent.
    pub dir_path: PathBuf,

    /// Segment size cap in bytes. When the next record would push the active
    /// segment past this cap, the segment is sealed and a new one opened.
    pub data_file_size: i64,

    /// If `true`, every append is followed by fsync.
    pub sync_writes: bool,

    /// In-memory index backend.
    pub index_type: IndexType,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir_path: std::env::temp_dir().join("cinderkv-data"),
            data_file_size: 256 * 1024 * 1024,
            sync_writes: false,
            index_type: IndexType::Btree,
        }
    }
}

/// Configuration for [`crate::Engine::new_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on the number of staged records per batch.
    pub max_batch_num: usize,

    /// If `true`, the commit record is fsynced before the batch becomes
    /// visible.
    pub sync_writes: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_num: 10_000,
            sync_writes: true,
        }
    }
}

pub(crate) fn check_options(options: &Options) -> Result<()> {
    if options.dir_path.as_os_str().is_empty() {
        return Err(Error::ConfigInvalid("dir_path must not be empty".into()));
    }
    if options.data_file_size <= 0 {
        return Err(Error::ConfigInvalid(
            "data_file_size must be greater than 0".into(),
        ));
    }
    Ok(())
}
