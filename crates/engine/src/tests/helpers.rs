use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::{Engine, IndexType, Options};

/// Options pointing at `dir` with the given segment cap and no per-write
/// fsync.
pub fn options(dir: &Path, data_file_size: i64) -> Options {
    Options {
        dir_path: dir.to_path_buf(),
        data_file_size,
        sync_writes: false,
        index_type: IndexType::Btree,
    }
}

/// Opens an engine in a fresh temp directory.
pub fn open_engine(data_file_size: i64) -> (TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(options(dir.path(), data_file_size)).unwrap();
    (dir, engine)
}

/// Reopens an engine over an existing directory.
pub fn reopen(dir: &Path, data_file_size: i64) -> Engine {
    Engine::open(options(dir, data_file_size)).unwrap()
}

/// Number of `*.data` segments in `dir`.
pub fn count_data_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.ends_with(".data"))
                .unwrap_or(false)
        })
        .count()
}

/// Total bytes held by `*.data` segments in `dir`.
pub fn data_file_bytes(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.ends_with(".data"))
                .unwrap_or(false)
        })
        .map(|e| e.metadata().unwrap().len())
        .sum()
}
