//! # Engine - CinderKV Storage Engine
//!
//! The central orchestrator that ties together the [`logfile`] and [`index`]
//! crates (with the `fio` shim beneath them) into a complete Bitcask-style
//! key-value store: writes are appended to immutable segment files, and the
//! authoritative key → locator mapping is held in memory. Reads cost one
//! index probe plus one disk seek regardless of dataset size.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → encode record → append to active   │
//! │              |       segment (rotate at cap)  │
//! │              v                                │
//! │           index.put(key, locator)             │
//! │                                               │
//! │ read.rs  → index.get(key) → segment read      │
//! │             at locator → value                │
//! │                                               │
//! │ batch.rs → stage → commit (seq-tagged records │
//! │             + TxnCommit, atomic visibility)   │
//! │                                               │
//! │ merge.rs → rewrite live records + hint file   │
//! │ recovery.rs → rebuild index from segments     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                                |
//! |---------------|--------------------------------------------------------|
//! | [`lib.rs`]    | `Engine` struct, `open`, `close`, `sync`, `Drop`       |
//! | [`write`]     | `put()`, `delete()`, the locked append path            |
//! | [`read`]      | `get()`, `list_keys()`, `fold()`                       |
//! | [`batch`]     | Atomic multi-record batches via sequence numbers       |
//! | [`recovery`]  | Segment enumeration, hint fast path, index rebuild     |
//! | [`merge`]     | Compaction into a fresh segment set + hint file        |
//!
//! ## Crash Safety
//!
//! Every mutation is on disk before the index references it. Batches become
//! visible only when their `TxnCommit` record is observed; records without
//! one are discarded during recovery. Merge writes its entire output (new
//! segments, hint file, boundary marker) into a sibling directory and only
//! swaps it in once the marker is durable; a crash at any earlier point
//! leaves the old segments untouched.
//!
//! ## Concurrency
//!
//! The engine is safe for concurrent use from many threads: all methods take
//! `&self`. A single reader/writer lock guards the segment state; the index
//! carries its own. Mutations serialize on the write lock, reads share the
//! read lock, and batch commits flip visibility atomically under the write
//! lock.

use std::collections::HashMap;
use std::fs;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use index::Index;
use logfile::DataFile;

pub mod batch;
mod error;
mod merge;
mod options;
mod read;
mod recovery;
mod write;

pub use batch::Batch;
pub use error::{Error, Result};
pub use options::{BatchOptions, IndexType, Options};

/// A CinderKV storage engine instance.
///
/// Obtained from [`Engine::open`]; all operations take `&self` and may be
/// called concurrently from multiple threads.
pub struct Engine {
    pub(crate) options: Options,

    /// Segment state: the active (appendable) segment, the immutable older
    /// segments, and the transaction sequence counter. All mutations
    /// (appends, rotation, batch commit, the merge swap) hold this lock
    /// exclusively; reads hold it shared.
    pub(crate) state: RwLock<EngineState>,

    /// Key directory. Carries its own lock; updated only while the engine
    /// write lock is held so batch visibility flips atomically.
    pub(crate) index: Box<dyn Index>,

    /// Held for the duration of a merge so only one can run at a time.
    pub(crate) merge_lock: Mutex<()>,
}

pub(crate) struct EngineState {
    /// Segment currently open for append; always the highest file id.
    pub(crate) active: DataFile,
    /// Sealed segments by file id, read-only.
    pub(crate) older: HashMap<u32, DataFile>,
    /// Latest transaction sequence number; advanced under the write lock,
    /// persisted implicitly inside committed record keys.
    pub(crate) seq_no: u64,
}

impl Engine {
    /// Opens (or creates) a store in `options.dir_path` and rebuilds the
    /// in-memory index from the segment files.
    ///
    /// # Recovery Steps
    ///
    /// 1. Validate the options and create the data directory if absent.
    /// 2. Adopt or discard a leftover merge directory from a previous run.
    /// 3. Enumerate `*.data` segments; the highest id becomes the active
    ///    segment, the rest are opened read-only.
    /// 4. If a hint file is present, seed the index from it.
    /// 5. Replay every segment at or after the merge boundary, buffering
    ///    transactional records until their commit record is seen.
    pub fn open(options: Options) -> Result<Engine> {
        options::check_options(&options)?;

        if !options.dir_path.is_dir() {
            fs::create_dir_all(&options.dir_path)?;
        }

        merge::load_merge_files(&options.dir_path)?;

        let (file_ids, active, older) = recovery::load_data_files(&options.dir_path)?;
        let index = index::new_index(options.index_type);

        let mut state = EngineState {
            active,
            older,
            seq_no: 0,
        };

        recovery::load_index_from_hint_file(&options.dir_path, index.as_ref())?;
        recovery::load_index_from_data_files(
            &options.dir_path,
            &file_ids,
            &mut state,
            index.as_ref(),
        )?;

        Ok(Engine {
            options,
            state: RwLock::new(state),
            index,
            merge_lock: Mutex::new(()),
        })
    }

    /// Flushes the active segment to disk.
    pub fn sync(&self) -> Result<()> {
        let state = self.state_write()?;
        state.active.sync()?;
        Ok(())
    }

    /// Syncs and closes every open segment handle. The engine must not be
    /// used afterwards.
    pub fn close(&self) -> Result<()> {
        let state = self.state_write()?;
        state.active.sync()?;
        state.active.close()?;
        for file in state.older.values() {
            file.close()?;
        }
        Ok(())
    }

    pub(crate) fn state_read(&self) -> Result<RwLockReadGuard<'_, EngineState>> {
        self.state.read().map_err(|_| Error::LockPoisoned)
    }

    pub(crate) fn state_write(&self) -> Result<RwLockWriteGuard<'_, EngineState>> {
        self.state.write().map_err(|_| Error::LockPoisoned)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("Engine");
        dbg.field("dir_path", &self.options.dir_path)
            .field("data_file_size", &self.options.data_file_size)
            .field("sync_writes", &self.options.sync_writes)
            .field("keys", &self.index.len());
        if let Ok(state) = self.state.read() {
            dbg.field("active_file_id", &state.active.file_id())
                .field("older_files", &state.older.len())
                .field("seq_no", &state.seq_no);
        }
        dbg.finish()
    }
}

/// Best-effort close on drop: the handles are flushed so nothing buffered is
/// lost. Errors are ignored because `Drop` cannot propagate them; every
/// committed record is already recoverable from the log.
impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests;
