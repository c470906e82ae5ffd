//! # FIO - File I/O Shim
//!
//! A minimal abstraction over an OS file offering positional reads, append
//! writes, fsync, and size queries. The rest of the engine talks to disk
//! exclusively through [`IoManager`], so an alternative backend (memory-mapped
//! or direct I/O) can be substituted without touching the segment or engine
//! code.
//!
//! The engine must not rely on any backend-specific behavior: in particular,
//! `append` is **not** atomic across threads; callers serialize appends with
//! their own lock.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Uniform positional-I/O interface over one open file.
///
/// Implementors: [`StdFileIo`] (mandatory). Memory-mapped and direct-I/O
/// backends are reserved variants behind the same interface.
pub trait IoManager: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`, returning the
    /// number of bytes read. A short count means the file ended; zero means
    /// `offset` is at or past the end. The append cursor is not disturbed.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Appends `buf` at the end of the file, returning the number of bytes
    /// written.
    fn append(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Forces all written data down to the storage device (fsync).
    fn sync(&self) -> io::Result<()>;

    /// Flushes outstanding writes before the handle is released. The file
    /// descriptor itself is closed on drop.
    fn close(&self) -> io::Result<()>;

    /// Current file size in bytes.
    fn size(&self) -> io::Result<u64>;
}

/// Standard-library file backend.
///
/// The file is opened create + read + append; positional reads go through the
/// platform positional-read primitive and never move the append cursor.
pub struct StdFileIo {
    file: File,
}

impl StdFileIo {
    /// Opens (or creates) the file at `path` for reading and appending.
    ///
    /// On Unix the file is created with owner read/write permission only.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let mut opts = OpenOptions::new();
        opts.create(true).read(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let file = opts.open(path)?;
        Ok(Self { file })
    }
}

impl IoManager for StdFileIo {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        // Loop until the buffer is full or the file ends: a single positional
        // read may legally return a short count.
        let mut read = 0usize;
        while read < buf.len() {
            let n = read_at_once(&self.file, &mut buf[read..], offset + read as u64)?;
            if n == 0 {
                break;
            }
            read += n;
        }
        Ok(read)
    }

    fn append(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn close(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(unix)]
fn read_at_once(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at_once(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_at() {
        let dir = tempdir().unwrap();
        let mut io = StdFileIo::open(dir.path().join("a.data")).unwrap();

        assert_eq!(io.append(b"hello").unwrap(), 5);
        assert_eq!(io.append(b" world").unwrap(), 6);

        let mut buf = [0u8; 5];
        assert_eq!(io.read_at(&mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"hello");

        assert_eq!(io.read_at(&mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn read_past_end_is_short() {
        let dir = tempdir().unwrap();
        let mut io = StdFileIo::open(dir.path().join("a.data")).unwrap();
        io.append(b"abc").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(io.read_at(&mut buf, 1).unwrap(), 2);
        assert_eq!(&buf[..2], b"bc");
        assert_eq!(io.read_at(&mut buf, 3).unwrap(), 0);
        assert_eq!(io.read_at(&mut buf, 100).unwrap(), 0);
    }

    #[test]
    fn size_tracks_appends() {
        let dir = tempdir().unwrap();
        let mut io = StdFileIo::open(dir.path().join("a.data")).unwrap();
        assert_eq!(io.size().unwrap(), 0);
        io.append(&[0u8; 40]).unwrap();
        assert_eq!(io.size().unwrap(), 40);
    }

    #[test]
    fn reopen_appends_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.data");
        {
            let mut io = StdFileIo::open(&path).unwrap();
            io.append(b"one").unwrap();
            io.sync().unwrap();
        }
        let mut io = StdFileIo::open(&path).unwrap();
        io.append(b"two").unwrap();

        let mut buf = [0u8; 6];
        assert_eq!(io.read_at(&mut buf, 0).unwrap(), 6);
        assert_eq!(&buf, b"onetwo");
    }
}
