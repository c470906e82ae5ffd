//! Log record types and the binary codec.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;

/// Longest possible encoding of a length varint (a `u32`-range value).
pub(crate) const MAX_VARINT_LEN32: usize = 5;

/// Maximum record header size: crc (4) + type (1) + two length varints.
pub const MAX_HEADER_SIZE: usize = 4 + 1 + 2 * MAX_VARINT_LEN32;

/// The kind of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A live key-value pair.
    Normal = 0,
    /// A deletion marker; suppresses all earlier records for the key.
    Tombstone = 1,
    /// Seals a batch: every record tagged with the same sequence number
    /// becomes visible once this record is on disk.
    TxnCommit = 2,
}

impl RecordType {
    pub(crate) fn from_u8(b: u8) -> Option<RecordType> {
        match b {
            0 => Some(RecordType::Normal),
            1 => Some(RecordType::Tombstone),
            2 => Some(RecordType::TxnCommit),
            _ => None,
        }
    }
}

/// The unit of durable storage: an opaque key, an opaque value, and a type.
///
/// At the engine API the key is non-empty; on disk it additionally carries a
/// varint sequence-number prefix (`0` for non-transactional writes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub rec_type: RecordType,
}

/// A record decoded from disk, together with its on-disk length so the
/// caller can advance its cursor.
#[derive(Debug)]
pub struct ReadLogRecord {
    pub record: LogRecord,
    pub size: u64,
}

/// Physical position of a record: which segment, and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPos {
    pub file_id: u32,
    pub offset: i64,
}

impl RecordPos {
    /// Encodes the position for storage in a hint record's value:
    /// `[file_id: u32 LE][offset: varint]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 10);
        buf.extend_from_slice(&self.file_id.to_le_bytes());
        encode_varint(self.offset, &mut buf);
        buf
    }

    /// Decodes a position produced by [`RecordPos::encode`]. Returns `None`
    /// if the buffer is malformed.
    pub fn decode(buf: &[u8]) -> Option<RecordPos> {
        if buf.len() < 4 {
            return None;
        }
        let file_id = LittleEndian::read_u32(&buf[0..4]);
        let (offset, _) = decode_varint(&buf[4..])?;
        Some(RecordPos { file_id, offset })
    }
}

/// Appends the LEB128 encoding of `v` to `buf`, returning the number of
/// bytes written. Negative values take the full 10 bytes; every length and
/// offset stored by the engine is non-negative.
pub fn encode_varint(v: i64, buf: &mut Vec<u8>) -> usize {
    let mut x = v as u64;
    let mut n = 0;
    loop {
        n += 1;
        if x >= 0x80 {
            buf.push((x as u8 & 0x7f) | 0x80);
            x >>= 7;
        } else {
            buf.push(x as u8);
            return n;
        }
    }
}

/// Decodes a LEB128 varint from the front of `buf`, returning the value and
/// the number of bytes consumed. `None` if the varint is unterminated within
/// `buf` or overlong.
pub fn decode_varint(buf: &[u8]) -> Option<(i64, usize)> {
    let mut x = 0u64;
    let mut shift = 0u32;
    for (i, &b) in buf.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        x |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Some((x as i64, i + 1));
        }
        shift += 7;
    }
    None
}

/// Serializes `record` into its on-disk form, returning the bytes and their
/// length.
///
/// Layout: `[crc32: u32 LE][type: u8][key_len: varint][value_len: varint]
/// [key][value]`, with the CRC computed over everything after itself.
pub fn encode_log_record(record: &LogRecord) -> (Vec<u8>, u64) {
    let mut buf =
        Vec::with_capacity(MAX_HEADER_SIZE + record.key.len() + record.value.len());

    // Reserve the CRC slot, filled last.
    buf.extend_from_slice(&[0u8; 4]);

    buf.push(record.rec_type as u8);
    encode_varint(record.key.len() as i64, &mut buf);
    encode_varint(record.value.len() as i64, &mut buf);
    buf.extend_from_slice(&record.key);
    buf.extend_from_slice(&record.value);

    let mut hasher = Crc32::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    LittleEndian::write_u32(&mut buf[0..4], crc);

    let size = buf.len() as u64;
    (buf, size)
}

/// A parsed record header.
pub(crate) struct RecordHeader {
    pub crc: u32,
    pub type_byte: u8,
    pub key_len: i64,
    pub value_len: i64,
    /// Bytes the header occupies on disk.
    pub size: usize,
}

/// Parses a header from `buf`, which holds at most [`MAX_HEADER_SIZE`] bytes
/// read at the record's offset (fewer near end-of-file). Returns `None` when
/// the window is too short to contain a full header; the caller treats that
/// as a truncated tail.
pub(crate) fn decode_header(buf: &[u8]) -> Option<RecordHeader> {
    if buf.len() < 5 {
        return None;
    }
    let crc = LittleEndian::read_u32(&buf[0..4]);
    let type_byte = buf[4];
    let mut idx = 5;
    let (key_len, n) = decode_varint(&buf[idx..])?;
    idx += n;
    let (value_len, n) = decode_varint(&buf[idx..])?;
    idx += n;
    Some(RecordHeader {
        crc,
        type_byte,
        key_len,
        value_len,
        size: idx,
    })
}
