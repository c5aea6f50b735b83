//! Binary encoding of the index and trailer.
//!
//! ```text
//! index   := entry_count:u32 index_entry*
//! entry   := path_len:u16 path[path_len] offset:u64 length:u64 flags:u8
//! trailer := index_offset:u64 index_length:u64
//! ```
//!
//! All integers are little-endian. Nothing here performs I/O.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{ArchiveError, ArchiveResult};

use super::structures::*;

/// Serialize entries into index bytes.
///
/// Fails with [`ArchiveError::PathTooLong`] if a path does not fit the 16-bit length field.
pub fn encode_index(entries: &[Entry]) -> ArchiveResult<Vec<u8>> {
    let count = u32::try_from(entries.len())
        .map_err(|_| ArchiveError::Decode(format!("too many entries: {}", entries.len())))?;

    let body: usize = entries
        .iter()
        .map(|e| INDEX_ENTRY_FIXED_SIZE + e.path.len())
        .sum();
    let mut buf = Vec::with_capacity(INDEX_HEADER_SIZE + body);

    buf.write_u32::<LittleEndian>(count)?;
    for entry in entries {
        let path = entry.path.as_bytes();
        if path.len() > MAX_PATH_LEN {
            return Err(ArchiveError::PathTooLong {
                path: entry.path.clone(),
                len: path.len(),
            });
        }
        buf.write_u16::<LittleEndian>(path.len() as u16)?;
        buf.extend_from_slice(path);
        buf.write_u64::<LittleEndian>(entry.offset)?;
        buf.write_u64::<LittleEndian>(entry.length)?;
        buf.write_u8(entry.flags.bits())?;
    }

    Ok(buf)
}

/// Parse index bytes back into entries, in stored order.
pub fn decode_index(data: &[u8]) -> ArchiveResult<Vec<Entry>> {
    let mut cursor = Cursor::new(data);

    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated("entry count"))? as usize;

    // Every entry needs at least its fixed fields, so a huge count on a short
    // buffer is rejected before allocating for it.
    let remaining = data.len() - INDEX_HEADER_SIZE;
    if count > remaining / INDEX_ENTRY_FIXED_SIZE {
        return Err(ArchiveError::Decode(format!(
            "index claims {count} entries but holds only {remaining} bytes"
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        entries.push(decode_entry(&mut cursor).map_err(|e| match e {
            ArchiveError::Decode(msg) => ArchiveError::Decode(format!("entry {i}: {msg}")),
            other => other,
        })?);
    }

    if cursor.position() as usize != data.len() {
        return Err(ArchiveError::Decode(format!(
            "{} trailing bytes after last index entry",
            data.len() - cursor.position() as usize
        )));
    }

    Ok(entries)
}

fn decode_entry(cursor: &mut Cursor<&[u8]>) -> ArchiveResult<Entry> {
    let path_len = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| truncated("path length"))? as usize;

    let mut path_bytes = vec![0u8; path_len];
    cursor
        .read_exact(&mut path_bytes)
        .map_err(|_| truncated("path"))?;
    let path = String::from_utf8(path_bytes)
        .map_err(|_| ArchiveError::Decode("path is not utf-8".into()))?;

    let offset = cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| truncated("offset"))?;
    let length = cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| truncated("length"))?;
    let flags = cursor.read_u8().map_err(|_| truncated("flags"))?;

    Ok(Entry {
        path,
        offset,
        length,
        flags: Flags(flags),
    })
}

fn truncated(field: &str) -> ArchiveError {
    ArchiveError::Decode(format!("index truncated while reading {field}"))
}

impl Trailer {
    pub fn to_bytes(&self) -> [u8; Trailer::SIZE] {
        let mut out = [0u8; Trailer::SIZE];
        out[..8].copy_from_slice(&self.index_offset.to_le_bytes());
        out[8..].copy_from_slice(&self.index_length.to_le_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> ArchiveResult<Self> {
        if data.len() != Self::SIZE {
            return Err(ArchiveError::Decode(format!(
                "trailer must be {} bytes, got {}",
                Self::SIZE,
                data.len()
            )));
        }

        let mut cursor = Cursor::new(data);
        Ok(Self {
            index_offset: cursor.read_u64::<LittleEndian>()?,
            index_length: cursor.read_u64::<LittleEndian>()?,
        })
    }
}
