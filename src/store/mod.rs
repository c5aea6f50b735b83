//! Storage collaborators the server reads through.
//!
//! A [`BlobStore`] returns parts of named objects; it is the only way archive
//! bytes are ever reached, and callers never ask it for a whole object. A
//! [`ConfigStore`] is a small string key/value lookup used to find which
//! archive to serve.

mod http;
mod local;
mod memory;

pub use http::HttpBlobStore;
pub use local::LocalBlobStore;
pub use memory::{MemoryBlobStore, MemoryConfigStore};

use anyhow::Result;
use async_trait::async_trait;

/// Part of an object to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `length` bytes starting at `offset`.
    Range { offset: u64, length: u64 },
    /// The last `n` bytes of the object.
    Suffix(u64),
}

impl ByteRange {
    /// Resolve against an object of `size` bytes into `(start, end)` with `end` exclusive.
    ///
    /// Returns `None` when the range does not lie entirely inside the object.
    pub fn bounds(&self, size: u64) -> Option<(u64, u64)> {
        match *self {
            ByteRange::Range { offset, length } => {
                let end = offset.checked_add(length)?;
                (end <= size).then_some((offset, end))
            }
            ByteRange::Suffix(n) => (n <= size).then(|| (size - n, size)),
        }
    }

    /// Value for an HTTP `Range` header, or `None` for an empty range.
    pub fn header_value(&self) -> Option<String> {
        match *self {
            ByteRange::Range { length: 0, .. } | ByteRange::Suffix(0) => None,
            ByteRange::Range { offset, length } => {
                Some(format!("bytes={}-{}", offset, offset + length - 1))
            }
            ByteRange::Suffix(n) => Some(format!("bytes=-{}", n)),
        }
    }

    /// Number of bytes the range asks for.
    pub fn len(&self) -> u64 {
        match *self {
            ByteRange::Range { length, .. } => length,
            ByteRange::Suffix(n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object storage that supports ranged reads by name.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read `range` of object `name`.
    ///
    /// Returns `Ok(None)` if the object does not exist or the range falls
    /// outside it.
    async fn get(&self, name: &str, range: ByteRange) -> Result<Option<Vec<u8>>>;
}

/// String key/value configuration lookup.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
}
