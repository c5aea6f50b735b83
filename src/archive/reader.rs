//! Reading archives through a [`BlobStore`].
//!
//! Only ranged reads are issued. Loading the index costs exactly two of
//! them: the 16-byte trailer as a suffix read, then the index range it
//! points at. Serving an entry costs one more.

use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::error::{ServeError, ServeResult};
use crate::store::{BlobStore, ByteRange};

use super::index::Index;
use super::structures::*;

/// Reads archive structures and entry payloads from a blob store.
pub struct ArchiveReader<B: BlobStore> {
    store: Arc<B>,
}

impl<B: BlobStore> ArchiveReader<B> {
    pub fn new(store: Arc<B>) -> Self {
        Self { store }
    }

    /// Fetch and decode the trailer of archive `name`.
    pub async fn read_trailer(&self, name: &str) -> ServeResult<Trailer> {
        let bytes = self
            .store
            .get(name, ByteRange::Suffix(Trailer::SIZE as u64))
            .await
            .map_err(ServeError::Store)?
            .ok_or_else(|| ServeError::BlobNotFound(name.to_string()))?;

        Ok(Trailer::from_bytes(&bytes)?)
    }

    /// Fetch the trailer, then the index it points at.
    pub async fn load_index(&self, name: &str) -> ServeResult<Index> {
        let trailer = self.read_trailer(name).await?;

        let range = ByteRange::Range {
            offset: trailer.index_offset,
            length: trailer.index_length,
        };
        let bytes = self
            .store
            .get(name, range)
            .await
            .map_err(ServeError::Store)?
            .ok_or_else(|| ServeError::BlobNotFound(name.to_string()))?;

        let index = Index::decode(&bytes, trailer.index_offset)?;
        log::info!(
            "loaded index of {}: {} entries, {} index bytes",
            name,
            index.len(),
            trailer.index_length
        );
        Ok(index)
    }

    /// Fetch the stored bytes of `entry`, exactly `[offset, offset + length)`.
    pub async fn fetch_entry_bytes(&self, name: &str, entry: &Entry) -> ServeResult<Vec<u8>> {
        let range = ByteRange::Range {
            offset: entry.offset,
            length: entry.length,
        };
        self.store
            .get(name, range)
            .await
            .map_err(ServeError::Store)?
            .ok_or_else(|| ServeError::BlobNotFound(name.to_string()))
    }
}

/// Undo the entry's stored encoding.
pub fn materialize(entry: &Entry, raw: Vec<u8>) -> ServeResult<Vec<u8>> {
    let decoded = match entry.encoding() {
        Encoding::Identity => return Ok(raw),
        Encoding::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .map(|_| out)
        }
        Encoding::Brotli => {
            let mut out = Vec::new();
            brotli::Decompressor::new(raw.as_slice(), 4096)
                .read_to_end(&mut out)
                .map(|_| out)
        }
    };

    decoded.map_err(|source| ServeError::Decompression {
        path: entry.path.clone(),
        source,
    })
}
