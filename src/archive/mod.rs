//! The rangefs archive container.
//!
//! ## Layout
//!
//! An archive is the concatenation of:
//! 1. Each file's payload, stored raw or compressed, back to back
//! 2. The index: entry count, then `(path, offset, length, flags)` per entry
//! 3. A fixed 16-byte trailer holding the index offset and length
//!
//! Because the trailer always occupies the last 16 bytes, a reader can find
//! the index with one suffix read and load it with one more, which makes the
//! format a good fit for object stores that serve byte ranges.
//!
//! ## Components
//!
//! - [`structures`]: entries, flags and the trailer
//! - [`codec`]: byte encoding of the index and trailer
//! - [`builder`]: packs a directory into an archive
//! - [`index`]: in-memory index and request path resolution
//! - [`reader`]: ranged reads of the index and entry payloads

pub mod builder;
pub mod codec;
pub mod index;
pub mod reader;
pub mod structures;

pub use builder::{BuildOptions, BuildSummary, build};
pub use codec::{decode_index, encode_index};
pub use index::{INDEX_DOCUMENT, Index, normalize_request_path};
pub use reader::{ArchiveReader, materialize};
pub use structures::*;
