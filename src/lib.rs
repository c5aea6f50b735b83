//! # rangefs
//!
//! Pack a directory of static files into one seekable archive and serve
//! files out of it with byte-range reads.
//!
//! The archive is payloads, then an index, then a 16-byte trailer that
//! points at the index. A server never downloads the whole archive: it reads
//! the trailer and the index once per archive, then one byte range per
//! request, from any object store that implements [`BlobStore`].
//!
//! ## Features
//!
//! - Deterministic builds from a directory tree, optionally gzip-compressed
//! - Index discovery with two ranged reads, cached per archive name
//! - `index.html` resolution for `/` and directory-like paths
//! - ETag / `If-None-Match` handling and split cache policy for HTML and assets
//! - Local directory, HTTP Range and in-memory blob stores
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use rangefs::{BuildOptions, LocalBlobStore, MemoryConfigStore, Request, Server, ServerConfig, build};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     build(Path::new("dist"), Path::new("out/site.rangefs"), &BuildOptions::default())?;
//!
//!     let blobs = Arc::new(LocalBlobStore::new("out"));
//!     let config: MemoryConfigStore = [("ARCHIVE_FILENAME", "site.rangefs")].into_iter().collect();
//!     let server = Server::new(blobs, Arc::new(config), ServerConfig::default());
//!
//!     let response = server.handle(&Request::get("/")).await;
//!     println!("{}", response.status);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub mod serve;
pub mod store;

pub use archive::{ArchiveReader, BuildOptions, Compression, Entry, Flags, Index, build};
pub use cli::Cli;
pub use error::{ArchiveError, ServeError};
pub use serve::{NameRefresh, Request, Response, Server, ServerConfig};
pub use store::{BlobStore, ByteRange, ConfigStore, HttpBlobStore, LocalBlobStore, MemoryBlobStore, MemoryConfigStore};
