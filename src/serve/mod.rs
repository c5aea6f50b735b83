//! Serving archive entries as HTTP-shaped responses.
//!
//! A request goes through these states:
//!
//! 1. Resolve the archive name from the config store
//! 2. Load the index, unless the cache already holds it for that name
//! 3. Resolve the request path to an entry, or 404
//! 4. Answer 304 if `If-None-Match` matches the entry's ETag
//! 5. Answer HEAD with headers only, without fetching the payload
//! 6. Otherwise fetch the entry's byte range, decode it and answer 200
//!
//! I/O or decode failures at any step become a 500.

pub mod cache;
pub mod handler;
pub mod metadata;

pub use cache::{IndexCache, NameRefresh};
pub use handler::{ARCHIVE_KEY, Request, Response, Server, ServerConfig};
