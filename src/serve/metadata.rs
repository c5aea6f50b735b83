//! Response metadata derived from an entry: content type, caching policy and ETag.

use crate::archive::{Encoding, Entry};

/// Content type for extensions missing from [`CONTENT_TYPES`].
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `Cache-Control` for HTML, which changes on every deploy.
pub const HTML_CACHE_CONTROL: &str = "public, max-age=0, must-revalidate";

/// `Cache-Control` for assets, whose names are expected to change with their content.
pub const ASSET_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Lowercase extension to MIME type.
pub const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "application/javascript; charset=utf-8"),
    ("mjs", "application/javascript; charset=utf-8"),
    ("json", "application/json; charset=utf-8"),
    ("map", "application/json; charset=utf-8"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("eot", "application/vnd.ms-fontobject"),
    ("xml", "application/xml"),
    ("txt", "text/plain; charset=utf-8"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
];

/// Lowercased extension of the last path segment, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() && !name[1..].contains('.') {
        // dotfile such as `.htaccess`
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn content_type(path: &str) -> &'static str {
    extension(path)
        .and_then(|ext| {
            CONTENT_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

pub fn is_html(path: &str) -> bool {
    matches!(extension(path).as_deref(), Some("html" | "htm"))
}

pub fn cache_control(path: &str) -> &'static str {
    if is_html(path) {
        HTML_CACHE_CONTROL
    } else {
        ASSET_CACHE_CONTROL
    }
}

/// Strong ETag from the entry's identity inside a named archive.
///
/// The checksum covers the archive name and entry path; offset and length
/// are appended verbatim. Rebuilding under a new archive name changes every tag.
/// `served` is the encoding of the bytes actually sent, so a stored gzip body
/// and its decoded form never share a tag.
pub fn etag(archive: &str, entry: &Entry, served: Encoding) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(archive.as_bytes());
    hasher.update(&[0]);
    hasher.update(entry.path.as_bytes());
    let suffix = match served {
        Encoding::Identity => "",
        Encoding::Gzip => "-gz",
        Encoding::Brotli => "-br",
    };
    format!(
        "\"{:08x}-{:x}-{:x}{}\"",
        hasher.finalize(),
        entry.offset,
        entry.length,
        suffix
    )
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Accepts `*`, comma-separated lists, and weak (`W/`) forms of the tag.
pub fn if_none_match_matches(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}
