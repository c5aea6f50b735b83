use std::collections::HashMap;

use crate::error::{ArchiveError, ArchiveResult};

use super::codec::decode_index;
use super::structures::Entry;

/// Document served for directory-like paths.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Parsed archive index: entries in stored order plus a path lookup table.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: Vec<Entry>,
    by_path: HashMap<String, usize>,
}

impl Index {
    pub fn new(entries: Vec<Entry>) -> Self {
        let by_path = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();
        Self { entries, by_path }
    }

    /// Decode index bytes and check every entry lies before `index_offset`.
    pub fn decode(data: &[u8], index_offset: u64) -> ArchiveResult<Self> {
        let entries = decode_index(data)?;
        if let Some(bad) = entries
            .iter()
            .find(|e| e.end().is_none_or(|end| end > index_offset))
        {
            return Err(ArchiveError::Decode(format!(
                "entry {} ({}+{}) overlaps the index at {index_offset}",
                bad.path, bad.offset, bad.length
            )));
        }
        Ok(Self::new(entries))
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a request path onto an entry.
    ///
    /// The empty path is the root document. A path without a `.` that has no
    /// entry of its own is retried as a directory (`<path>/index.html`).
    pub fn resolve(&self, request_path: &str) -> Option<&Entry> {
        let path = normalize_request_path(request_path);
        if path.is_empty() {
            return self.get(INDEX_DOCUMENT);
        }

        if let Some(entry) = self.get(path) {
            return Some(entry);
        }

        if !path.contains('.') {
            let dir_index = format!("{path}/{INDEX_DOCUMENT}");
            log::debug!("{path} not found, trying {dir_index}");
            return self.get(&dir_index);
        }

        None
    }
}

/// Strip one leading and one trailing `/`.
pub fn normalize_request_path(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}
