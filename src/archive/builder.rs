use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ArchiveError, ArchiveResult};

use super::codec::encode_index;
use super::structures::*;

/// Options controlling how an archive is built.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub compression: Compression,
}

/// What a finished build wrote.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub entries: Vec<Entry>,
    pub trailer: Trailer,
    /// Total archive size: payloads + index + trailer.
    pub archive_size: u64,
}

impl BuildSummary {
    pub fn payload_bytes(&self) -> u64 {
        self.trailer.index_offset
    }
}

/// Pack every regular file under `input` into a single archive at `output`.
///
/// Files are visited in file-name order at each directory level, so the same
/// tree always produces byte-identical archives. The output is created or
/// truncated up front; a failure part-way leaves it unusable.
pub fn build(input: &Path, output: &Path, options: &BuildOptions) -> ArchiveResult<BuildSummary> {
    if !input.is_dir() {
        return Err(ArchiveError::InputDirMissing(input.to_path_buf()));
    }

    // A previous archive written into the input tree must not pack itself.
    let skip = output.canonicalize().ok();
    let files = collect_files(input, skip.as_deref())?;

    let out = File::create(output).map_err(|e| write_failure(output, e))?;
    let mut out = BufWriter::new(out);

    let flags = options.compression.flags();
    let mut offset = 0u64;
    let mut entries = Vec::with_capacity(files.len());

    for (path, physical) in files {
        let content = std::fs::read(&physical)?;
        let payload = match options.compression {
            Compression::None => content,
            Compression::Gzip => gzip(&content)?,
        };

        out.write_all(&payload)
            .map_err(|e| write_failure(output, e))?;

        log::debug!("packed {} at {} ({} bytes)", path, offset, payload.len());
        entries.push(Entry {
            path,
            offset,
            length: payload.len() as u64,
            flags,
        });
        offset += payload.len() as u64;
    }

    let index = encode_index(&entries)?;
    let trailer = Trailer {
        index_offset: offset,
        index_length: index.len() as u64,
    };

    out.write_all(&index)
        .and_then(|_| out.write_all(&trailer.to_bytes()))
        .and_then(|_| out.flush())
        .map_err(|e| write_failure(output, e))?;

    let archive_size = offset + index.len() as u64 + Trailer::SIZE as u64;
    log::info!(
        "built {} from {}: {} entries, {} bytes",
        output.display(),
        input.display(),
        entries.len(),
        archive_size
    );

    Ok(BuildSummary {
        entries,
        trailer,
        archive_size,
    })
}

/// Regular files under `root` as (archive path, filesystem path), in walk order.
///
/// `skip` is a canonical path left out of the walk.
fn collect_files(root: &Path, skip: Option<&Path>) -> ArchiveResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for ent in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let ent = ent?;
        if !ent.file_type().is_file() {
            continue;
        }
        if let Some(skip) = skip {
            if ent.path().canonicalize().is_ok_and(|p| p == skip) {
                log::debug!("skipping output archive {}", ent.path().display());
                continue;
            }
        }
        let path = archive_path(root, ent.path())?;
        if path.len() > MAX_PATH_LEN {
            return Err(ArchiveError::PathTooLong {
                len: path.len(),
                path,
            });
        }
        files.push((path, ent.into_path()));
    }
    Ok(files)
}

/// Path of `file` relative to `root`, joined with forward slashes.
///
/// Names that are not valid UTF-8 are rejected rather than rewritten, since
/// two of them could otherwise collapse onto the same key.
pub fn archive_path(root: &Path, file: &Path) -> ArchiveResult<String> {
    let rel = file.strip_prefix(root).map_err(|_| {
        ArchiveError::Decode(format!("{} is outside {}", file.display(), root.display()))
    })?;

    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .ok_or_else(|| ArchiveError::NonUtf8Path(file.to_path_buf()))
        })
        .collect::<ArchiveResult<Vec<_>>>()?;
    let path = parts.join("/");

    if path.is_empty() {
        return Err(ArchiveError::Decode("empty relative path".into()));
    }
    Ok(path)
}

fn gzip(content: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}

fn write_failure(path: &Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::OutputWriteFailure {
        path: path.to_path_buf(),
        source,
    }
}
