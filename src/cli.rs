use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rangefs")]
#[command(version)]
#[command(about = "Pack a static site into one archive and serve files from it with range reads", long_about = None)]
#[command(after_help = "Examples:\n  \
  rangefs build dist site.rangefs --gzip          pack dist/ with gzip\n  \
  rangefs list https://cdn.example.com/site.rangefs   list a remote archive\n  \
  rangefs get site.rangefs /about -o about.html   serve one path to a file")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an archive from a directory
    Build {
        /// Directory to pack
        #[arg(value_name = "INPUT_DIR")]
        input: PathBuf,

        /// Archive to create (overwritten if it exists)
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Gzip every file
        #[arg(long)]
        gzip: bool,

        /// Quiet mode
        #[arg(short = 'q')]
        quiet: bool,
    },

    /// List archive entries
    List {
        /// Archive path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Show offsets, lengths and encodings
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Serve a single request path out of an archive
    Get {
        /// Archive path or HTTP URL
        #[arg(value_name = "ARCHIVE")]
        archive: String,

        /// Request path, e.g. / or /css/site.css
        #[arg(value_name = "PATH")]
        path: String,

        /// Send a HEAD request instead of GET
        #[arg(long)]
        head: bool,

        /// ETag to send as If-None-Match
        #[arg(long, value_name = "ETAG")]
        if_none_match: Option<String>,

        /// Accept-Encoding to send, e.g. gzip
        #[arg(long, value_name = "ENCODING")]
        accept_encoding: Option<String>,

        /// Write the body to this file instead of stdout
        #[arg(short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,

        /// Do not print status and headers
        #[arg(short = 'q')]
        quiet: bool,
    },
}

/// Where an archive named on the command line lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveLocation {
    /// Directory holding the archive, and the archive's file name.
    Local { root: PathBuf, name: String },
    /// URL prefix of the archive, and its object name.
    Http { base_url: String, name: String },
}

impl ArchiveLocation {
    pub fn parse(archive: &str) -> anyhow::Result<Self> {
        if archive.starts_with("http://") || archive.starts_with("https://") {
            let (base_url, name) = archive
                .rsplit_once('/')
                .filter(|(_, name)| !name.is_empty())
                .ok_or_else(|| anyhow::anyhow!("URL has no object name: {archive}"))?;
            return Ok(Self::Http {
                base_url: base_url.to_string(),
                name: name.to_string(),
            });
        }

        let path = PathBuf::from(archive);
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("archive path has no file name: {archive}"))?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::Local { root, name })
    }

    pub fn name(&self) -> &str {
        match self {
            ArchiveLocation::Local { name, .. } | ArchiveLocation::Http { name, .. } => name,
        }
    }
}
