//! Main entry point for the rangefs CLI application.
//!
//! Builds archives from directories, lists them, and serves single request
//! paths out of local or remote archives through the same handler a server
//! would use.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use rangefs::cli::{ArchiveLocation, Command};
use rangefs::serve::ARCHIVE_KEY;
use rangefs::{
    ArchiveReader, BlobStore, BuildOptions, Cli, Compression, HttpBlobStore, LocalBlobStore,
    MemoryConfigStore, NameRefresh, Request, Server, ServerConfig, build,
};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the subcommand. For
/// archives given as HTTP URLs, the number of bytes pulled over the network
/// is reported afterwards.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            input,
            output,
            gzip,
            quiet,
        } => run_build(&input, &output, gzip, quiet),
        Command::List { archive, verbose } => match ArchiveLocation::parse(&archive)? {
            ArchiveLocation::Local { root, name } => {
                list_entries(Arc::new(LocalBlobStore::new(root)), &name, verbose).await
            }
            ArchiveLocation::Http { base_url, name } => {
                let store = Arc::new(HttpBlobStore::new(base_url)?);
                list_entries(store.clone(), &name, verbose).await?;
                if verbose {
                    eprintln!("\nTotal bytes transferred: {}", format_size(store.transferred_bytes()));
                }
                Ok(())
            }
        },
        Command::Get {
            archive,
            path,
            head,
            if_none_match,
            accept_encoding,
            output,
            quiet,
        } => {
            let mut request = if head {
                Request::head(path)
            } else {
                Request::get(path)
            };
            if let Some(tag) = if_none_match {
                request = request.with_header(reqwest::header::IF_NONE_MATCH, &tag);
            }
            if let Some(enc) = accept_encoding {
                request = request.with_header(reqwest::header::ACCEPT_ENCODING, &enc);
            }

            match ArchiveLocation::parse(&archive)? {
                ArchiveLocation::Local { root, name } => {
                    let store = Arc::new(LocalBlobStore::new(root));
                    get_path(store, &name, &request, output.as_deref(), quiet).await
                }
                ArchiveLocation::Http { base_url, name } => {
                    let store = Arc::new(HttpBlobStore::new(base_url)?);
                    let result =
                        get_path(store.clone(), &name, &request, output.as_deref(), quiet).await;
                    if !quiet {
                        eprintln!("Total bytes transferred: {}", format_size(store.transferred_bytes()));
                    }
                    result
                }
            }
        }
    }
}

/// Build an archive and print a summary.
fn run_build(input: &Path, output: &Path, gzip: bool, quiet: bool) -> Result<()> {
    let options = BuildOptions {
        compression: if gzip {
            Compression::Gzip
        } else {
            Compression::None
        },
    };

    let summary = build(input, output, &options)?;

    if !quiet {
        println!(
            "Built {} from {}: {} files, {} payload, {} total",
            output.display(),
            input.display(),
            summary.entries.len(),
            format_size(summary.payload_bytes()),
            format_size(summary.archive_size)
        );
    }
    Ok(())
}

/// List entries of archive `name`.
///
/// Only the trailer and the index are read.
async fn list_entries<B: BlobStore>(store: Arc<B>, name: &str, verbose: bool) -> Result<()> {
    let reader = ArchiveReader::new(store);
    let index = reader.load_index(name).await?;

    if verbose {
        println!("{:>10}  {:>10}  {:>8}  Name", "Offset", "Length", "Encoding");
        println!("{}", "-".repeat(60));
    }

    let mut total = 0u64;
    for entry in index.entries() {
        if verbose {
            println!(
                "{:>10}  {:>10}  {:>8}  {}",
                entry.offset,
                entry.length,
                entry.encoding().token().unwrap_or("identity"),
                entry.path
            );
            total += entry.length;
        } else {
            println!("{}", entry.path);
        }
    }

    if verbose {
        println!("{}", "-".repeat(60));
        println!("{:>10}  {:>10}  {:>8}  {} files", "", total, "", index.len());
    }

    Ok(())
}

/// Run one request against archive `name` and write out the response.
///
/// Status and headers go to stderr, the body to `output` or stdout.
async fn get_path<B: BlobStore>(
    store: Arc<B>,
    name: &str,
    request: &Request,
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let config: MemoryConfigStore = [(ARCHIVE_KEY, name)].into_iter().collect();
    let server = Server::new(
        store,
        Arc::new(config),
        ServerConfig {
            name_refresh: NameRefresh::Never,
            ..ServerConfig::default()
        },
    );

    let response = server.handle(request).await;

    if !quiet {
        eprintln!("{}", response.status);
        for (key, value) in &response.headers {
            eprintln!("{}: {}", key, value.to_str().unwrap_or("<binary>"));
        }
    }

    if response.status.is_client_error() || response.status.is_server_error() {
        bail!("{} {} failed with status {}", request.method, request.path, response.status);
    }

    if let Some(body) = response.body {
        match output {
            Some(path) => tokio::fs::write(path, &body).await?,
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(&body).await?;
                stdout.flush().await?;
            }
        }
    }

    Ok(())
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
