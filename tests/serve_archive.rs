use anyhow::Result;
use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG,
    IF_NONE_MATCH,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use rangefs::archive::{Trailer, encode_index};
use rangefs::serve::ARCHIVE_KEY;
use rangefs::{
    BuildOptions, Compression, Entry, Flags, LocalBlobStore, MemoryBlobStore, MemoryConfigStore,
    NameRefresh, Request, Server, ServerConfig, build,
};

const SITE: &[(&str, &[u8])] = &[
    ("index.html", b"<h1>hi</h1>\n"),
    ("css/site.css", b"body{}\n\n"),
    ("about/index.html", b"<p>about</p>"),
    ("blog.html", b"<p>blog</p>"),
    ("LICENSE", b"MIT"),
];

fn write_tree(root: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    for (path, content) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, content)?;
    }
    Ok(())
}

/// Build `files` into an archive and return its bytes.
fn archive_bytes(files: &[(&str, &[u8])], compression: Compression) -> Result<Vec<u8>> {
    let temp = tempdir()?;
    let input = temp.path().join("dist");
    write_tree(&input, files)?;
    let output = temp.path().join("site.rangefs");
    build(&input, &output, &BuildOptions { compression })?;
    Ok(std::fs::read(output)?)
}

fn config(name: &str) -> Arc<MemoryConfigStore> {
    Arc::new([(ARCHIVE_KEY, name)].into_iter().collect())
}

fn memory_server(
    archive: Vec<u8>,
) -> (
    Arc<MemoryBlobStore>,
    Arc<MemoryConfigStore>,
    Server<MemoryBlobStore, MemoryConfigStore>,
) {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert("site.rangefs", archive);
    let config = config("site.rangefs");
    let server = Server::new(blobs.clone(), config.clone(), ServerConfig::default());
    (blobs, config, server)
}

#[tokio::test]
async fn serves_site_from_local_directory() -> Result<()> {
    let temp = tempdir()?;
    let input = temp.path().join("dist");
    write_tree(&input, &SITE[..2])?;
    let store_root = temp.path().join("bucket");
    std::fs::create_dir_all(&store_root)?;
    build(
        &input,
        &store_root.join("site.rangefs"),
        &BuildOptions::default(),
    )?;

    let server = Server::new(
        Arc::new(LocalBlobStore::new(&store_root)),
        config("site.rangefs"),
        ServerConfig::default(),
    );

    let root = server.handle(&Request::get("/")).await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.body.as_deref(), Some(&b"<h1>hi</h1>\n"[..]));
    assert!(root.header(CONTENT_TYPE).unwrap().starts_with("text/html"));
    assert_eq!(root.header(CONTENT_LENGTH), Some("12"));

    let css = server.handle(&Request::get("/css/site.css")).await;
    assert_eq!(css.status, StatusCode::OK);
    assert_eq!(css.body.as_deref(), Some(&b"body{}\n\n"[..]));
    assert!(css.header(CONTENT_TYPE).unwrap().starts_with("text/css"));

    let missing = server.handle(&Request::get("/missing")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn resolves_directory_and_trailing_slash_paths() -> Result<()> {
    let (_, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    for path in ["/about", "/about/", "about"] {
        let response = server.handle(&Request::get(path)).await;
        assert_eq!(response.status, StatusCode::OK, "{path}");
        assert_eq!(response.body.as_deref(), Some(&b"<p>about</p>"[..]), "{path}");
    }

    let blog = server.handle(&Request::get("/blog.html")).await;
    assert_eq!(blog.body.as_deref(), Some(&b"<p>blog</p>"[..]));

    let license = server.handle(&Request::get("/LICENSE")).await;
    assert_eq!(license.status, StatusCode::OK);
    assert_eq!(license.header(CONTENT_TYPE), Some("application/octet-stream"));

    for path in ["/blog", "/contact.html", "/about/missing"] {
        let response = server.handle(&Request::get(path)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn conditional_get_returns_not_modified() -> Result<()> {
    let (_, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    let first = server.handle(&Request::get("/")).await;
    let etag = first.header(ETAG).unwrap().to_string();

    let again = server.handle(&Request::get("/")).await;
    assert_eq!(again.header(ETAG), Some(etag.as_str()));

    let cached = server
        .handle(&Request::get("/").with_header(IF_NONE_MATCH, &etag))
        .await;
    assert_eq!(cached.status, StatusCode::NOT_MODIFIED);
    assert!(cached.body.is_none());
    assert_eq!(cached.header(ETAG), Some(etag.as_str()));

    let stale = server
        .handle(&Request::get("/").with_header(IF_NONE_MATCH, "\"something-else\""))
        .await;
    assert_eq!(stale.status, StatusCode::OK);
    assert_eq!(stale.body.as_deref(), Some(&b"<h1>hi</h1>\n"[..]));

    let other = server.handle(&Request::get("/css/site.css")).await;
    assert_ne!(other.header(ETAG), Some(etag.as_str()));
    Ok(())
}

#[tokio::test]
async fn html_revalidates_and_assets_are_immutable() -> Result<()> {
    let (_, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    let html = server.handle(&Request::get("/about")).await;
    assert!(html.header(CACHE_CONTROL).unwrap().contains("must-revalidate"));

    let css = server.handle(&Request::get("/css/site.css")).await;
    let cache_control = css.header(CACHE_CONTROL).unwrap();
    assert!(cache_control.contains("immutable"));
    assert!(cache_control.contains("max-age=31536000"));
    Ok(())
}

#[tokio::test]
async fn index_is_loaded_once_with_two_reads() -> Result<()> {
    let (blobs, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    server.handle(&Request::get("/")).await;
    assert_eq!(blobs.reads(), 3);

    server.handle(&Request::get("/css/site.css")).await;
    server.handle(&Request::get("/about")).await;
    assert_eq!(blobs.reads(), 5);

    // Misses are answered from the index alone.
    server.handle(&Request::get("/missing")).await;
    assert_eq!(blobs.reads(), 5);
    Ok(())
}

#[tokio::test]
async fn head_and_not_modified_skip_the_payload_read() -> Result<()> {
    let (blobs, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    let head = server.handle(&Request::head("/")).await;
    assert_eq!(head.status, StatusCode::OK);
    assert!(head.body.is_none());
    assert!(head.header(ETAG).is_some());
    assert_eq!(head.header(CONTENT_LENGTH), Some("12"));
    assert!(head.header(CONTENT_TYPE).unwrap().starts_with("text/html"));
    assert_eq!(blobs.reads(), 2);

    let etag = head.header(ETAG).unwrap().to_string();
    let not_modified = server
        .handle(&Request::get("/").with_header(IF_NONE_MATCH, &etag))
        .await;
    assert_eq!(not_modified.status, StatusCode::NOT_MODIFIED);
    assert_eq!(blobs.reads(), 2);

    let missing = server.handle(&Request::head("/missing")).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn rotating_the_archive_name_reloads_the_index() -> Result<()> {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(
        "v1.rangefs",
        archive_bytes(&[("index.html", b"one")], Compression::None)?,
    );
    blobs.insert(
        "v2.rangefs",
        archive_bytes(&[("index.html", b"two!")], Compression::None)?,
    );
    let config = config("v1.rangefs");
    let server = Server::new(blobs.clone(), config.clone(), ServerConfig::default());

    let first = server.handle(&Request::get("/")).await;
    assert_eq!(first.body.as_deref(), Some(&b"one"[..]));

    config.set(ARCHIVE_KEY, "v2.rangefs");
    let second = server.handle(&Request::get("/")).await;
    assert_eq!(second.body.as_deref(), Some(&b"two!"[..]));
    assert_ne!(first.header(ETAG), second.header(ETAG));
    assert_eq!(blobs.reads(), 6);
    assert_eq!(server.cache().current_archive().as_deref(), Some("v2.rangefs"));
    Ok(())
}

#[tokio::test]
async fn load_once_policy_ignores_later_name_changes() -> Result<()> {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(
        "v1.rangefs",
        archive_bytes(&[("index.html", b"one")], Compression::None)?,
    );
    let config = config("v1.rangefs");
    let server = Server::new(
        blobs.clone(),
        config.clone(),
        ServerConfig {
            name_refresh: NameRefresh::Never,
            ..ServerConfig::default()
        },
    );

    server.handle(&Request::get("/")).await;
    config.set(ARCHIVE_KEY, "v2.rangefs");
    let response = server.handle(&Request::get("/")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_deref(), Some(&b"one"[..]));
    Ok(())
}

#[tokio::test]
async fn concurrent_cold_requests_all_succeed() -> Result<()> {
    let (blobs, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    let (root, about, css) = (
        Request::get("/"),
        Request::get("/about"),
        Request::get("/css/site.css"),
    );
    let (a, b, c) = tokio::join!(
        server.handle(&root),
        server.handle(&about),
        server.handle(&css),
    );
    assert_eq!(a.status, StatusCode::OK);
    assert_eq!(b.status, StatusCode::OK);
    assert_eq!(c.status, StatusCode::OK);
    assert!(blobs.reads() <= 9);

    server.handle(&Request::get("/blog.html")).await;
    assert!(blobs.reads() <= 10);
    Ok(())
}

#[tokio::test]
async fn gzip_entries_are_decoded_or_passed_through() -> Result<()> {
    let (_, _, server) = memory_server(archive_bytes(SITE, Compression::Gzip)?);

    let plain = server.handle(&Request::get("/")).await;
    assert_eq!(plain.status, StatusCode::OK);
    assert_eq!(plain.body.as_deref(), Some(&b"<h1>hi</h1>\n"[..]));
    assert!(plain.header(CONTENT_ENCODING).is_none());

    let encoded = server
        .handle(&Request::get("/").with_header(ACCEPT_ENCODING, "gzip, br"))
        .await;
    assert_eq!(encoded.header(CONTENT_ENCODING), Some("gzip"));
    let body = encoded.body.clone().unwrap();
    assert_ne!(body, b"<h1>hi</h1>\n");

    let mut decoded = Vec::new();
    std::io::Read::read_to_end(
        &mut flate2::read::GzDecoder::new(body.as_slice()),
        &mut decoded,
    )?;
    assert_eq!(decoded, b"<h1>hi</h1>\n");
    assert_ne!(plain.header(ETAG), encoded.header(ETAG));
    Ok(())
}

#[tokio::test]
async fn conditional_get_uses_the_tag_of_the_served_encoding() -> Result<()> {
    let (_, _, server) = memory_server(archive_bytes(SITE, Compression::Gzip)?);

    let plain = server.handle(&Request::get("/")).await;
    let plain_tag = plain.header(ETAG).unwrap().to_string();
    let encoded = server
        .handle(&Request::get("/").with_header(ACCEPT_ENCODING, "gzip"))
        .await;
    let gzip_tag = encoded.header(ETAG).unwrap().to_string();
    assert!(gzip_tag.ends_with("-gz\""));

    // A decoded copy does not validate a request that would get gzip bytes.
    let response = server
        .handle(
            &Request::get("/")
                .with_header(ACCEPT_ENCODING, "gzip")
                .with_header(IF_NONE_MATCH, &plain_tag),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header(CONTENT_ENCODING), Some("gzip"));

    let response = server
        .handle(
            &Request::get("/")
                .with_header(ACCEPT_ENCODING, "gzip")
                .with_header(IF_NONE_MATCH, &gzip_tag),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    assert_eq!(response.header(ETAG), Some(gzip_tag.as_str()));

    let response = server
        .handle(&Request::get("/").with_header(IF_NONE_MATCH, &gzip_tag))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header(CONTENT_ENCODING).is_none());
    Ok(())
}

#[tokio::test]
async fn refused_encoding_is_decoded_even_with_wildcard() -> Result<()> {
    let (_, _, server) = memory_server(archive_bytes(SITE, Compression::Gzip)?);

    let response = server
        .handle(&Request::get("/").with_header(ACCEPT_ENCODING, "gzip;q=0, *"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header(CONTENT_ENCODING).is_none());
    assert_eq!(response.body.as_deref(), Some(&b"<h1>hi</h1>\n"[..]));
    Ok(())
}

/// Hand-assemble an archive, since the builder never writes brotli.
fn brotli_archive(path: &str, content: &[u8]) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut payload, 4096, 5, 22);
        writer.write_all(content)?;
    }

    let entries = vec![Entry {
        path: path.to_string(),
        offset: 0,
        length: payload.len() as u64,
        flags: Flags::BROTLI,
    }];
    let index = encode_index(&entries)?;
    let trailer = Trailer {
        index_offset: payload.len() as u64,
        index_length: index.len() as u64,
    };

    let mut archive = payload;
    archive.extend_from_slice(&index);
    archive.extend_from_slice(&trailer.to_bytes());
    Ok(archive)
}

#[tokio::test]
async fn brotli_entries_are_served() -> Result<()> {
    let (_, _, server) = memory_server(brotli_archive("app.js", b"console.log('br')")?);

    let plain = server.handle(&Request::get("/app.js")).await;
    assert_eq!(plain.status, StatusCode::OK);
    assert_eq!(plain.body.as_deref(), Some(&b"console.log('br')"[..]));

    let encoded = server
        .handle(&Request::get("/app.js").with_header(ACCEPT_ENCODING, "br"))
        .await;
    assert_eq!(encoded.header(CONTENT_ENCODING), Some("br"));
    Ok(())
}

#[tokio::test]
async fn corrupt_payload_is_a_server_error() -> Result<()> {
    let mut archive = archive_bytes(&[("index.html", b"<p>gzip me</p>")], Compression::Gzip)?;
    archive[0] ^= 0xFF;
    let (_, _, server) = memory_server(archive);

    let response = server.handle(&Request::get("/")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn broken_archives_and_config_are_server_errors() -> Result<()> {
    // No archive name configured.
    let blobs = Arc::new(MemoryBlobStore::new());
    let server = Server::new(
        blobs.clone(),
        Arc::new(MemoryConfigStore::new()),
        ServerConfig::default(),
    );
    let response = server.handle(&Request::get("/")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(blobs.reads(), 0);

    // Configured name with no such object.
    let server = Server::new(blobs.clone(), config("gone.rangefs"), ServerConfig::default());
    let response = server.handle(&Request::get("/")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    // Trailer pointing past the end of the archive.
    let mut archive = archive_bytes(SITE, Compression::None)?;
    let len = archive.len();
    archive[len - 16..len - 8].copy_from_slice(&(len as u64 * 2).to_le_bytes());
    let (_, _, server) = memory_server(archive);
    let response = server.handle(&Request::get("/")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

    // Archive shorter than a trailer.
    let (_, _, server) = memory_server(vec![1, 2, 3]);
    let response = server.handle(&Request::get("/")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn vanished_archive_after_index_load_is_not_found() -> Result<()> {
    let (blobs, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);
    assert_eq!(server.handle(&Request::get("/")).await.status, StatusCode::OK);

    blobs.remove("site.rangefs");
    let response = server.handle(&Request::get("/css/site.css")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn other_methods_are_rejected() -> Result<()> {
    let (blobs, _, server) = memory_server(archive_bytes(SITE, Compression::None)?);

    let response = server
        .handle(&Request::new(reqwest::Method::POST, "/"))
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.header(reqwest::header::ALLOW), Some("GET, HEAD"));
    assert_eq!(blobs.reads(), 0);
    Ok(())
}
