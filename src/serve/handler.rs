use reqwest::header::{
    ACCEPT_ENCODING, ALLOW, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG,
    HeaderMap, HeaderName, HeaderValue, IF_NONE_MATCH, VARY,
};
use reqwest::{Method, StatusCode};
use std::sync::Arc;

use crate::archive::{ArchiveReader, Encoding, Entry, Index, materialize};
use crate::error::{ServeError, ServeResult};
use crate::store::{BlobStore, ConfigStore};

use super::cache::{IndexCache, NameRefresh};
use super::metadata;

/// Config key holding the archive's object name.
pub const ARCHIVE_KEY: &str = "ARCHIVE_FILENAME";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Config store key whose value names the archive object.
    pub archive_key: String,
    pub name_refresh: NameRefresh,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            archive_key: ARCHIVE_KEY.to_string(),
            name_refresh: NameRefresh::default(),
        }
    }
}

impl ServerConfig {
    /// Configuration for a site keyed by hostname, reading `<host>:ARCHIVE_FILENAME`.
    pub fn for_host(host: &str) -> Self {
        Self {
            archive_key: format!("{host}:{ARCHIVE_KEY}"),
            ..Self::default()
        }
    }
}

/// An inbound request, reduced to what the server looks at.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Add a header, ignoring values that are not valid header text.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` for HEAD and 304 responses.
    pub body: Option<Vec<u8>>,
}

impl Response {
    fn text(status: StatusCode, message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            status,
            headers,
            body: Some(message.as_bytes().to_vec()),
        }
    }

    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Serves files out of an archive that lives in a blob store.
pub struct Server<B: BlobStore, C: ConfigStore> {
    reader: ArchiveReader<B>,
    config_store: Arc<C>,
    config: ServerConfig,
    cache: Arc<IndexCache>,
}

impl<B: BlobStore, C: ConfigStore> Server<B, C> {
    pub fn new(blobs: Arc<B>, config_store: Arc<C>, config: ServerConfig) -> Self {
        let cache = Arc::new(IndexCache::new(config.name_refresh));
        Self::with_cache(blobs, config_store, config, cache)
    }

    /// Build a server around an existing cache, e.g. one shared between servers.
    pub fn with_cache(
        blobs: Arc<B>,
        config_store: Arc<C>,
        config: ServerConfig,
        cache: Arc<IndexCache>,
    ) -> Self {
        Self {
            reader: ArchiveReader::new(blobs),
            config_store,
            config,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    /// Name of the archive object to serve, read from the config store.
    pub async fn resolve_archive_name(&self) -> ServeResult<String> {
        if let Some(name) = self.cache.cached_name() {
            return Ok(name);
        }

        let name = self
            .config_store
            .get(&self.config.archive_key)
            .await
            .map_err(ServeError::Store)?
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ServeError::ConfigMissing(self.config.archive_key.clone()))?;

        self.cache.store_name(&name);
        Ok(name)
    }

    /// Index of archive `name`, loading it on a cache miss.
    pub async fn ensure_index_loaded(&self, name: &str) -> ServeResult<Arc<Index>> {
        if let Some(index) = self.cache.get(name) {
            log::debug!("index cache hit for {}", name);
            return Ok(index);
        }

        let index = self.reader.load_index(name).await?;
        Ok(self.cache.insert(name, index))
    }

    /// Answer one request. Failures become error responses.
    pub async fn handle(&self, request: &Request) -> Response {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status();
                if status == StatusCode::NOT_FOUND {
                    log::debug!("{} {}: {}", request.method, request.path, err);
                    Response::text(status, "Not Found")
                } else {
                    log::error!("{} {}: {}", request.method, request.path, err);
                    Response::text(status, "Internal Server Error")
                }
            }
        }
    }

    async fn try_handle(&self, request: &Request) -> ServeResult<Response> {
        if request.method != Method::GET && request.method != Method::HEAD {
            let mut response = Response::text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
            response
                .headers
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return Ok(response);
        }

        let name = self.resolve_archive_name().await?;
        let index = self.ensure_index_loaded(&name).await?;
        let entry = index
            .resolve(&request.path)
            .ok_or_else(|| ServeError::PathNotFound(request.path.clone()))?;

        // Stored bytes go out as-is when the client accepts their encoding.
        let passthrough = entry
            .encoding()
            .token()
            .filter(|token| accepts_encoding(&request.headers, token));
        let served = if passthrough.is_some() {
            entry.encoding()
        } else {
            Encoding::Identity
        };

        let etag = metadata::etag(&name, entry, served);
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, header_value(&etag)?);
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static(metadata::cache_control(&entry.path)),
        );
        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));

        let not_modified = request
            .headers
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| metadata::if_none_match_matches(v, &etag));
        if not_modified {
            return Ok(Response {
                status: StatusCode::NOT_MODIFIED,
                headers,
                body: None,
            });
        }

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(metadata::content_type(&entry.path)),
        );
        if let Some(token) = passthrough {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(token));
        }

        if request.method == Method::HEAD {
            if passthrough.is_some() || entry.encoding() == Encoding::Identity {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(entry.length));
            }
            return Ok(Response {
                status: StatusCode::OK,
                headers,
                body: None,
            });
        }

        let body = self.read_body(&name, entry, passthrough.is_some()).await?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
        Ok(Response {
            status: StatusCode::OK,
            headers,
            body: Some(body),
        })
    }

    async fn read_body(&self, name: &str, entry: &Entry, passthrough: bool) -> ServeResult<Vec<u8>> {
        let raw = self
            .reader
            .fetch_entry_bytes(name, entry)
            .await
            .map_err(|e| match e {
                ServeError::BlobNotFound(_) => ServeError::PathNotFound(entry.path.clone()),
                other => other,
            })?;

        if passthrough {
            Ok(raw)
        } else {
            materialize(entry, raw)
        }
    }
}

fn header_value(value: &str) -> ServeResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ServeError::Decode(format!("header {value:?}: {e}")))
}

/// Whether `Accept-Encoding` allows `token`.
///
/// An item naming the coding decides on its own, so `gzip;q=0, *` refuses
/// gzip. `*` only applies to codings that are not listed.
fn accepts_encoding(headers: &HeaderMap, token: &str) -> bool {
    let mut wildcard = None;
    for item in headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
    {
        let mut parts = item.split(';').map(str::trim);
        let coding = parts.next().unwrap_or_default();
        let accepted = !parts.any(|p| {
            p.strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        });

        if coding.eq_ignore_ascii_case(token) {
            return accepted;
        }
        if coding == "*" {
            wildcard = Some(accepted);
        }
    }
    wildcard.unwrap_or(false)
}
