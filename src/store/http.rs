use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{BlobStore, ByteRange};
use anyhow::{Result, bail};

/// Blob store reached over HTTP; object `name` lives at `<base_url>/<name>`.
///
/// Every read is a single `Range` request. The server must answer with
/// `206 Partial Content`.
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Payload bytes received from range responses so far.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name.trim_start_matches('/'))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn get(&self, name: &str, range: ByteRange) -> Result<Option<Vec<u8>>> {
        let Some(header) = range.header_value() else {
            return Ok(Some(Vec::new()));
        };
        let url = self.object_url(name);
        let expected = range.len() as usize;

        let mut retry_count = 0;
        loop {
            let result = self
                .client
                .get(&url)
                .header(reqwest::header::RANGE, &header)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    match resp.status() {
                        StatusCode::PARTIAL_CONTENT => {}
                        StatusCode::NOT_FOUND | StatusCode::RANGE_NOT_SATISFIABLE => {
                            return Ok(None);
                        }
                        status => bail!("HTTP request for {} failed with status: {}", url, status),
                    }

                    let bytes = resp.bytes().await?;
                    self.transferred_bytes
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);

                    // A short suffix read means the object is smaller than asked for.
                    if bytes.len() != expected {
                        if matches!(range, ByteRange::Suffix(_)) && bytes.len() < expected {
                            return Ok(None);
                        }
                        bail!(
                            "{} returned {} bytes for {}, expected {}",
                            url,
                            bytes.len(),
                            header,
                            expected
                        );
                    }
                    return Ok(Some(bytes.to_vec()));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded for {}", url);
                    }
                    log::warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
