//! HTTP transport: range requests for content, plain GET for the index

use super::Requester;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::FileSummary;
use crate::retry::{with_retry, RetryConfig};
use crate::signature::decode_index;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Routes of a remote that serves the reference file and its index
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// URL of the raw file (range requests)
    pub content: Url,
    /// URL of the checksum index, without the block size query
    pub checksum: Url,
}

impl Endpoints {
    /// Derive `content` and `checksum` routes from a base URL.
    ///
    /// Relative resolution applies: a base with a path component needs a
    /// trailing slash to keep it.
    pub fn from_base(base: &str) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| Error::config(format!("invalid URL {}: {}", base, e)))?;
        let content = base
            .join("content")
            .map_err(|e| Error::config(format!("invalid content URL: {}", e)))?;
        let checksum = base
            .join("checksum")
            .map_err(|e| Error::config(format!("invalid checksum URL: {}", e)))?;
        Ok(Self { content, checksum })
    }

    /// Index URL for a given block size
    pub fn checksum_url(&self, block_size: usize) -> Url {
        let mut url = self.checksum.clone();
        url.query_pairs_mut()
            .append_pair("blockSize", &block_size.to_string());
        url
    }
}

/// Build the HTTP client shared by index and range requests
pub fn build_client(config: &Config) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| Error::config(format!("building HTTP client: {}", e)))
}

/// Fetches ranges with `Range: bytes=a-b` requests
#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: Client,
    url: Url,
}

impl HttpRequester {
    /// Create a requester for the file at `url`
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    /// URL of the reference file
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn fetch(&self, start: u64, end: u64) -> Result<Bytes> {
        if start >= end {
            return Ok(Bytes::new());
        }

        let range = format!("bytes={}-{}", start, end - 1);
        let resp = self
            .client
            .get(self.url.clone())
            .header(RANGE, &range)
            .send()
            .await
            .map_err(|e| Error::http(format!("requesting {} of {}", range, self.url), e))?;

        match resp.status() {
            StatusCode::PARTIAL_CONTENT => resp
                .bytes()
                .await
                .map_err(|e| Error::http(format!("reading {} of {}", range, self.url), e)),
            StatusCode::OK => {
                // Server ignored the range and sent the whole file
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::http(format!("reading {}", self.url), e))?;
                if (body.len() as u64) < end {
                    return Err(Error::transport(format!(
                        "full response of {} bytes does not cover {}",
                        body.len(),
                        range
                    )));
                }
                tracing::debug!(url = %self.url, %range, "Server ignored Range, slicing full body");
                Ok(body.slice(start as usize..end as usize))
            }
            status => Err(status_error(status, &range)),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn status_error(status: StatusCode, what: &str) -> Error {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Error::transport(format!("HTTP {} for {}", status, what))
    } else {
        Error::protocol(format!("HTTP {} for {}", status, what))
    }
}

async fn get_index_bytes(client: &Client, url: &Url) -> Result<Bytes> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| Error::http(format!("requesting {}", url), e))?;

    if resp.status() != StatusCode::OK {
        return Err(status_error(resp.status(), url.as_str()));
    }

    resp.bytes()
        .await
        .map_err(|e| Error::http(format!("reading {}", url), e))
}

/// Download and decode the checksum index for `block_size`.
///
/// The download is retried; decoding is not, since a malformed index will
/// not improve on a second read.
pub async fn fetch_summary(
    client: &Client,
    endpoints: &Endpoints,
    block_size: usize,
    retry: &RetryConfig,
) -> Result<FileSummary> {
    let url = endpoints.checksum_url(block_size);
    let url_ref = &url;

    let body = with_retry(retry, "checksum index", || async move {
        get_index_bytes(client, url_ref).await
    })
    .await?;

    let index = decode_index(&body[..])?;
    tracing::debug!(
        url = %url,
        file_size = index.file_size,
        blocks = index.len(),
        index_bytes = body.len(),
        "Decoded checksum index"
    );

    FileSummary::new(&index, block_size)
}
