//! HTTP endpoints for a reference file
//!
//! `GET /content` serves the file with single-range support.
//! `GET /checksum?blockSize=N` serves its checksum index.

use crate::config::MAX_BLOCK_SIZE;
use crate::error::{Error, Result};
use crate::mmap::LockedMmap;
use crate::requester::local::read_range;
use crate::signature::{checksum_slice, encode_index_to_vec};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::future::Future;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct ServeState {
    path: Arc<PathBuf>,
    default_block_size: usize,
}

impl ServeState {
    /// Serve `path`; `/checksum` without a query uses `default_block_size`
    pub fn new(path: impl Into<PathBuf>, default_block_size: usize) -> Self {
        Self {
            path: Arc::new(path.into()),
            default_block_size,
        }
    }

    /// The served file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Deserialize)]
struct ChecksumParams {
    #[serde(rename = "blockSize")]
    block_size: Option<usize>,
}

/// Routes for the reference file
pub fn router(state: ServeState) -> Router {
    Router::new()
        .route("/content", get(content_handler))
        .route("/checksum", get(checksum_handler))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: ServeState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| Error::io("reading listener address", e))?;
    tracing::info!(%addr, path = %state.path().display(), "Serving reference file");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::io("serving HTTP", e))
}

/// Resolve a `Range` header value against a file of `size` bytes.
///
/// Accepts one range of the forms `bytes=a-b`, `bytes=a-` and `bytes=-n`.
/// The returned range is half-open and clamped to the file.
pub fn parse_byte_range(value: &str, size: u64) -> Result<Range<u64>> {
    let invalid = || Error::InvalidRange {
        value: value.to_string(),
    };

    let ranges = value.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    if ranges.contains(',') {
        return Err(invalid());
    }
    let (first, last) = ranges.split_once('-').ok_or_else(invalid)?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        let suffix: u64 = last.parse().map_err(|_| invalid())?;
        if suffix == 0 || size == 0 {
            return Err(invalid());
        }
        return Ok(size.saturating_sub(suffix)..size);
    }

    let start: u64 = first.parse().map_err(|_| invalid())?;
    if start >= size {
        return Err(invalid());
    }

    let end = if last.is_empty() {
        size
    } else {
        let last: u64 = last.parse().map_err(|_| invalid())?;
        if last < start {
            return Err(invalid());
        }
        std::cmp::min(last.saturating_add(1), size)
    };

    Ok(start..end)
}

async fn content_handler(
    State(state): State<ServeState>,
    headers: HeaderMap,
) -> std::result::Result<Response<Body>, Error> {
    let size = tokio::fs::metadata(state.path())
        .await
        .map_err(|e| Error::io(format!("reading metadata of {}", state.path().display()), e))?
        .len();

    let Some(range_header) = headers.get(header::RANGE) else {
        let file = tokio::fs::File::open(state.path())
            .await
            .map_err(|e| Error::io(format!("opening {}", state.path().display()), e))?;

        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, size)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(ReaderStream::new(file)))
            .map_err(|e| Error::protocol(format!("building response: {}", e)))?);
    };

    let range = range_header
        .to_str()
        .map_err(|_| Error::InvalidRange {
            value: String::from_utf8_lossy(range_header.as_bytes()).into_owned(),
        })
        .and_then(|value| parse_byte_range(value, size));

    let range = match range {
        Ok(range) => range,
        Err(e) => {
            tracing::debug!(error = %e, size, "Unsatisfiable range");
            return Ok(unsatisfiable(size));
        }
    };

    let body = read_range(state.path(), range.start, range.end).await?;
    tracing::trace!(start = range.start, end = range.end, "Serving range");

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end - 1, size),
        )
        .body(Body::from(body))
        .map_err(|e| Error::protocol(format!("building response: {}", e)))
}

fn unsatisfiable(size: u64) -> Response<Body> {
    let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
        response.headers_mut().insert(header::CONTENT_RANGE, value);
    }
    response
}

async fn checksum_handler(
    State(state): State<ServeState>,
    Query(params): Query<ChecksumParams>,
) -> std::result::Result<Response<Body>, Error> {
    let block_size = params.block_size.unwrap_or(state.default_block_size);
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(Error::config(format!(
            "blockSize must be between 1 and {}, got {}",
            MAX_BLOCK_SIZE, block_size
        )));
    }

    let path = state.path.clone();
    let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let mmap = LockedMmap::open(&path)?;
        let index = checksum_slice(&mmap, block_size)?;
        encode_index_to_vec(&index)
    })
    .await
    .map_err(|e| Error::io("checksum task", std::io::Error::other(e)))??;

    tracing::debug!(block_size, bytes = encoded.len(), "Serving checksum index");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(encoded))
        .map_err(|e| Error::protocol(format!("building response: {}", e)))
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidRange { .. } | Error::OutOfRange { .. } => {
                StatusCode::RANGE_NOT_SATISFIABLE
            }
            Error::Config { .. } | Error::Decode { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_closed_range() {
        assert_eq!(parse_byte_range("bytes=0-3", 44).unwrap(), 0..4);
        assert_eq!(parse_byte_range("bytes=40-43", 44).unwrap(), 40..44);
    }

    #[test]
    fn test_parse_range_clamped_to_size() {
        assert_eq!(parse_byte_range("bytes=40-100", 44).unwrap(), 40..44);
    }

    #[test]
    fn test_parse_open_and_suffix_ranges() {
        assert_eq!(parse_byte_range("bytes=10-", 44).unwrap(), 10..44);
        assert_eq!(parse_byte_range("bytes=-4", 44).unwrap(), 40..44);
        assert_eq!(parse_byte_range("bytes=-100", 44).unwrap(), 0..44);
    }

    #[test]
    fn test_parse_unsatisfiable() {
        for value in [
            "bytes=44-50",
            "bytes=5-2",
            "bytes=-0",
            "bytes=0-1,4-5",
            "items=0-3",
            "bytes=abc",
            "bytes=a-b",
        ] {
            assert!(
                matches!(parse_byte_range(value, 44), Err(Error::InvalidRange { .. })),
                "{} should be rejected",
                value
            );
        }
        assert!(parse_byte_range("bytes=0-", 0).is_err());
        assert!(parse_byte_range("bytes=-1", 0).is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found = Error::io(
            "opening",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::config("bad blockSize").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::plan("oops").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
