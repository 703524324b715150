//! Reference file on the local filesystem

use super::Requester;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Reads ranges straight from a file
#[derive(Debug, Clone)]
pub struct LocalRequester {
    path: PathBuf,
}

impl LocalRequester {
    /// Create a requester over the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the reference file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Requester for LocalRequester {
    async fn fetch(&self, start: u64, end: u64) -> Result<Bytes> {
        read_range(&self.path, start, end).await
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Read bytes `[start, end)` of a file
pub async fn read_range(path: &Path, start: u64, end: u64) -> Result<Bytes> {
    if end < start {
        return Err(Error::InvalidRange {
            value: format!("{}-{}", start, end),
        });
    }
    if start == end {
        return Ok(Bytes::new());
    }

    let mut file = fs::File::open(path)
        .await
        .map_err(|e| Error::io("opening file", e))?;

    file.seek(std::io::SeekFrom::Start(start))
        .await
        .map_err(|e| Error::io("seeking file", e))?;

    let len = (end - start) as usize;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)
        .await
        .map_err(|e| Error::io("reading range", e))?;

    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_fetch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remote.txt");
        std::fs::write(&path, b"The quick brown fox").unwrap();

        let requester = LocalRequester::new(&path);
        assert_eq!(requester.fetch(4, 9).await.unwrap(), Bytes::from("quick"));
        assert!(requester.fetch(4, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_fetch_past_end() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("remote.txt");
        std::fs::write(&path, b"short").unwrap();

        let requester = LocalRequester::new(&path);
        assert!(matches!(
            requester.fetch(2, 10).await,
            Err(Error::Io { .. })
        ));
    }
}
