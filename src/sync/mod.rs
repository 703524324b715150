//! Pull orchestration: index download, reconstruction, atomic replace

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mmap::LockedMmap;
use crate::patch::PatchEngine;
use crate::progress::ProgressTracker;
use crate::requester::http::build_client;
use crate::requester::{fetch_summary, Endpoints, HttpRequester};
use crate::retry::RetryConfig;
use crate::source::{BlockSource, FetchOptions};
use crate::types::PatchStats;
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Pulls a remote reference file over HTTP
pub struct SyncEngine {
    /// Configuration
    config: Config,
    /// Shared HTTP client
    client: Client,
    /// Remote routes
    endpoints: Endpoints,
}

impl SyncEngine {
    /// Create an engine for the remote at `base_url`
    pub fn new(config: Config, base_url: &str) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        let endpoints = Endpoints::from_base(base_url)?;

        Ok(Self {
            config,
            client,
            endpoints,
        })
    }

    /// Remote routes
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Reconstruct the remote file at `destination`, reusing `local`.
    ///
    /// `local` may be the destination itself; a missing `local` is treated
    /// as empty.
    pub async fn pull(&self, local: &Path, destination: &Path) -> Result<PatchStats> {
        tracing::info!(
            remote = %self.endpoints.content,
            local = %local.display(),
            destination = %destination.display(),
            block_size = self.config.block_size,
            "Starting pull"
        );

        let retry = RetryConfig::from(&self.config);
        let summary =
            fetch_summary(&self.client, &self.endpoints, self.config.block_size, &retry).await?;

        let requester = HttpRequester::new(self.client.clone(), self.endpoints.content.clone());
        let source = BlockSource::new(
            Arc::new(requester),
            Arc::new(summary),
            FetchOptions::from(&self.config),
        );

        sync_file(
            source,
            local,
            destination,
            ProgressTracker::new(self.config.progress),
        )
        .await
    }
}

/// Map the local file, or `None` when it does not exist
fn open_local(path: &Path) -> Result<Option<LockedMmap>> {
    match LockedMmap::open(path) {
        Ok(mmap) => Ok(Some(mmap)),
        Err(Error::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No local file, downloading everything");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Rebuild the file behind `source` from `local` and write it to
/// `destination`.
///
/// Output goes to a temporary file next to `destination` that replaces it
/// only after every block was written and synced. On failure the temporary
/// file is removed and `destination` is left as it was.
pub async fn sync_file(
    source: BlockSource,
    local: &Path,
    destination: &Path,
    progress: ProgressTracker,
) -> Result<PatchStats> {
    let local_map = open_local(local)?;
    let local_data: &[u8] = local_map.as_deref().unwrap_or(&[]);

    let dir = destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| Error::io(format!("creating temporary file in {}", dir.display()), e))?;

    let engine = PatchEngine::new(source).with_progress(progress);
    let stats = engine.patch(local_data, temp.as_file_mut()).await?;

    temp.as_file()
        .sync_all()
        .map_err(|e| Error::io("syncing reconstructed file", e))?;

    if let Ok(meta) = std::fs::metadata(destination) {
        temp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| Error::io("copying permissions", e))?;
    }

    // Release the shared lock before the local file is replaced
    drop(local_map);

    temp.persist(destination)
        .map_err(|e| Error::io(format!("replacing {}", destination.display()), e.error))?;

    tracing::info!(
        destination = %destination.display(),
        size = stats.target_size,
        bytes_reused = stats.bytes_reused,
        bytes_downloaded = stats.bytes_downloaded,
        "Pull complete"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FileSummary;
    use crate::requester::MemoryRequester;
    use crate::signature::checksum_slice;
    use tempfile::TempDir;

    const REFERENCE: &[u8] = b"The quick brown fox jumped over the lazy dog";

    fn source_serving(served: &'static [u8]) -> BlockSource {
        let index = checksum_slice(REFERENCE, 4).unwrap();
        let summary = Arc::new(FileSummary::new(&index, 4).unwrap());
        let options = FetchOptions {
            retry: RetryConfig {
                max_attempts: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        BlockSource::new(Arc::new(MemoryRequester::new(served)), summary, options)
    }

    #[tokio::test]
    async fn test_missing_local_downloads_everything() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("absent.txt");
        let dest = dir.path().join("nested/out.txt");

        let stats = sync_file(source_serving(REFERENCE), &local, &dest, ProgressTracker::hidden())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), REFERENCE);
        assert_eq!(stats.blocks_fetched, 11);
        assert_eq!(stats.bytes_reused, 0);
    }

    #[tokio::test]
    async fn test_updates_file_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, b"The quick brown cat jumped over the lazy dog!").unwrap();

        let stats = sync_file(source_serving(REFERENCE), &path, &path, ProgressTracker::hidden())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), REFERENCE);
        assert_eq!(stats.blocks_fetched, 1);
        assert_eq!(stats.blocks_copied, 10);
    }

    #[tokio::test]
    async fn test_failure_leaves_destination_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, b"old contents").unwrap();

        let result = sync_file(
            source_serving(b"The quick brown fox jumped over the lazy cat"),
            &path,
            &path,
            ProgressTracker::hidden(),
        )
        .await;

        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), b"old contents");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "temporary file not cleaned up");
    }

    #[test]
    fn test_engine_rejects_bad_url() {
        let result = SyncEngine::new(Config::default(), "::not a url::");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
