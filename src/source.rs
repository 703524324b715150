//! Verified, retried, back-pressured block fetching
//!
//! [`BlockSource`] turns a raw [`Requester`] into a source of trusted
//! blocks: every fetch is bounded by an in-flight slot and a byte budget,
//! retried with backoff on transport failures, and checked against the
//! strong checksum in the index before it is handed out.

use crate::checksum::strong_checksum;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::FileSummary;
use crate::requester::Requester;
use crate::retry::{with_retry, RetryConfig};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Concurrency limits for block fetches
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Fetches in flight at once
    pub jobs: usize,
    /// Bytes requested but not yet returned, across all fetches
    pub max_outstanding_bytes: u64,
    /// Retry policy per block
    pub retry: RetryConfig,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            jobs: crate::config::DEFAULT_JOBS,
            max_outstanding_bytes: crate::config::DEFAULT_MAX_OUTSTANDING_BYTES,
            retry: RetryConfig::default(),
        }
    }
}

impl From<&Config> for FetchOptions {
    fn from(config: &Config) -> Self {
        Self {
            jobs: config.effective_jobs(),
            max_outstanding_bytes: config.max_outstanding_bytes,
            retry: RetryConfig::from(config),
        }
    }
}

/// Counters shared by all clones of a [`BlockSource`]
#[derive(Debug, Default)]
pub struct FetchStats {
    bytes_downloaded: AtomicU64,
    range_requests: AtomicU64,
    blocks_verified: AtomicU64,
}

impl FetchStats {
    /// Bytes received from the requester, including failed attempts
    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    /// Requester calls issued, including retries
    pub fn range_requests(&self) -> u64 {
        self.range_requests.load(Ordering::Relaxed)
    }

    /// Blocks that passed strong verification
    pub fn blocks_verified(&self) -> u64 {
        self.blocks_verified.load(Ordering::Relaxed)
    }
}

/// Fetches blocks of the reference file and verifies them against the index
#[derive(Clone)]
pub struct BlockSource {
    requester: Arc<dyn Requester>,
    summary: Arc<FileSummary>,
    retry: RetryConfig,
    jobs: usize,
    slots: Arc<Semaphore>,
    budget: Arc<Semaphore>,
    budget_bytes: u32,
    stats: Arc<FetchStats>,
}

impl BlockSource {
    /// Wrap `requester` for the file described by `summary`
    pub fn new(
        requester: Arc<dyn Requester>,
        summary: Arc<FileSummary>,
        options: FetchOptions,
    ) -> Self {
        let jobs = options.jobs.max(1);
        let budget_bytes = options.max_outstanding_bytes.clamp(1, u32::MAX as u64) as u32;

        Self {
            requester,
            summary,
            retry: options.retry,
            jobs,
            slots: Arc::new(Semaphore::new(jobs)),
            budget: Arc::new(Semaphore::new(budget_bytes as usize)),
            budget_bytes,
            stats: Arc::new(FetchStats::default()),
        }
    }

    /// Description of the file being fetched
    pub fn summary(&self) -> &Arc<FileSummary> {
        &self.summary
    }

    /// Fetch counters
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Fetch one block and verify it.
    ///
    /// Returns [`Error::ChecksumMismatch`] without retrying when the bytes
    /// do not hash to the indexed value, and [`Error::TransportExhausted`]
    /// when every attempt failed in transit.
    pub async fn fetch_block(&self, block_index: usize) -> Result<Bytes> {
        let range = self.summary.block_range(block_index)?;
        let expected = self.summary.index().strong_checksum_of(block_index)?;
        let (start, end) = (range.start, range.end);
        let len = end - start;

        let _slot = self.slots.acquire().await.map_err(|_| Error::Cancelled)?;
        // A block larger than the whole budget takes all of it
        let _budget = self
            .budget
            .acquire_many(std::cmp::min(len, self.budget_bytes as u64) as u32)
            .await
            .map_err(|_| Error::Cancelled)?;

        let requester = &self.requester;
        let stats = &self.stats;
        let what = format!("block {}", block_index);

        let data = with_retry(&self.retry, &what, || async move {
            stats.range_requests.fetch_add(1, Ordering::Relaxed);
            let data = requester.fetch(start, end).await?;
            stats
                .bytes_downloaded
                .fetch_add(data.len() as u64, Ordering::Relaxed);

            if data.len() as u64 != len {
                return Err(Error::transport(format!(
                    "expected {} bytes for range {}-{}, got {}",
                    len,
                    start,
                    end,
                    data.len()
                )));
            }
            Ok(data)
        })
        .await?;

        let actual = strong_checksum(&data);
        if &actual != expected {
            tracing::error!(
                block_index,
                transport = self.requester.name(),
                "Fetched block failed strong checksum verification"
            );
            return Err(Error::ChecksumMismatch {
                block_index,
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }

        self.stats.blocks_verified.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(block_index, bytes = len, "Block verified");

        Ok(data)
    }

    /// Fetch many blocks with at most `jobs` in flight.
    ///
    /// Results arrive in completion order, not request order. Dropping the
    /// stream cancels the fetches still outstanding.
    pub fn fetch_blocks(
        &self,
        block_indices: Vec<usize>,
    ) -> impl Stream<Item = (usize, Result<Bytes>)> + '_ {
        stream::iter(block_indices)
            .map(move |block_index| async move { (block_index, self.fetch_block(block_index).await) })
            .buffer_unordered(self.jobs)
    }
}
