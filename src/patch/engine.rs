//! Execute a reconstruction plan against local data and a block source

use super::{build_plan, Instruction, ReconstructionPlan};
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crate::source::BlockSource;
use crate::types::PatchStats;
use futures::StreamExt;
use std::io::{Seek, SeekFrom, Write};
use std::time::Instant;

/// Rebuilds the reference file from local data plus fetched blocks
pub struct PatchEngine {
    source: BlockSource,
    progress: ProgressTracker,
}

impl PatchEngine {
    /// Create an engine without progress output
    pub fn new(source: BlockSource) -> Self {
        Self {
            source,
            progress: ProgressTracker::hidden(),
        }
    }

    /// Report block progress through `progress`
    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// The block source
    pub fn source(&self) -> &BlockSource {
        &self.source
    }

    /// Scan `local` and decide how each target block is produced
    pub fn plan(&self, local: &[u8]) -> ReconstructionPlan {
        build_plan(local, self.source.summary())
    }

    /// Plan and execute in one step
    pub async fn patch<W: Write + Seek>(&self, local: &[u8], output: &mut W) -> Result<PatchStats> {
        let plan = self.plan(local);
        self.execute(&plan, local, output).await
    }

    /// Write every target block into `output`.
    ///
    /// Local copies are written first, then fetched blocks as they
    /// complete. Each block lands at `block_index * block_size`, so
    /// completion order does not matter. The first fatal fetch error aborts
    /// the run and drops the remaining fetches.
    pub async fn execute<W: Write + Seek>(
        &self,
        plan: &ReconstructionPlan,
        local: &[u8],
        output: &mut W,
    ) -> Result<PatchStats> {
        let started = Instant::now();
        let summary = self.source.summary();
        let block_size = summary.block_size() as u64;

        if plan.target_size != summary.file_size()
            || plan.instructions.len() != summary.block_count()
        {
            return Err(Error::plan(format!(
                "plan covers {} blocks of a {} byte file, index has {} blocks of a {} byte file",
                plan.instructions.len(),
                plan.target_size,
                summary.block_count(),
                summary.file_size()
            )));
        }

        let downloaded_before = self.source.stats().bytes_downloaded();
        let requests_before = self.source.stats().range_requests();

        let mut stats = PatchStats {
            blocks_total: plan.instructions.len() as u64,
            literal_bytes: plan.literal_bytes,
            target_size: plan.target_size,
            ..Default::default()
        };

        tracing::info!(
            blocks = stats.blocks_total,
            copies = plan.copy_count(),
            fetches = plan.fetch_count(),
            target_size = plan.target_size,
            "Executing reconstruction plan"
        );
        self.progress.start("reconstructing", stats.blocks_total);

        for op in &plan.instructions {
            if let Instruction::CopyLocal {
                block_index,
                local_offset,
                length,
            } = *op
            {
                let data = local_slice(local, local_offset, length).ok_or_else(|| {
                    Error::plan(format!(
                        "block {} copies {}..{} beyond local data of {} bytes",
                        block_index,
                        local_offset,
                        local_offset + length,
                        local.len()
                    ))
                })?;
                write_at(output, block_index as u64 * block_size, data)?;

                stats.blocks_copied += 1;
                stats.bytes_reused += length;
                self.progress.block_done();
            }
        }

        let mut fetched = std::pin::pin!(self.source.fetch_blocks(plan.fetch_indices()));
        while let Some((block_index, result)) = fetched.next().await {
            let data = match result {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!(block_index, error = %e, "Block fetch failed, aborting");
                    self.progress.abandon();
                    return Err(e);
                }
            };

            write_at(output, block_index as u64 * block_size, &data)?;
            stats.blocks_fetched += 1;
            self.progress.block_done();
            self.progress.update_stats(
                self.source.stats().bytes_downloaded() - downloaded_before,
                stats.bytes_reused,
            );
        }

        output
            .flush()
            .map_err(|e| Error::io("flushing reconstructed output", e))?;

        stats.bytes_downloaded = self.source.stats().bytes_downloaded() - downloaded_before;
        stats.range_requests = self.source.stats().range_requests() - requests_before;
        stats.duration_secs = started.elapsed().as_secs_f64();
        self.progress.finish(&stats);

        tracing::info!(
            blocks_copied = stats.blocks_copied,
            blocks_fetched = stats.blocks_fetched,
            bytes_downloaded = stats.bytes_downloaded,
            range_requests = stats.range_requests,
            "Reconstruction complete"
        );

        Ok(stats)
    }
}

fn local_slice(local: &[u8], offset: u64, length: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(length).ok()?)?;
    local.get(start..end)
}

fn write_at<W: Write + Seek>(output: &mut W, offset: u64, data: &[u8]) -> Result<()> {
    output
        .seek(SeekFrom::Start(offset))
        .map_err(|e| Error::io(format!("seeking output to {}", offset), e))?;
    output
        .write_all(data)
        .map_err(|e| Error::io(format!("writing {} bytes at {}", data.len(), offset), e))
}
