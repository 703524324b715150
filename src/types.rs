//! Shared result types

use serde::{Deserialize, Serialize};

/// Outcome of reconstructing one file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchStats {
    /// Blocks in the target file
    pub blocks_total: u64,

    /// Blocks copied from the local file
    pub blocks_copied: u64,

    /// Blocks fetched and verified
    pub blocks_fetched: u64,

    /// Target bytes produced from local data
    pub bytes_reused: u64,

    /// Bytes received from the remote, retries included
    pub bytes_downloaded: u64,

    /// Range requests issued, retries included
    pub range_requests: u64,

    /// Local bytes that matched no target block
    pub literal_bytes: u64,

    /// Target file size
    pub target_size: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

impl PatchStats {
    /// Share of the target produced from local data
    pub fn savings_percent(&self) -> f64 {
        if self.target_size == 0 {
            0.0
        } else {
            (self.bytes_reused as f64 / self.target_size as f64) * 100.0
        }
    }

    /// Download rate in bytes per second
    pub fn transfer_rate(&self) -> f64 {
        if self.duration_secs == 0.0 {
            0.0
        } else {
            self.bytes_downloaded as f64 / self.duration_secs
        }
    }
}
