//! Progress display while a file is reconstructed

use crate::types::PatchStats;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Block and byte progress for one reconstruction
pub struct ProgressTracker {
    multi: MultiProgress,
    /// Target blocks written
    blocks: ProgressBar,
    /// Stats line
    stats: ProgressBar,
    enabled: bool,
}

impl ProgressTracker {
    /// Create a tracker; a disabled tracker draws nothing
    pub fn new(enabled: bool) -> Self {
        let multi = MultiProgress::new();

        let blocks = if enabled {
            let pb = multi.add(ProgressBar::new(0));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({percent}%) {msg:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };

        let stats = if enabled {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("  {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        Self {
            multi,
            blocks,
            stats,
            enabled,
        }
    }

    /// A tracker that never draws
    pub fn hidden() -> Self {
        Self::new(false)
    }

    /// Start a reconstruction of `block_count` blocks
    pub fn start(&self, name: &str, block_count: u64) {
        self.blocks.set_length(block_count);
        self.blocks.set_position(0);
        self.blocks.set_message(truncate_name(name, 30));
    }

    /// One target block written
    pub fn block_done(&self) {
        self.blocks.inc(1);
    }

    /// Update stats display
    pub fn update_stats(&self, downloaded: u64, reused: u64) {
        let msg = format!(
            "Downloaded: {} | Reused: {}",
            human_bytes::human_bytes(downloaded as f64),
            human_bytes::human_bytes(reused as f64),
        );
        self.stats.set_message(msg);
    }

    /// Finish all progress bars
    pub fn finish(&self, stats: &PatchStats) {
        self.update_stats(stats.bytes_downloaded, stats.bytes_reused);
        self.blocks.finish();
        self.stats.finish();
    }

    /// Drop the bars after a failure
    pub fn abandon(&self) {
        self.blocks.abandon();
        self.stats.finish_and_clear();
    }

    /// Print a message (works with progress bars)
    pub fn println(&self, msg: &str) {
        if self.enabled {
            self.multi.println(msg).ok();
        } else {
            println!("{}", msg);
        }
    }

    /// Whether bars are drawn
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate a name for display
fn truncate_name(name: &str, max_len: usize) -> String {
    let count = name.chars().count();
    if count <= max_len {
        name.to_string()
    } else {
        let tail: String = name.chars().skip(count - max_len + 3).collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short.bin", 30), "short.bin");
        let long = "a/very/long/path/to/some/reference/file.iso";
        let truncated = truncate_name(long, 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.starts_with("..."));
        assert!(truncated.ends_with("file.iso"));
    }

    #[test]
    fn test_hidden_tracker_counts() {
        let tracker = ProgressTracker::hidden();
        tracker.start("file", 3);
        tracker.block_done();
        tracker.block_done();
        assert!(!tracker.is_enabled());
        assert_eq!(tracker.blocks.position(), 2);
    }
}
