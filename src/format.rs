//! Output formatting utilities

use crate::patch::ReconstructionPlan;
use crate::types::PatchStats;
use std::time::Duration;

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    format_duration_secs(duration.as_secs_f64())
}

/// Format duration from seconds
pub fn format_duration_secs(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs - mins * 60.0;
        format!("{}m {:.0}s", mins as u64, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let remaining = secs - hours * 3600.0;
        let mins = (remaining / 60.0).floor();
        format!("{}h {}m", hours as u64, mins as u64)
    }
}

/// Format transfer rate in human-readable format
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", human_bytes::human_bytes(bytes_per_sec))
}

/// Format percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Format a count with a unit
pub fn format_count(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// Format a block count
pub fn format_blocks(count: u64) -> String {
    format_count(count, "block", "blocks")
}

/// Describe a plan before it runs
pub fn format_plan(plan: &ReconstructionPlan) -> String {
    format!(
        "{} local, {} remote ({} of {} reused, {})",
        format_blocks(plan.copy_count() as u64),
        format_blocks(plan.fetch_count() as u64),
        format_size(plan.bytes_reused),
        format_size(plan.target_size),
        format_percent(plan.savings_percent())
    )
}

/// Patch completion report
pub struct PatchReport<'a> {
    pub target: &'a str,
    pub stats: &'a PatchStats,
}

impl PatchReport<'_> {
    /// Format the patch report
    pub fn format(&self) -> String {
        let stats = self.stats;
        let mut lines = Vec::new();

        lines.push("=== Patch Complete ===".to_string());
        lines.push(String::new());
        lines.push(format!("Target:       {}", self.target));
        lines.push(format!("Size:         {}", format_size(stats.target_size)));
        lines.push(format!(
            "Duration:     {}",
            format_duration_secs(stats.duration_secs)
        ));
        lines.push(String::new());
        lines.push(format!("Copied:       {}", format_blocks(stats.blocks_copied)));
        lines.push(format!("Fetched:      {}", format_blocks(stats.blocks_fetched)));
        if stats.literal_bytes > 0 {
            lines.push(format!(
                "Unmatched:    {} of local data",
                format_size(stats.literal_bytes)
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Downloaded:       {} in {}",
            format_size(stats.bytes_downloaded),
            format_count(stats.range_requests, "request", "requests")
        ));
        if stats.bytes_reused > 0 {
            lines.push(format!(
                "Reused locally:   {} ({})",
                format_size(stats.bytes_reused),
                format_percent(stats.savings_percent())
            ));
        }
        if stats.duration_secs > 0.0 {
            lines.push(format!(
                "Transfer rate:    {}",
                format_rate(stats.transfer_rate())
            ));
        }

        lines.join("\n")
    }

    /// Print the report to stdout
    pub fn print(&self) {
        println!("{}", self.format());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        // human_bytes uses binary prefixes (KiB, MiB)
        assert!(format_size(1024).contains('1'));
        assert!(format_size(1024 * 1024).contains('1'));
    }

    #[test]
    fn test_format_duration_secs() {
        assert_eq!(format_duration_secs(0.5), "500ms");
        assert_eq!(format_duration_secs(45.0), "45.0s");
        assert_eq!(format_duration_secs(90.0), "1m 30s");
        assert_eq!(format_duration_secs(3700.0), "1h 1m");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
    }

    #[test]
    fn test_format_blocks() {
        assert_eq!(format_blocks(1), "1 block");
        assert_eq!(format_blocks(5), "5 blocks");
    }

    #[test]
    fn test_patch_report() {
        let stats = PatchStats {
            blocks_total: 4,
            blocks_copied: 3,
            blocks_fetched: 1,
            bytes_reused: 3072,
            bytes_downloaded: 1024,
            range_requests: 1,
            target_size: 4096,
            duration_secs: 0.25,
            ..Default::default()
        };
        let report = PatchReport {
            target: "disk.img",
            stats: &stats,
        }
        .format();

        assert!(report.contains("Target:       disk.img"));
        assert!(report.contains("3 blocks"));
        assert!(report.contains("1 block"));
        assert!(report.contains("1 request"));
        assert!(report.contains("75.0%"));
        assert!(!report.contains("Unmatched"));
    }

    #[test]
    fn test_format_plan() {
        let mut plan = ReconstructionPlan::new(8);
        plan.add_copy(0, 0, 4);
        plan.add_fetch(1, 4);
        let text = format_plan(&plan);
        assert!(text.starts_with("1 block local, 1 block remote"));
        assert!(text.contains("50.0%"));
    }
}
