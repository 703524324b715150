//! Configuration management for rangesync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default block size for checksum indexes (1MB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Maximum block size (64MB)
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// Default number of concurrent block fetches
pub const DEFAULT_JOBS: usize = 4;

/// Default budget of bytes requested but not yet written (4MB)
pub const DEFAULT_MAX_OUTSTANDING_BYTES: u64 = 4 * 1024 * 1024;

/// Default listen address for `serve`
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ==================== Index ====================

    /// Block size used when requesting or generating checksum indexes
    pub block_size: usize,

    // ==================== Fetching ====================

    /// Concurrent block fetches (0 = auto-detect CPU count)
    pub jobs: usize,

    /// Bytes that may be in flight at once across all fetches
    pub max_outstanding_bytes: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    // ==================== Retry ====================

    /// Attempts per range request, including the first
    pub max_attempts: u32,

    /// Retry delay base in milliseconds
    pub retry_delay_ms: u64,

    /// Retry delay cap in milliseconds
    pub max_retry_delay_ms: u64,

    // ==================== Serving ====================

    /// Address `serve` binds to
    pub listen: String,

    // ==================== Output ====================

    /// Show progress bars
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,

            jobs: DEFAULT_JOBS,
            max_outstanding_bytes: DEFAULT_MAX_OUTSTANDING_BYTES,
            request_timeout_secs: 30,

            max_attempts: 3,
            retry_delay_ms: 250,
            max_retry_delay_ms: 10_000,

            listen: DEFAULT_LISTEN.to_string(),

            progress: true,
        }
    }
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io("reading config", e))?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io("creating config dir", e))?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("serializing config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| Error::io("writing config", e))?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("rangesync").join("config.toml"))
            .ok_or_else(|| Error::config("could not determine config directory"))
    }

    /// Get the effective number of jobs (resolves 0 to CPU count)
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    /// Reject settings the fetch pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::config(format!(
                "block size must be between 1 and {} bytes, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.max_outstanding_bytes == 0 {
            return Err(Error::config("max_outstanding_bytes must be positive"));
        }
        Ok(())
    }

    /// Parse a size string like "100", "100K", "100M", "100G" into bytes
    pub fn parse_size(s: &str) -> Result<u64> {
        let s = s.trim().to_uppercase();
        if s.is_empty() {
            return Ok(0);
        }

        let (num_part, suffix) = if let Some(num) = s.strip_suffix("KB") {
            (num, 1024u64)
        } else if let Some(num) = s.strip_suffix("MB") {
            (num, 1024u64 * 1024)
        } else if let Some(num) = s.strip_suffix("GB") {
            (num, 1024u64 * 1024 * 1024)
        } else if let Some(num) = s.strip_suffix('K') {
            (num, 1024u64)
        } else if let Some(num) = s.strip_suffix('M') {
            (num, 1024u64 * 1024)
        } else if let Some(num) = s.strip_suffix('G') {
            (num, 1024u64 * 1024 * 1024)
        } else if let Some(num) = s.strip_suffix('B') {
            (num, 1u64)
        } else {
            (s.as_str(), 1u64)
        };

        let num: u64 = num_part
            .trim()
            .parse()
            .map_err(|_| Error::config(format!("invalid size value: {}", s)))?;

        num.checked_mul(suffix)
            .ok_or_else(|| Error::config(format!("size value too large: {}", s)))
    }
}
