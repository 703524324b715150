//! CLI argument parsing for rangesync

use crate::config::Config;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rangesync - block-level delta download over HTTP range requests
#[derive(Parser, Debug)]
#[command(name = "rangesync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve a reference file and its checksum index over HTTP
    Serve(ServeArgs),

    /// Bring a local file up to date with a served reference file
    Patch(PatchArgs),

    /// Write the checksum index of a file
    Sign(SignArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Parse "4096", "64K" or "1M" into a byte count
fn parse_block_size(s: &str) -> std::result::Result<usize, String> {
    let size = Config::parse_size(s).map_err(|e| e.to_string())?;
    usize::try_from(size).map_err(|_| format!("{} is too large", s))
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Reference file to serve
    pub file: PathBuf,

    /// Address to listen on [default: 127.0.0.1:8000]
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Block size used when a checksum request names none
    #[arg(long, value_parser = parse_block_size)]
    pub block_size: Option<usize>,

    /// Configuration file path
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

impl ServeArgs {
    /// Merge CLI args over the file config
    pub fn to_config(&self) -> Result<Config> {
        let mut config = load_config(self.config.as_ref())?;
        if let Some(ref listen) = self.listen {
            config.listen = listen.clone();
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Arguments for the patch command
#[derive(Parser, Debug)]
pub struct PatchArgs {
    /// Base URL of a `rangesync serve` instance
    pub url: String,

    /// Local file to reuse blocks from (may not exist yet)
    pub local: PathBuf,

    /// Write the result here instead of replacing the local file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Block size of the checksum index to request
    #[arg(long, value_parser = parse_block_size)]
    pub block_size: Option<usize>,

    /// Blocks fetched in parallel [0 = CPU count]
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Cap on bytes requested but not yet received
    #[arg(long, value_parser = parse_block_size)]
    pub max_outstanding: Option<usize>,

    /// Attempts per block before giving up
    #[arg(long)]
    pub retries: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Configuration file path
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

impl PatchArgs {
    /// Merge CLI args over the file config
    pub fn to_config(&self) -> Result<Config> {
        let mut config = load_config(self.config.as_ref())?;

        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(max_outstanding) = self.max_outstanding {
            config.max_outstanding_bytes = max_outstanding as u64;
        }
        if let Some(retries) = self.retries {
            config.max_attempts = retries;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if self.no_progress {
            config.progress = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Where the reconstructed file goes
    pub fn destination(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.local.clone())
    }
}

/// Arguments for the sign command
#[derive(Parser, Debug)]
pub struct SignArgs {
    /// File to index
    pub file: PathBuf,

    /// Output index path (default: <file>.rsidx)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Block size [default: 1M]
    #[arg(long, value_parser = parse_block_size)]
    pub block_size: Option<usize>,
}

impl SignArgs {
    /// Index path for this file
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let mut name = self.file.clone().into_os_string();
            name.push(".rsidx");
            PathBuf::from(name)
        })
    }
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show the configuration file path
    #[arg(long)]
    pub path: bool,

    /// Create default configuration file
    #[arg(long)]
    pub init: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patch_command() {
        let cli = Cli::try_parse_from([
            "rangesync",
            "-vv",
            "patch",
            "http://localhost:8000/",
            "disk.img",
            "-o",
            "new.img",
            "--block-size",
            "64K",
            "-j",
            "8",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Patch(args) => {
                assert_eq!(args.url, "http://localhost:8000/");
                assert_eq!(args.destination(), PathBuf::from("new.img"));
                assert_eq!(args.block_size, Some(64 * 1024));
                assert_eq!(args.jobs, Some(8));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_patch_defaults_to_in_place() {
        let cli = Cli::try_parse_from(["rangesync", "patch", "http://h/", "file.bin"]).unwrap();
        match cli.command {
            Commands::Patch(args) => assert_eq!(args.destination(), PathBuf::from("file.bin")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_sign_output_path() {
        let cli = Cli::try_parse_from(["rangesync", "sign", "data/disk.img"]).unwrap();
        match cli.command {
            Commands::Sign(args) => {
                assert_eq!(args.output_path(), PathBuf::from("data/disk.img.rsidx"))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_block_size_rejected() {
        assert!(Cli::try_parse_from(["rangesync", "sign", "f", "--block-size", "lots"]).is_err());
    }

    #[test]
    fn test_patch_args_override_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "block_size = 4096\njobs = 2\n").unwrap();

        let cli = Cli::try_parse_from([
            "rangesync",
            "patch",
            "http://h/",
            "f",
            "-c",
            path.to_str().unwrap(),
            "-j",
            "6",
            "--no-progress",
        ])
        .unwrap();

        let Commands::Patch(args) = cli.command else {
            panic!("expected patch");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.jobs, 6);
        assert!(!config.progress);
    }
}
