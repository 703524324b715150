//! rangesync - block-level delta download of a single file
//!
//! A server publishes a file together with a checksum index of its
//! fixed-size blocks. A client holding an older or partial copy scans that
//! copy with a rolling checksum, reuses every block it already has, and
//! fetches only the rest with HTTP range requests. Every fetched block is
//! verified against the index before it is written.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod index;
pub mod mmap;
pub mod patch;
pub mod progress;
pub mod requester;
pub mod retry;
pub mod serve;
pub mod signature;
pub mod source;
pub mod sync;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
