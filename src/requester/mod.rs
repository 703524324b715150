//! Raw byte-range transports for the reference file
//!
//! A [`Requester`] fetches `[start, end)` of the reference file and nothing
//! more: retry, back-pressure and verification live in
//! [`BlockSource`](crate::source::BlockSource).

pub mod http;
pub mod local;
pub mod memory;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

pub use http::{fetch_summary, Endpoints, HttpRequester};
pub use local::LocalRequester;
pub use memory::MemoryRequester;

/// Fetches byte ranges of the reference file
#[async_trait]
pub trait Requester: Send + Sync {
    /// Fetch bytes `[start, end)`
    async fn fetch(&self, start: u64, end: u64) -> Result<Bytes>;

    /// Short name of this transport (for logging)
    fn name(&self) -> &'static str;
}
