//! Reference content held in memory

use super::Requester;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Serves ranges of an in-memory buffer
#[derive(Debug, Clone)]
pub struct MemoryRequester {
    data: Bytes,
}

impl MemoryRequester {
    /// Create a requester over `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// The full content
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl Requester for MemoryRequester {
    async fn fetch(&self, start: u64, end: u64) -> Result<Bytes> {
        if start > end || end > self.data.len() as u64 {
            return Err(Error::InvalidRange {
                value: format!("{}-{} of {}", start, end, self.data.len()),
            });
        }
        Ok(self.data.slice(start as usize..end as usize))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetch() {
        let requester = MemoryRequester::new(&b"The quick brown fox"[..]);
        assert_eq!(requester.fetch(10, 15).await.unwrap(), Bytes::from("brown"));
        assert!(requester.fetch(10, 40).await.is_err());
    }
}
