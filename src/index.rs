//! Block lookup structures built from a decoded checksum index

use crate::checksum::StrongChecksum;
use crate::error::{Error, Result};
use crate::signature::ChecksumIndex;
use std::collections::HashMap;
use std::ops::Range;

/// Number of blocks needed to cover `file_size` bytes
pub fn block_count(file_size: u64, block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    file_size.div_ceil(block_size as u64) as usize
}

/// Read-only lookup over block checksums.
///
/// Weak values may collide: `candidates_for` returns every block recorded
/// under a value, in block order, and each one must be strong-verified
/// before it is trusted.
#[derive(Debug, Clone)]
pub struct BlockIndex {
    by_weak: HashMap<u32, Vec<usize>>,
    weak: Vec<u32>,
    strong: Vec<StrongChecksum>,
}

impl BlockIndex {
    /// Build the lookup maps from records in block order
    pub fn new(index: &ChecksumIndex) -> Self {
        let mut by_weak: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut weak = Vec::with_capacity(index.len());
        let mut strong = Vec::with_capacity(index.len());

        for (block_index, record) in index.records.iter().enumerate() {
            by_weak.entry(record.weak).or_default().push(block_index);
            weak.push(record.weak);
            strong.push(record.strong);
        }

        Self {
            by_weak,
            weak,
            strong,
        }
    }

    /// Block indices recorded under `weak`, in block order
    pub fn candidates_for(&self, weak: u32) -> &[usize] {
        self.by_weak.get(&weak).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strong checksum of a block
    pub fn strong_checksum_of(&self, block_index: usize) -> Result<&StrongChecksum> {
        self.strong.get(block_index).ok_or(Error::OutOfRange {
            block_index,
            block_count: self.strong.len(),
        })
    }

    /// Weak checksum of a block
    pub fn weak_checksum_of(&self, block_index: usize) -> Result<u32> {
        self.weak.get(block_index).copied().ok_or(Error::OutOfRange {
            block_index,
            block_count: self.weak.len(),
        })
    }

    /// Number of indexed blocks
    pub fn len(&self) -> usize {
        self.strong.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.strong.is_empty()
    }
}

/// Everything the client knows about the reference file
#[derive(Debug, Clone)]
pub struct FileSummary {
    file_size: u64,
    block_size: usize,
    index: BlockIndex,
}

impl FileSummary {
    /// Validate a decoded index against the block size it was requested with
    pub fn new(index: &ChecksumIndex, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::config("block size must be positive"));
        }

        let expected = block_count(index.file_size, block_size);
        if index.len() != expected {
            return Err(Error::decode(format!(
                "index has {} records but a {}-byte file in {}-byte blocks needs {}",
                index.len(),
                index.file_size,
                block_size,
                expected
            )));
        }

        Ok(Self {
            file_size: index.file_size,
            block_size,
            index: BlockIndex::new(index),
        })
    }

    /// Reference file size in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Nominal block size
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    /// Checksum lookup
    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    /// Byte range `[start, end)` of a block in the reference file
    pub fn block_range(&self, block_index: usize) -> Result<Range<u64>> {
        if block_index >= self.block_count() {
            return Err(Error::OutOfRange {
                block_index,
                block_count: self.block_count(),
            });
        }

        let start = block_index as u64 * self.block_size as u64;
        let end = std::cmp::min(start + self.block_size as u64, self.file_size);
        Ok(start..end)
    }

    /// Length of a block in bytes (the last one may be short)
    pub fn block_len(&self, block_index: usize) -> Result<usize> {
        let range = self.block_range(block_index)?;
        Ok((range.end - range.start) as usize)
    }
}
