//! Checksum index generation and wire encoding

pub mod codec;
pub mod generate;

pub use codec::{
    decode_index, encode_index, encode_index_to_vec, read_index_file, write_index_file,
    HEADER_LEN,
};
pub use generate::{checksum_slice, generate_index, ChecksumGenerator};

use crate::checksum::StrongChecksum;

/// Checksums for one block of the reference file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumRecord {
    /// Rolling checksum (fast, weak hash for candidate lookup)
    pub weak: u32,

    /// Strong hash (BLAKE3 for verification)
    pub strong: StrongChecksum,
}

impl ChecksumRecord {
    /// Create a new record
    pub fn new(weak: u32, strong: StrongChecksum) -> Self {
        Self { weak, strong }
    }

    /// Checksum a single block
    pub fn for_block(block: &[u8]) -> Self {
        Self {
            weak: crate::checksum::weak_checksum(block),
            strong: crate::checksum::strong_checksum(block),
        }
    }
}

/// A decoded checksum index: file size plus one record per block, in block order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumIndex {
    /// Size of the reference file in bytes
    pub file_size: u64,

    /// Records in block order
    pub records: Vec<ChecksumRecord>,
}

impl ChecksumIndex {
    /// Create an index from already computed records
    pub fn new(file_size: u64, records: Vec<ChecksumRecord>) -> Self {
        Self { file_size, records }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
