//! Checksum generation over fixed-size blocks

use super::{ChecksumIndex, ChecksumRecord};
use crate::error::{Error, Result};
use crate::index::block_count;
use crate::mmap::LockedMmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Files above this size are memory-mapped and checksummed in parallel
const PARALLEL_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Lazy, block-ordered checksum generator over a byte source.
///
/// Yields one [`ChecksumRecord`] per block of `block_size` bytes; the final
/// block covers whatever remains of the declared `file_size`. If the source
/// runs dry before `file_size` bytes, the iterator yields a single
/// [`Error::ShortRead`] and then stops.
pub struct ChecksumGenerator<R> {
    reader: R,
    file_size: u64,
    block_size: usize,
    consumed: u64,
    buffer: Vec<u8>,
    failed: bool,
}

impl<R: Read> ChecksumGenerator<R> {
    /// Create a generator over `reader`, which must provide `file_size` bytes
    pub fn new(reader: R, file_size: u64, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::config("block size must be positive"));
        }

        let buffer_len = std::cmp::min(block_size as u64, file_size) as usize;
        Ok(Self {
            reader,
            file_size,
            block_size,
            consumed: 0,
            buffer: vec![0u8; buffer_len],
            failed: false,
        })
    }

    /// Number of records this generator produces
    pub fn block_count(&self) -> usize {
        block_count(self.file_size, self.block_size)
    }

    /// Drain the generator into a [`ChecksumIndex`]
    pub fn into_index(self) -> Result<ChecksumIndex> {
        let file_size = self.file_size;
        let records = self.collect::<Result<Vec<_>>>()?;
        Ok(ChecksumIndex::new(file_size, records))
    }
}

impl<R: Read + Seek> ChecksumGenerator<R> {
    /// Seek the source back to its start so the sequence can be produced again
    pub fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io("rewinding checksum source", e))?;
        self.consumed = 0;
        self.failed = false;
        Ok(())
    }
}

impl<R: Read> Iterator for ChecksumGenerator<R> {
    type Item = Result<ChecksumRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.consumed >= self.file_size {
            return None;
        }

        let len = std::cmp::min(self.block_size as u64, self.file_size - self.consumed) as usize;
        let block = &mut self.buffer[..len];
        let mut filled = 0;

        while filled < len {
            match self.reader.read(&mut block[filled..]) {
                Ok(0) => {
                    self.failed = true;
                    return Some(Err(Error::ShortRead {
                        expected: self.file_size,
                        actual: self.consumed + filled as u64,
                    }));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::io("reading block", e)));
                }
            }
        }

        self.consumed += len as u64;
        Some(Ok(ChecksumRecord::for_block(block)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = block_count(self.file_size - self.consumed, self.block_size);
        (0, Some(remaining))
    }
}

/// Checksum an in-memory buffer, blocks processed in parallel with rayon
pub fn checksum_slice(data: &[u8], block_size: usize) -> Result<ChecksumIndex> {
    if block_size == 0 {
        return Err(Error::config("block size must be positive"));
    }

    let records: Vec<ChecksumRecord> = data
        .par_chunks(block_size)
        .map(ChecksumRecord::for_block)
        .collect();

    Ok(ChecksumIndex::new(data.len() as u64, records))
}

/// Generate the checksum index of a file on disk
pub fn generate_index(path: &Path, block_size: usize) -> Result<ChecksumIndex> {
    let file = File::open(path).map_err(|e| Error::io("opening file", e))?;
    let file_size = file
        .metadata()
        .map_err(|e| Error::io("reading metadata", e))?
        .len();

    if file_size > PARALLEL_THRESHOLD {
        drop(file);
        let mmap = LockedMmap::open(path)?;
        tracing::debug!(
            path = %path.display(),
            file_size,
            block_size,
            "Checksumming memory-mapped file in parallel"
        );
        return checksum_slice(&mmap, block_size);
    }

    ChecksumGenerator::new(BufReader::new(file), file_size, block_size)?.into_index()
}
