//! Memory-mapped file access with file locking
//!
//! The local copy is scanned byte by byte and read back for every matched
//! block, so it is mapped rather than streamed. A shared lock is taken
//! first so cooperating writers cannot truncate the file under the map.

use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

/// A memory-mapped file with an associated shared (read) lock.
///
/// The lock is held for the lifetime of this struct. Zero-length files are
/// not mapped (mapping them fails on some platforms) and read as empty.
pub struct LockedMmap {
    mmap: Option<Mmap>,
    #[allow(dead_code)]
    file: File,
}

impl LockedMmap {
    /// Open a file and create a memory map with a shared (read) lock.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io("opening file for mmap", e))?;

        Self::from_file(file)
    }

    /// Create a memory map from an already-opened file with a shared lock.
    pub fn from_file(file: File) -> Result<Self> {
        // Blocks while another process holds an exclusive lock
        fs2::FileExt::lock_shared(&file)
            .map_err(|e| Error::io("acquiring shared file lock", e))?;

        let len = file
            .metadata()
            .map_err(|e| Error::io("reading metadata", e))?
            .len();
        if len == 0 {
            return Ok(Self { mmap: None, file });
        }

        // Safety: the shared lock keeps cooperating processes from truncating
        // the file while it is mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io("memory mapping file", e))?;

        Ok(Self {
            mmap: Some(mmap),
            file,
        })
    }

    /// Get the length of the memory-mapped region.
    pub fn len(&self) -> usize {
        self.deref().len()
    }

    /// Check if the memory-mapped region is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Deref for LockedMmap {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }
}

impl AsRef<[u8]> for LockedMmap {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_locked_mmap_basic() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"hello world").unwrap();
        temp.flush().unwrap();

        let mmap = LockedMmap::open(temp.path()).unwrap();
        assert_eq!(&mmap[..], b"hello world");
        assert_eq!(mmap.len(), 11);
    }

    #[test]
    fn test_locked_mmap_empty_file() {
        let temp = NamedTempFile::new().unwrap();

        let mmap = LockedMmap::open(temp.path()).unwrap();
        assert!(mmap.is_empty());
        assert_eq!(mmap.as_ref(), b"");
    }
}
