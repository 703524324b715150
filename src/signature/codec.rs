//! Checksum index wire format
//!
//! ```text
//! offset  size  field
//! 0       8     file size (i64, little-endian)
//! 8       4     weak checksum width (u32, little-endian)
//! 12      4     strong checksum width (u32, little-endian)
//! 16      ..    records: weak bytes then strong bytes, one per block
//! ```
//!
//! Records carry no length prefix; the stream ends where the records end.

use super::{ChecksumIndex, ChecksumRecord};
use crate::checksum::{StrongChecksum, STRONG_CHECKSUM_WIDTH, WEAK_CHECKSUM_WIDTH};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Length of the fixed header
pub const HEADER_LEN: usize = 16;

/// Encode a header and a record sequence into `writer`.
///
/// Records are written as they are pulled, so a lazy
/// [`ChecksumGenerator`](super::ChecksumGenerator) streams straight through.
/// Returns the number of records written.
pub fn encode_index<W, I>(writer: &mut W, file_size: u64, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Result<ChecksumRecord>>,
{
    let file_size = i64::try_from(file_size)
        .map_err(|_| Error::protocol(format!("file size {} does not fit in i64", file_size)))?;

    writer
        .write_all(&file_size.to_le_bytes())
        .map_err(|e| Error::io("writing file size", e))?;
    writer
        .write_all(&(WEAK_CHECKSUM_WIDTH as u32).to_le_bytes())
        .map_err(|e| Error::io("writing weak width", e))?;
    writer
        .write_all(&(STRONG_CHECKSUM_WIDTH as u32).to_le_bytes())
        .map_err(|e| Error::io("writing strong width", e))?;

    let mut count = 0usize;
    for record in records {
        let record = record?;
        writer
            .write_all(&record.weak.to_le_bytes())
            .map_err(|e| Error::io("writing weak checksum", e))?;
        writer
            .write_all(&record.strong)
            .map_err(|e| Error::io("writing strong checksum", e))?;
        count += 1;
    }

    Ok(count)
}

/// Encode an in-memory index into a byte vector
pub fn encode_index_to_vec(index: &ChecksumIndex) -> Result<Vec<u8>> {
    let record_size = WEAK_CHECKSUM_WIDTH + STRONG_CHECKSUM_WIDTH;
    let mut data = Vec::with_capacity(HEADER_LEN + index.len() * record_size);
    encode_index(&mut data, index.file_size, index.records.iter().copied().map(Ok))?;
    Ok(data)
}

/// Decode a checksum index stream.
///
/// Fails with [`Error::Decode`] on a short header, a negative file size,
/// zero widths or widths this crate cannot verify, and with
/// [`Error::TruncatedStream`] when the record area is not a whole number
/// of records.
pub fn decode_index<R: Read>(mut reader: R) -> Result<ChecksumIndex> {
    let file_size = i64::from_le_bytes(read_field::<_, 8>(&mut reader, "file size")?);
    let weak_width = u32::from_le_bytes(read_field::<_, 4>(&mut reader, "weak width")?) as usize;
    let strong_width =
        u32::from_le_bytes(read_field::<_, 4>(&mut reader, "strong width")?) as usize;

    if file_size < 0 {
        return Err(Error::decode(format!("negative file size {}", file_size)));
    }
    if weak_width == 0 || strong_width == 0 {
        return Err(Error::decode(format!(
            "checksum widths must be positive (weak {}, strong {})",
            weak_width, strong_width
        )));
    }

    let mut body = Vec::new();
    reader
        .read_to_end(&mut body)
        .map_err(|e| Error::io("reading checksum records", e))?;

    let record_size = weak_width + strong_width;
    if body.len() % record_size != 0 {
        return Err(Error::TruncatedStream {
            remaining: body.len() % record_size,
            record_size,
        });
    }

    if weak_width != WEAK_CHECKSUM_WIDTH || strong_width != STRONG_CHECKSUM_WIDTH {
        return Err(Error::decode(format!(
            "unsupported checksum widths (weak {}, strong {}; expected {} and {})",
            weak_width, strong_width, WEAK_CHECKSUM_WIDTH, STRONG_CHECKSUM_WIDTH
        )));
    }

    let records = body
        .chunks_exact(record_size)
        .map(|chunk| {
            let mut weak = [0u8; WEAK_CHECKSUM_WIDTH];
            weak.copy_from_slice(&chunk[..WEAK_CHECKSUM_WIDTH]);
            let mut strong: StrongChecksum = [0u8; STRONG_CHECKSUM_WIDTH];
            strong.copy_from_slice(&chunk[WEAK_CHECKSUM_WIDTH..]);
            ChecksumRecord::new(u32::from_le_bytes(weak), strong)
        })
        .collect();

    Ok(ChecksumIndex::new(file_size as u64, records))
}

fn read_field<R: Read, const N: usize>(reader: &mut R, name: &str) -> Result<[u8; N]> {
    let mut field = [0u8; N];
    reader.read_exact(&mut field).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::decode(format!("stream ended inside header ({})", name))
        } else {
            Error::io(format!("reading {}", name), e)
        }
    })?;
    Ok(field)
}

/// Write an encoded index to a file
pub fn write_index_file(index: &ChecksumIndex, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io("creating index file", e))?;
    let mut writer = BufWriter::new(file);

    encode_index(&mut writer, index.file_size, index.records.iter().copied().map(Ok))?;
    writer.flush().map_err(|e| Error::io("flushing index file", e))?;

    Ok(())
}

/// Read and decode an index file
pub fn read_index_file(path: &Path) -> Result<ChecksumIndex> {
    let file = File::open(path).map_err(|e| Error::io("opening index file", e))?;
    decode_index(BufReader::new(file))
}
