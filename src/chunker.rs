//! Splitting byte sources into fixed-size reports
//!
//! Used for file uploads and for batch-sending long hex text. Every chunk
//! is exactly `total_bytes` long; only the last one can carry zero padding.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::frame::{self, FramingError, Report};

/// Chunking failures
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Chunk size must be at least 1 byte")]
    ZeroChunkSize,

    #[error("Failed to read source: {0}")]
    Read(#[from] std::io::Error),

    #[error(transparent)]
    Framing(#[from] FramingError),
}

/// Split `bytes` into `ceil(len / total_bytes)` reports
pub fn chunk_bytes(bytes: &[u8], total_bytes: usize) -> Result<Vec<Report>, ChunkError> {
    if total_bytes == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    bytes
        .chunks(total_bytes)
        .map(|chunk| Report::padded(chunk, total_bytes).map_err(ChunkError::from))
        .collect()
}

/// Read the whole source, then chunk it
///
/// Nothing is produced unless the source was read to the end.
pub fn chunk_reader<R: Read>(mut reader: R, total_bytes: usize) -> Result<Vec<Report>, ChunkError> {
    if total_bytes == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    chunk_bytes(&bytes, total_bytes)
}

/// Chunk a file on disk
pub fn chunk_file(path: impl AsRef<Path>, total_bytes: usize) -> Result<Vec<Report>, ChunkError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let chunks = chunk_reader(std::io::BufReader::new(file), total_bytes)?;
    tracing::debug!("Chunked {} into {} reports", path.display(), chunks.len());
    Ok(chunks)
}

/// Parse hex text (whitespace ignored) and split it into reports
pub fn split_hex_text(text: &str, total_bytes: usize) -> Result<Vec<Report>, ChunkError> {
    let bytes = frame::parse_hex(text)?;
    chunk_bytes(&bytes, total_bytes)
}

/// One decoded line per chunk
pub fn preview(chunks: &[Report]) -> String {
    chunks
        .iter()
        .map(Report::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_tail_is_zero_padded() {
        let chunks = chunk_bytes(&[1, 2, 3, 4, 5], 4).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_bytes(), &[1, 2, 3, 4]);
        assert_eq!(chunks[1].as_bytes(), &[5, 0, 0, 0]);
    }

    #[test]
    fn test_exact_multiple_has_no_padding_chunk() {
        let chunks = chunk_bytes(&[0xAA; 8], 4).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.as_bytes() == [0xAA; 4]));
    }

    #[test]
    fn test_empty_source_has_no_chunks() {
        assert!(chunk_bytes(&[], 32).unwrap().is_empty());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(chunk_bytes(&[1], 0), Err(ChunkError::ZeroChunkSize)));
        assert!(matches!(
            chunk_reader(&[1u8][..], 0),
            Err(ChunkError::ZeroChunkSize)
        ));
    }

    #[test]
    fn test_split_hex_text() {
        let chunks = split_hex_text("01 02 03\n04 05", 2).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].as_bytes(), &[5, 0]);
        assert!(matches!(
            split_hex_text("01 0", 2),
            Err(ChunkError::Framing(FramingError::OddLength(3)))
        ));
    }

    #[test]
    fn test_preview_lines() {
        let chunks = chunk_bytes(&[0xF5, 0x05, 0x31], 2).unwrap();
        assert_eq!(preview(&chunks), "F5 05\n31 00");
    }

    #[test]
    fn test_unreadable_source_produces_nothing() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("cable pulled"))
            }
        }
        assert!(matches!(chunk_reader(Broken, 4), Err(ChunkError::Read(_))));
    }
}
