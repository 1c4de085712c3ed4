//! File chunking against real files on disk.

use std::io::Write;

use hidconsole::{chunk_file, preview, ChunkError};
use tempfile::NamedTempFile;

fn temp_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn five_byte_file_in_four_byte_chunks() {
    let file = temp_file(&[0x10, 0x20, 0x30, 0x40, 0x50]);
    let chunks = chunk_file(file.path(), 4).unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_bytes(), &[0x10, 0x20, 0x30, 0x40]);
    assert_eq!(chunks[1].as_bytes(), &[0x50, 0x00, 0x00, 0x00]);
    assert_eq!(preview(&chunks), "10 20 30 40\n50 00 00 00");
}

#[test]
fn chunk_count_is_ceiling_of_size_over_chunk() {
    let source: Vec<u8> = (0..=255u8).cycle().take(200).collect();
    for n in [0usize, 1, 31, 32, 33, 64, 199, 200] {
        let file = temp_file(&source[..n]);
        for c in [1usize, 7, 32] {
            let chunks = chunk_file(file.path(), c).unwrap();
            assert_eq!(chunks.len(), n.div_ceil(c), "n={n} c={c}");
            assert!(chunks.iter().all(|chunk| chunk.len() == c));

            let flat: Vec<u8> = chunks.iter().flat_map(|r| r.as_bytes().to_vec()).collect();
            assert_eq!(&flat[..n], &source[..n]);
            assert!(flat[n..].iter().all(|&b| b == 0), "padding must be zero");
        }
    }
}

#[test]
fn missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = chunk_file(dir.path().join("firmware.bin"), 32);
    assert!(matches!(result, Err(ChunkError::Read(_))));
}
