use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::UploadError;

/// Read block size for streaming checksums.
const CHECKSUM_BLOCK: usize = 8192;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
///
/// Streams the file in fixed-size blocks so arbitrarily large files
/// never get loaded at once.
pub fn calculate_file_checksum(path: &Path) -> Result<String, UploadError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHECKSUM_BLOCK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Returns the number of chunks covering `size` bytes.
pub fn chunk_count(size: u64, chunk_size: usize) -> u32 {
    size.div_ceil(chunk_size as u64) as u32
}

/// One chunk of file data with its zero-based index.
#[derive(Debug, Clone)]
pub struct FileChunk {
    pub index: u32,
    pub data: Vec<u8>,
}

/// Reads a file in fixed-size chunks with contiguous zero-based
/// indices. The final chunk may be shorter than the chunk size.
pub struct ChunkReader {
    file: std::fs::File,
    chunk_size: usize,
    index: u32,
    read: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading. `chunk_size` must be non-zero.
    pub fn new(path: &Path, chunk_size: usize) -> Result<Self, UploadError> {
        let file = std::fs::File::open(path)?;
        let file_size = file.metadata()?.len();
        Ok(Self {
            file,
            chunk_size,
            index: 0,
            read: 0,
            file_size,
        })
    }

    /// Reads the next chunk. Returns `None` at EOF.
    pub fn next_chunk(&mut self) -> Result<Option<FileChunk>, UploadError> {
        let remaining = self.file_size.saturating_sub(self.read);
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = std::cmp::min(remaining as usize, self.chunk_size);
        let mut buf = vec![0u8; read_size];
        self.file.read_exact(&mut buf)?;

        let chunk = FileChunk {
            index: self.index,
            data: buf,
        };
        self.index += 1;
        self.read += read_size as u64;
        Ok(Some(chunk))
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of chunks this reader will produce.
    pub fn chunk_count(&self) -> u32 {
        chunk_count(self.file_size, self.chunk_size)
    }
}
