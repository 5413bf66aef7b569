//! Chunked upload engine for the Simple File Sharer server.
//!
//! Files are split into fixed-size chunks, each uploaded as one HTTP
//! request with retry-on-failure, then reassembled by a server-side
//! merge keyed on a per-file identifier. Multiple files can be grouped
//! into a collection sharing one identifier.
//!
//! # Pipeline
//!
//! 1. **Checksum** — stream the whole file through SHA-256
//! 2. **Chunks** — upload chunks strictly in index order, each wrapped
//!    in the retry policy
//! 3. **Merge** — ask the server to concatenate the chunks and verify
//!    the checksum

pub mod chunked;
pub mod client;
pub mod progress;
pub mod retry;
pub mod types;

pub use chunked::{ChunkReader, FileChunk, calculate_file_checksum, checksum_bytes};
pub use client::Uploader;
pub use progress::{NoopProgress, Phase, ProgressObserver};
pub use retry::RetryPolicy;
pub use types::{BatchResult, CollectionOutcome, FileOutcome, UploadResult, UploadTask};

use std::path::PathBuf;
use std::time::Duration;

/// Chunk size: 2 MiB. Must match the server expectation exactly; a
/// mismatch breaks the merge protocol.
pub const CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Maximum attempts per chunk, counting the first.
pub const MAX_ATTEMPTS: u32 = 10;

/// Backoff before attempt n (1-indexed, n >= 2): exponential growth
/// capped at 30 s. `RETRY_DELAYS[n - 2]` seconds.
pub const RETRY_DELAYS: [u64; 10] = [1, 2, 4, 8, 16, 30, 30, 30, 30, 30];

/// Bound on a single chunk upload request; expiry counts as a
/// transient failure.
pub const CHUNK_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors produced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("chunk {index} failed: {reason}")]
    Chunk { index: u32, reason: String },

    #[error("merge failed: {0}")]
    Merge(String),

    #[error("checksum failed: {0}")]
    Checksum(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("all {total} uploads failed")]
    AllFailed { total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session error: {0}")]
    Session(#[from] sfs_session::SessionError),
}
