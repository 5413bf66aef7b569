use std::path::{Path, PathBuf};

use serde::Deserialize;
use uuid::Uuid;

use crate::{UploadError, chunked};

/// One file's upload, fixed at the moment the upload starts.
///
/// The file identifier is freshly generated per task and never reused;
/// it is the server-side grouping key for the file's chunks.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub file_id: String,
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub chunk_size: usize,
    pub chunk_count: u32,
}

impl UploadTask {
    /// Builds a task for `path`, failing before any network call if
    /// the file is missing.
    pub fn new(path: &Path, chunk_size: usize) -> Result<Self, UploadError> {
        if !path.is_file() {
            return Err(UploadError::FileNotFound(path.to_path_buf()));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::FileNotFound(path.to_path_buf()))?;
        let size = std::fs::metadata(path)?.len();

        Ok(Self {
            file_id: Uuid::new_v4().to_string(),
            path: path.to_path_buf(),
            file_name,
            size,
            chunk_size,
            chunk_count: chunked::chunk_count(size, chunk_size),
        })
    }
}

/// Merge response body on success.
#[derive(Debug, Deserialize)]
pub(crate) struct MergeResponse {
    #[serde(rename = "fileName")]
    pub file_name: String,
}

/// Structured error body some failure responses carry.
#[derive(Debug, Deserialize)]
pub(crate) struct ServerError {
    pub error: String,
}

/// A successfully uploaded and merged file.
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Server-assigned file name (possibly de-duplicated or renamed).
    pub file_name: String,
    /// Public download URL.
    pub url: String,
}

/// Outcome for one file within a collection upload.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<UploadResult, UploadError>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a multi-file collection upload.
///
/// Overall success only needs one file to make it; the per-file
/// outcomes are kept so callers can detect partial failure.
#[derive(Debug)]
pub struct CollectionOutcome {
    pub collection_id: String,
    pub collection_url: String,
    pub uploaded: usize,
    pub total: usize,
    pub files: Vec<FileOutcome>,
}

/// Result of [`Uploader::upload_many`](crate::Uploader::upload_many).
///
/// A single-path call degenerates to a plain file upload and no
/// collection identifier is generated.
#[derive(Debug)]
pub enum BatchResult {
    Single(UploadResult),
    Collection(CollectionOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn task_computes_chunk_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 10]).unwrap();

        let task = UploadTask::new(&path, 4).unwrap();
        assert_eq!(task.size, 10);
        assert_eq!(task.chunk_count, 3);
        assert_eq!(task.file_name, "file.bin");
        assert!(!task.file_id.is_empty());
    }

    #[test]
    fn task_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadTask::new(&dir.path().join("absent.bin"), 4).unwrap_err();
        assert!(matches!(err, UploadError::FileNotFound(_)));
    }

    #[test]
    fn task_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadTask::new(dir.path(), 4).unwrap_err();
        assert!(matches!(err, UploadError::FileNotFound(_)));
    }

    #[test]
    fn file_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        std::fs::write(&path, b"x").unwrap();

        let t1 = UploadTask::new(&path, 4).unwrap();
        let t2 = UploadTask::new(&path, 4).unwrap();
        assert_ne!(t1.file_id, t2.file_id);
    }

    #[test]
    fn merge_response_parses_server_field() {
        let resp: MergeResponse = serde_json::from_str(r#"{"fileName":"abc123"}"#).unwrap();
        assert_eq!(resp.file_name, "abc123");
    }

    #[test]
    fn server_error_parses() {
        let err: ServerError = serde_json::from_str(r#"{"error":"quota exceeded"}"#).unwrap();
        assert_eq!(err.error, "quota exceeded");
    }
}
