//! Upload orchestration: per-file pipeline and collection uploads.
//!
//! Chunks of one file go out strictly in index order and files within
//! a collection strictly sequentially; the server-side merge needs a
//! complete, ordered chunk set per file identifier before the next
//! operation starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use sfs_session::Session;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunked::{self, ChunkReader};
use crate::progress::{NoopProgress, Phase, ProgressObserver};
use crate::retry::{ChunkFailure, RetryPolicy, is_fatal_status};
use crate::types::{
    BatchResult, CollectionOutcome, FileOutcome, MergeResponse, ServerError, UploadResult,
    UploadTask,
};
use crate::{CHUNK_SIZE, CHUNK_UPLOAD_TIMEOUT, UploadError};

/// Uploads files to one SFS server over an authenticated session.
pub struct Uploader {
    session: Session,
    chunk_size: usize,
    retry: RetryPolicy,
    progress: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl Uploader {
    /// Creates an uploader over an established session.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            chunk_size: CHUNK_SIZE,
            retry: RetryPolicy::default(),
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Installs a progress observer.
    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = observer;
        self
    }

    /// Returns a cancellation token for this uploader. Cancellation is
    /// honored between chunks and between retry attempts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The underlying session, e.g. for `ensure_authenticated`.
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[cfg(test)]
    fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[cfg(test)]
    fn with_immediate_retry(mut self) -> Self {
        self.retry = RetryPolicy::immediate();
        self
    }

    /// Uploads one file: checksum, ordered chunks with retry, merge.
    ///
    /// Any chunk failure aborts the file without issuing the merge.
    /// On success the result carries the server-assigned name and the
    /// public download URL.
    pub async fn upload_file(
        &self,
        path: &Path,
        collection_id: Option<&str>,
    ) -> Result<UploadResult, UploadError> {
        self.check_cancelled()?;
        let task = UploadTask::new(path, self.chunk_size)?;
        info!(
            file = %task.file_name,
            size = task.size,
            chunks = task.chunk_count,
            "starting upload"
        );

        self.progress.on_progress(Phase::Checksum, 0, 1);
        let checksum = {
            let path = task.path.clone();
            tokio::task::spawn_blocking(move || chunked::calculate_file_checksum(&path))
                .await
                .map_err(|e| UploadError::Checksum(format!("task join error: {e}")))??
        };
        self.progress.on_progress(Phase::Checksum, 1, 1);

        let mut reader = ChunkReader::new(&task.path, task.chunk_size)?;
        loop {
            self.check_cancelled()?;

            let (returned, chunk) = tokio::task::spawn_blocking(move || {
                let mut r = reader;
                let chunk = r.next_chunk();
                (r, chunk)
            })
            .await
            .map_err(|e| UploadError::Io(std::io::Error::other(format!("task join error: {e}"))))?;
            reader = returned;

            let Some(chunk) = chunk? else {
                break;
            };

            self.upload_chunk_with_retry(&task.file_id, chunk.index, chunk.data)
                .await?;
            self.progress.on_progress(
                Phase::Uploading,
                u64::from(chunk.index) + 1,
                u64::from(task.chunk_count),
            );
        }

        self.check_cancelled()?;
        self.progress.on_progress(
            Phase::Merging,
            u64::from(task.chunk_count),
            u64::from(task.chunk_count),
        );
        self.merge(&task, &checksum, collection_id).await
    }

    /// Uploads several files, grouping two or more into a collection.
    ///
    /// Files go out sequentially; one failing file does not stop the
    /// rest. Overall success needs at least one file through, and the
    /// per-file outcomes are reported either way.
    pub async fn upload_many(&self, paths: &[PathBuf]) -> Result<BatchResult, UploadError> {
        if let [single] = paths {
            return Ok(BatchResult::Single(self.upload_file(single, None).await?));
        }

        let collection_id = Uuid::new_v4().to_string();
        let total = paths.len();
        let mut files = Vec::with_capacity(total);

        for (i, path) in paths.iter().enumerate() {
            self.progress
                .on_progress(Phase::File, i as u64 + 1, total as u64);

            let result = self.upload_file(path, Some(&collection_id)).await;
            if matches!(result, Err(UploadError::Cancelled)) {
                return Err(UploadError::Cancelled);
            }
            if let Err(ref e) = result {
                warn!(file = %path.display(), error = %e, "file upload failed");
            }
            files.push(FileOutcome {
                path: path.clone(),
                result,
            });
        }

        let uploaded = files.iter().filter(|f| f.succeeded()).count();
        if uploaded == 0 {
            return Err(UploadError::AllFailed { total });
        }

        info!(uploaded, total, collection = %collection_id, "collection upload finished");
        Ok(BatchResult::Collection(CollectionOutcome {
            collection_url: format!("{}c/{collection_id}", self.session.base_url()),
            collection_id,
            uploaded,
            total,
            files,
        }))
    }

    /// Runs the per-chunk retry state machine.
    ///
    /// Up to the attempt budget, with the backoff table applied only
    /// between attempts. Fatal server rejections stop immediately.
    async fn upload_chunk_with_retry(
        &self,
        file_id: &str,
        index: u32,
        data: Vec<u8>,
    ) -> Result<(), UploadError> {
        let max = self.retry.max_attempts();
        let mut last_failure = String::new();

        for attempt in 1..=max {
            self.check_cancelled()?;
            if let Some(delay) = self.retry.delay_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            match self.try_upload_chunk(file_id, index, data.clone()).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(chunk = index, attempt, "chunk uploaded after retry");
                    }
                    return Ok(());
                }
                Err(ChunkFailure::Fatal(reason)) => {
                    error!(chunk = index, reason = %reason, "server rejected chunk");
                    return Err(UploadError::Chunk { index, reason });
                }
                Err(ChunkFailure::Transient(reason)) => {
                    warn!(chunk = index, attempt, max, reason = %reason, "chunk attempt failed");
                    last_failure = reason;
                }
            }
        }

        Err(UploadError::Chunk {
            index,
            reason: format!("all {max} attempts failed, last: {last_failure}"),
        })
    }

    /// One chunk upload attempt, classified fatal or transient.
    async fn try_upload_chunk(
        &self,
        file_id: &str,
        index: u32,
        data: Vec<u8>,
    ) -> Result<(), ChunkFailure> {
        let url = format!("{}upload", self.session.base_url());
        let resp = self
            .session
            .http()
            .post(&url)
            .query(&[("chunkIndex", index.to_string()), ("uuid", file_id.to_string())])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .timeout(CHUNK_UPLOAD_TIMEOUT)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            // Network errors and timeouts both land here.
            Err(e) => return Err(ChunkFailure::Transient(e.to_string())),
        };

        let status = resp.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = resp.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ServerError>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("HTTP {status}"));

        if is_fatal_status(status) {
            Err(ChunkFailure::Fatal(message))
        } else {
            Err(ChunkFailure::Transient(message))
        }
    }

    /// Asks the server to reassemble the uploaded chunks.
    ///
    /// The merge is never retried: a failure here fails the file even
    /// though every chunk made it.
    async fn merge(
        &self,
        task: &UploadTask,
        checksum: &str,
        collection_id: Option<&str>,
    ) -> Result<UploadResult, UploadError> {
        let url = format!("{}merge", self.session.base_url());
        let mut params = vec![
            ("name".to_string(), task.file_name.clone()),
            ("chunkCount".to_string(), task.chunk_count.to_string()),
            ("uuid".to_string(), task.file_id.clone()),
            ("checksum".to_string(), checksum.to_string()),
        ];
        if let Some(id) = collection_id {
            params.push(("collectionID".to_string(), id.to_string()));
        }

        let resp = self
            .session
            .http()
            .post(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| UploadError::Merge(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| UploadError::Merge(e.to_string()))?;

        if status != StatusCode::OK {
            let message = serde_json::from_slice::<ServerError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(UploadError::Merge(message));
        }

        let merged: MergeResponse = serde_json::from_slice(&body)
            .map_err(|e| UploadError::Merge(format!("malformed response: {e}")))?;
        info!(file = %task.file_name, server_name = %merged.file_name, "upload merged");

        Ok(UploadResult {
            url: format!("{}d/{}", self.session.base_url(), merged.file_name),
            file_name: merged.file_name,
        })
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}
