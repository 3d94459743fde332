//! DriveUploader - resumable, chunked uploads to Google Drive v3.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use serde::{Deserialize, Serialize};

use super::progress::ProgressTracker;
use super::{UploadDescriptor, UploadError, UploadedFile};
use crate::auth::Session;
use crate::config::{Config, DEFAULT_CHUNK_SIZE};

/// Default base URL for Drive uploads.
pub const DRIVE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Fields requested on the created file.
const RESPONSE_FIELDS: &str = "id,webViewLink";

/// Drive answers an accepted, unfinished chunk with 308 Resume Incomplete.
const RESUME_INCOMPLETE: u16 = 308;

/// Timeout for a single chunk request (5 minutes).
const CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type ProgressHandler = Arc<dyn Fn(u8) + Send + Sync>;

#[derive(Debug, Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parents: Vec<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

fn print_progress(percent: u8) {
    println!("Uploaded {}%", percent);
}

/// Parse the `Range: bytes=0-N` header of a 308 reply into a byte count.
fn persisted_bytes(range: &str) -> Option<u64> {
    let end = range.trim().strip_prefix("bytes=")?.split('-').nth(1)?;
    end.trim().parse::<u64>().ok()?.checked_add(1)
}

/// Client for Drive's resumable upload endpoint.
pub struct DriveUploader {
    base_url: String,
    chunk_size: usize,
    http_client: reqwest::Client,
    on_progress: ProgressHandler,
}

impl DriveUploader {
    pub fn new(config: &Config) -> Result<Self, UploadError> {
        Self::with_base_url(config.endpoints.drive_upload.clone(), config.upload.chunk_size)
    }

    /// Create an uploader against a custom endpoint.
    ///
    /// Useful for testing against a mock server with small chunks.
    pub fn with_base_url(base_url: String, chunk_size: usize) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(CHUNK_TIMEOUT)
            // 308 is Resume Incomplete here, not a redirect.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                chunk_size
            },
            http_client,
            on_progress: Arc::new(print_progress),
        })
    }

    /// Replace how progress percentages are reported.
    pub fn with_progress_handler(mut self, handler: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Arc::new(handler);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of chunks needed for `total` bytes (an empty body is one request).
    pub fn chunk_count(&self, total: usize) -> usize {
        total.div_ceil(self.chunk_size).max(1)
    }

    /// Upload the descriptor's bytes as a new Drive file.
    ///
    /// Chunks are sent in order; the first failing chunk aborts the upload
    /// and later chunks are never sent. A partially written file is left as is.
    /// A 308 reply must confirm the whole chunk was persisted; a shorter
    /// `Range`, or none at all, counts as a failed chunk.
    ///
    /// # Errors
    ///
    /// `UploadError::Initiate` if the upload session cannot be opened,
    /// `UploadError::ChunkUpload` if a chunk fails,
    /// `UploadError::MissingResponseFields` if the finished upload's reply
    /// lacks the file id or view link.
    pub async fn upload(
        &self,
        session: &Session,
        descriptor: UploadDescriptor,
    ) -> Result<UploadedFile, UploadError> {
        let session_uri = self.start_session(session, &descriptor).await?;
        log::debug!("Drive upload session opened: {}", session_uri);

        let bytes = descriptor.bytes;
        let total = bytes.len();
        let total_chunks = self.chunk_count(total);
        let mut progress = ProgressTracker::new(total as u64);
        let mut offset = 0usize;
        let mut chunk = 0usize;

        println!("Starting upload...");
        loop {
            chunk += 1;
            let end = (offset + self.chunk_size).min(total);
            let content_range = if total == 0 {
                "bytes */0".to_string()
            } else {
                format!("bytes {}-{}/{}", offset, end - 1, total)
            };

            let chunk_error = |message: String| {
                log::error!("Chunk {}/{} failed: {}", chunk, total_chunks, message);
                UploadError::ChunkUpload {
                    chunk,
                    total_chunks,
                    message,
                }
            };

            let response = self
                .http_client
                .put(&session_uri)
                .header("Authorization", session.bearer())
                .header(CONTENT_RANGE, content_range)
                .body(bytes[offset..end].to_vec())
                .send()
                .await
                .map_err(|e| chunk_error(e.to_string()))?;

            let status = response.status();

            if status.as_u16() == RESUME_INCOMPLETE {
                // No Range header means nothing has been persisted yet.
                let persisted = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(persisted_bytes)
                    .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                    .unwrap_or(0);

                if persisted >= total {
                    return Err(chunk_error(
                        "server reported an incomplete upload after the final chunk".to_string(),
                    ));
                }

                // Anything short of the whole chunk would mean resending bytes.
                if persisted != end {
                    return Err(chunk_error(format!(
                        "server persisted {} of {} bytes sent so far",
                        persisted, end
                    )));
                }

                offset = persisted;
                if let Some(percent) = progress.update(offset as u64) {
                    (self.on_progress)(percent);
                }
                continue;
            }

            if status.is_success() {
                if let Some(percent) = progress.update(total as u64) {
                    (self.on_progress)(percent);
                }
                let file: FileResource = response.json().await.unwrap_or_else(|e| {
                    log::warn!("Could not decode Drive upload response: {}", e);
                    FileResource::default()
                });
                return finish(file);
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(chunk_error(format!("status {}: {}", status, error_text)));
        }
    }

    /// Open a resumable session and return its URI.
    async fn start_session(
        &self,
        session: &Session,
        descriptor: &UploadDescriptor,
    ) -> Result<String, UploadError> {
        let url = format!(
            "{}/files?uploadType=resumable&fields={}",
            self.base_url, RESPONSE_FIELDS
        );
        let metadata = FileMetadata {
            name: &descriptor.name,
            parents: descriptor.folder_id.as_deref().into_iter().collect(),
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", session.bearer())
            .header("X-Upload-Content-Type", &descriptor.content_type)
            .header("X-Upload-Content-Length", descriptor.bytes.len().to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| UploadError::Initiate(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadError::Initiate(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::Initiate("no upload session URI (Location header) in response".to_string())
            })
    }
}

fn finish(file: FileResource) -> Result<UploadedFile, UploadError> {
    match (file.id, file.web_view_link) {
        (Some(id), Some(web_view_link)) => Ok(UploadedFile { id, web_view_link }),
        (file_id, web_view_link) => Err(UploadError::MissingResponseFields {
            file_id,
            web_view_link,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_bytes() {
        assert_eq!(persisted_bytes("bytes=0-524287"), Some(524288));
        assert_eq!(persisted_bytes("bytes=0-0"), Some(1));
        assert_eq!(persisted_bytes("garbage"), None);
        assert_eq!(persisted_bytes("bytes=0-18446744073709551615"), None);
    }

    #[test]
    fn test_chunk_count() {
        let uploader = DriveUploader::with_base_url("http://x".to_string(), 4).unwrap();
        assert_eq!(uploader.chunk_count(0), 1);
        assert_eq!(uploader.chunk_count(4), 1);
        assert_eq!(uploader.chunk_count(5), 2);
        assert_eq!(uploader.chunk_count(20), 5);
    }

    #[test]
    fn test_default_chunk_size_is_five_mib() {
        let uploader = DriveUploader::new(&Config::default()).unwrap();
        assert_eq!(uploader.chunk_size(), 5 * 1024 * 1024);
        assert_eq!(uploader.base_url(), DRIVE_UPLOAD_BASE_URL);
    }

    #[test]
    fn test_metadata_omits_parents_without_folder() {
        let metadata = FileMetadata {
            name: "clip.mp4",
            parents: vec![],
        };
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            serde_json::json!({"name": "clip.mp4"})
        );

        let metadata = FileMetadata {
            name: "clip.mp4",
            parents: vec!["folder123"],
        };
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            serde_json::json!({"name": "clip.mp4", "parents": ["folder123"]})
        );
    }

    #[test]
    fn test_finish_requires_both_fields() {
        let ok = finish(FileResource {
            id: Some("abc".to_string()),
            web_view_link: Some("https://drive.google.com/file/d/abc/view".to_string()),
        });
        assert!(ok.is_ok());

        let missing = finish(FileResource {
            id: Some("abc".to_string()),
            web_view_link: None,
        });
        match missing {
            Err(UploadError::MissingResponseFields { file_id, web_view_link }) => {
                assert_eq!(file_id.as_deref(), Some("abc"));
                assert!(web_view_link.is_none());
            }
            other => panic!("expected MissingResponseFields, got {:?}", other),
        }
    }
}
