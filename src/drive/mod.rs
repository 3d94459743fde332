//! Google Drive upload.
//!
//! Videos are stored with Drive's resumable upload protocol: one request
//! opens an upload session, then the bytes follow in fixed-size chunks.

mod progress;
mod upload;

pub use progress::ProgressTracker;
pub use upload::{DriveUploader, DRIVE_UPLOAD_BASE_URL};

use crate::veo::GeneratedVideo;

/// Everything needed to store one video on Drive.
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Parent folder; the Drive root when `None`.
    pub folder_id: Option<String>,
}

impl UploadDescriptor {
    pub fn new(name: impl Into<String>, video: GeneratedVideo, folder_id: Option<String>) -> Self {
        let (bytes, content_type) = video.into_parts();
        Self {
            name: name.into(),
            bytes,
            content_type,
            folder_id,
        }
    }
}

/// A stored file and its shareable link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub web_view_link: String,
}

/// Errors that can occur while uploading to Drive.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Could not start the Drive upload: {0}")]
    Initiate(String),

    #[error("Error during chunk upload (chunk {chunk} of {total_chunks}): {message}")]
    ChunkUpload {
        /// 1-based index of the failing chunk
        chunk: usize,
        total_chunks: usize,
        message: String,
    },

    #[error("Upload finished but the response lacked an id or view link")]
    MissingResponseFields {
        file_id: Option<String>,
        web_view_link: Option<String>,
    },

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
