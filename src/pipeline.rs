//! Generate → download → upload orchestration for a single prompt.
//!
//! The three phases run strictly in order and the first failure ends the
//! run. Collaborators sit behind traits so the sequencing can be exercised
//! without network access.

use async_trait::async_trait;

use crate::auth::{AuthError, CredentialStore, Session};
use crate::cache::VideoCache;
use crate::config::API_KEY_ENV;
use crate::drive::{DriveUploader, UploadDescriptor, UploadError, UploadedFile};
use crate::naming::{derive_filename, timestamp_now};
use crate::veo::{GeneratedVideo, GenerationError, VeoGenerator};

/// Source of the Drive session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire_session(&self) -> Result<Session, AuthError>;
}

/// Produces video bytes for a prompt.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, api_key: &str) -> Result<GeneratedVideo, GenerationError>;
}

/// Stores video bytes and returns a shareable link.
#[async_trait]
pub trait VideoUploader: Send + Sync {
    async fn upload(
        &self,
        session: &Session,
        descriptor: UploadDescriptor,
    ) -> Result<UploadedFile, UploadError>;
}

#[async_trait]
impl SessionProvider for CredentialStore {
    async fn acquire_session(&self) -> Result<Session, AuthError> {
        CredentialStore::acquire_session(self).await
    }
}

#[async_trait]
impl VideoGenerator for VeoGenerator {
    async fn generate(&self, prompt: &str, api_key: &str) -> Result<GeneratedVideo, GenerationError> {
        VeoGenerator::generate(self, prompt, api_key).await
    }
}

#[async_trait]
impl VideoUploader for DriveUploader {
    async fn upload(
        &self,
        session: &Session,
        descriptor: UploadDescriptor,
    ) -> Result<UploadedFile, UploadError> {
        DriveUploader::upload(self, session, descriptor).await
    }
}

/// One invocation's inputs.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub prompt: String,
    pub output_filename: Option<String>,
    pub folder_id: Option<String>,
    /// Ignore a cached video for this prompt.
    pub fresh: bool,
}

/// How a run that reached Drive ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Uploaded { name: String, file: UploadedFile },
    /// The bytes were stored but Drive did not return the id or link.
    UploadedWithoutLink { name: String, file_id: Option<String> },
}

impl RunOutcome {
    pub fn link(&self) -> Option<&str> {
        match self {
            RunOutcome::Uploaded { file, .. } => Some(&file.web_view_link),
            RunOutcome::UploadedWithoutLink { .. } => None,
        }
    }
}

/// Errors that end a run, tagged with the phase they came from.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Google Gemini API key not found in environment variable '{var}'")]
    MissingApiKey { var: &'static str },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl PipelineError {
    pub fn phase(&self) -> &'static str {
        match self {
            PipelineError::MissingApiKey { .. } => "configuration",
            PipelineError::Auth(_) => "authentication",
            PipelineError::Generation(_) => "generation",
            PipelineError::Upload(_) => "upload",
        }
    }
}

type Clock = Box<dyn Fn() -> String + Send + Sync>;

/// Sequences authentication, generation and upload.
pub struct Pipeline<'a> {
    sessions: &'a dyn SessionProvider,
    generator: &'a dyn VideoGenerator,
    uploader: &'a dyn VideoUploader,
    cache: Option<VideoCache>,
    clock: Clock,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        sessions: &'a dyn SessionProvider,
        generator: &'a dyn VideoGenerator,
        uploader: &'a dyn VideoUploader,
    ) -> Self {
        Self {
            sessions,
            generator,
            uploader,
            cache: None,
            clock: Box::new(timestamp_now),
        }
    }

    /// Keep generated videos until they are uploaded.
    pub fn with_cache(mut self, cache: Option<VideoCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Override the timestamp used in synthesized filenames.
    pub fn with_clock(mut self, clock: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Run one prompt end to end.
    ///
    /// The API key is checked before anything else is touched.
    pub async fn run(
        &self,
        request: &RunRequest,
        api_key: Option<&str>,
    ) -> Result<RunOutcome, PipelineError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(PipelineError::MissingApiKey { var: API_KEY_ENV })?;

        println!("--- Authenticating with Google Drive ---");
        let session = self.sessions.acquire_session().await?;
        println!("Google Drive session ready.");

        let video = match self.cached_video(request) {
            Some(video) => {
                println!(
                    "Using previously generated video for this prompt ({} bytes, {}).",
                    video.len(),
                    video.content_type()
                );
                video
            }
            None => {
                println!("\n--- Generating Video for Prompt: '{}' ---", request.prompt);
                let video = self.generator.generate(&request.prompt, api_key).await?;
                self.remember(&request.prompt, &video);
                video
            }
        };

        let name = derive_filename(
            request.output_filename.as_deref(),
            &request.prompt,
            video.content_type(),
            &(self.clock)(),
        );

        println!("\n--- Uploading '{}' to Google Drive ---", name);
        let descriptor = UploadDescriptor::new(name.clone(), video, request.folder_id.clone());

        match self.uploader.upload(&session, descriptor).await {
            Ok(file) => {
                self.forget(&request.prompt);
                println!("SUCCESS: File '{}' uploaded to Google Drive.", name);
                println!("File ID: {}", file.id);
                println!("View Link: {}", file.web_view_link);
                Ok(RunOutcome::Uploaded { name, file })
            }
            Err(UploadError::MissingResponseFields { file_id, .. }) => {
                self.forget(&request.prompt);
                log::warn!("Drive response for '{}' lacked id or webViewLink", name);
                Ok(RunOutcome::UploadedWithoutLink { name, file_id })
            }
            Err(e) => {
                if self.cache.is_some() {
                    println!(
                        "The generated video was kept locally; re-run the same command to retry the upload."
                    );
                }
                Err(e.into())
            }
        }
    }

    fn cached_video(&self, request: &RunRequest) -> Option<GeneratedVideo> {
        if request.fresh {
            return None;
        }
        self.cache.as_ref()?.get(&request.prompt)
    }

    fn remember(&self, prompt: &str, video: &GeneratedVideo) {
        if let Some(cache) = &self.cache {
            match cache.store(prompt, video) {
                Ok(path) => log::debug!("Cached generated video at {}", path.display()),
                Err(e) => log::warn!("Failed to cache generated video: {}", e),
            }
        }
    }

    fn forget(&self, prompt: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.remove(prompt) {
                log::warn!("Failed to evict cached video: {}", e);
            }
        }
    }
}
