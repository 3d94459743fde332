//! veo-drive library crate.
//!
//! Generates a video from a text prompt with Veo through the Gemini API and
//! uploads it to Google Drive. This module exposes the components for the
//! binary and for integration testing.

pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod drive;
pub mod naming;
pub mod pipeline;
pub mod veo;

pub use auth::{AuthError, CredentialStore, Session};
pub use config::Config;
pub use drive::{DriveUploader, UploadDescriptor, UploadError, UploadedFile};
pub use pipeline::{Pipeline, PipelineError, RunOutcome, RunRequest};
pub use veo::{GeneratedVideo, GenerationError, VeoGenerator};
