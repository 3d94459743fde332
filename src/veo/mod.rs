//! Veo video generation through the Gemini API.
//!
//! A prompt is sent to `generateContent`; the reply is decoded into a
//! [`VideoReference`] and the bytes are fetched from the HTTPS link or
//! Cloud Storage object it points at.

mod client;
mod fetch;
mod response;

pub use client::{validate_prompt, GenerationError, VeoClient, VeoGenerator, GEMINI_API_BASE_URL};
pub use fetch::{HttpVideoFetcher, VideoFetcher, VideoSource};
pub use response::{
    Candidate, Content, FileData, GenerateContentResponse, Part, VideoReference,
};

/// Bytes of a generated video and their content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    bytes: Vec<u8>,
    content_type: String,
}

impl GeneratedVideo {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<u8>, String) {
        (self.bytes, self.content_type)
    }
}
