//! VeoClient - handles communication with the Gemini API for Veo models.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::fetch::{HttpVideoFetcher, VideoFetcher, VideoSource};
use super::response::GenerateContentResponse;
use super::GeneratedVideo;
use crate::config::Config;

/// Default base URL for the Gemini API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Timeout for the model lookup (30 seconds).
const MODEL_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Validate a prompt before sending to the API.
///
/// # Returns
/// `Ok(())` if the prompt is valid, `Err(GenerationError::EmptyPrompt)` for an
/// empty or whitespace-only prompt.
pub fn validate_prompt(prompt: &str) -> Result<(), GenerationError> {
    if prompt.trim().is_empty() {
        return Err(GenerationError::EmptyPrompt);
    }
    Ok(())
}

/// Request body for `generateContent`.
#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Client for one model on the Gemini API.
pub struct VeoClient {
    api_key: String,
    base_url: String,
    model: String,
    generation_timeout: Duration,
    http_client: reqwest::Client,
}

impl VeoClient {
    /// Create a client for `model` against `base_url`.
    ///
    /// The model name is used as given (`models/veo-1.0`); a missing
    /// `models/` prefix is added.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        generation_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            generation_timeout,
            http_client,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the model.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn model_url(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }

    pub fn generate_url(&self) -> String {
        format!("{}:generateContent", self.model_url())
    }

    /// Confirm the backend knows the model.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::ModelInit` if the lookup fails or the model
    /// is unknown or unavailable to this API key.
    pub async fn check_model(&self) -> Result<(), GenerationError> {
        let model_init = |message: String| GenerationError::ModelInit {
            model: self.model.clone(),
            message,
        };

        let response = self
            .http_client
            .get(self.model_url())
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(MODEL_LOOKUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| model_init(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(model_init(format!("status {}: {}", status, error_text)));
        }

        Ok(())
    }

    /// Submit the prompt and decode the reply.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::EmptyPrompt` for an empty prompt and
    /// `GenerationError::GenerationRequest` for transport failures, error
    /// statuses, or an undecodable body.
    pub async fn generate_content(
        &self,
        prompt: &str,
    ) -> Result<GenerateContentResponse, GenerationError> {
        validate_prompt(prompt)?;

        let request_body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http_client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.generation_timeout)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::GenerationRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::GenerationRequest(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GenerationError::GenerationRequest(format!("malformed response: {}", e)))
    }
}

/// Runs the whole generation phase: model check, prompt, decode, fetch.
pub struct VeoGenerator {
    base_url: String,
    model: String,
    generation_timeout: Duration,
    default_mime_type: String,
    fetcher: Arc<dyn VideoFetcher>,
}

impl VeoGenerator {
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        let fetcher = HttpVideoFetcher::new(config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Use a custom fetcher for the video bytes.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn VideoFetcher>) -> Self {
        Self {
            base_url: config.endpoints.generation.clone(),
            model: config.model_id.clone(),
            generation_timeout: config.timeouts.generation(),
            default_mime_type: config.default_mime_type.clone(),
            fetcher,
        }
    }

    /// Generate a video for `prompt` and fetch its bytes.
    ///
    /// Every failure aborts the attempt; nothing is retried.
    pub async fn generate(
        &self,
        prompt: &str,
        api_key: &str,
    ) -> Result<GeneratedVideo, GenerationError> {
        validate_prompt(prompt)?;

        let client = VeoClient::new(api_key, &self.base_url, &self.model, self.generation_timeout)?;
        println!("Using Veo model: {}", client.model());
        client.check_model().await?;

        println!(
            "Sending request to Gemini API for video generation (this might take a significant amount of time)..."
        );
        let response = client.generate_content(prompt).await?;

        let reference = response.video_reference(&self.default_mime_type)?;
        println!(
            "Video generation successful. File URI: {}, MIME type: {}",
            reference.uri, reference.mime_type
        );

        let source = VideoSource::parse(&reference.uri)?;
        let video = GeneratedVideo::new(self.fetcher.fetch(&source).await?, reference.mime_type);
        if video.is_empty() {
            return Err(GenerationError::Download {
                uri: reference.uri,
                message: "no bytes retrieved".to_string(),
            });
        }
        println!("Successfully downloaded video ({} bytes).", video.len());

        Ok(video)
    }
}

/// Errors that can occur while generating and retrieving a video.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Empty prompt")]
    EmptyPrompt,

    #[error("Could not initialize Veo model '{model}': {message}")]
    ModelInit {
        /// Model identifier that was rejected
        model: String,
        message: String,
    },

    #[error("Generation request failed: {0}")]
    GenerationRequest(String),

    #[error("No valid candidates or content parts found in the response")]
    EmptyResponse,

    #[error("Could not find video data (as file data) in the response")]
    NoVideoPart,

    #[error("Unsupported file URI scheme: {uri} (supported: https://, gs://)")]
    UnsupportedUriScheme { uri: String },

    #[error("Failed to download video from '{uri}': {message}")]
    Download { uri: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}
