//! Retrieval of generated video bytes by URI scheme.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;

use super::client::GenerationError;
use crate::config::Config;

const HTTPS_SCHEME: &str = "https://";
const CLOUD_STORAGE_SCHEME: &str = "gs://";

/// Connection timeout for downloads.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a generated video can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Direct (usually signed) HTTPS link.
    Https(String),
    /// Cloud Storage object `gs://{bucket}/{key}`.
    CloudObject { bucket: String, key: String },
}

impl VideoSource {
    /// Classify a video URI.
    ///
    /// # Errors
    ///
    /// `GenerationError::UnsupportedUriScheme` for any scheme other than
    /// `https://` and `gs://` (matched case-sensitively); `GenerationError::Download` for a `gs://` URI
    /// missing its bucket or object key.
    pub fn parse(uri: &str) -> Result<Self, GenerationError> {
        if uri.starts_with(HTTPS_SCHEME) {
            return Ok(VideoSource::Https(uri.to_string()));
        }

        if let Some(path) = uri.strip_prefix(CLOUD_STORAGE_SCHEME) {
            return match path.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                    Ok(VideoSource::CloudObject {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                }
                _ => Err(GenerationError::Download {
                    uri: uri.to_string(),
                    message: "expected gs://<bucket>/<object>".to_string(),
                }),
            };
        }

        Err(GenerationError::UnsupportedUriScheme {
            uri: uri.to_string(),
        })
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Https(url) => write!(f, "{}", url),
            VideoSource::CloudObject { bucket, key } => write!(f, "gs://{}/{}", bucket, key),
        }
    }
}

/// Reads the bytes behind a [`VideoSource`].
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, source: &VideoSource) -> Result<Vec<u8>, GenerationError>;
}

/// Fetches over HTTPS and through the Cloud Storage JSON API.
pub struct HttpVideoFetcher {
    http_client: reqwest::Client,
    storage_base_url: String,
    storage_token: Option<String>,
    timeout: Duration,
}

impl HttpVideoFetcher {
    /// Create a fetcher from config, taking the Cloud Storage token from
    /// `GOOGLE_CLOUD_ACCESS_TOKEN` when set.
    pub fn new(config: &Config) -> Result<Self, GenerationError> {
        let storage_token = std::env::var(crate::config::STORAGE_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty());
        Self::with_storage(
            config.endpoints.storage.clone(),
            storage_token,
            config.timeouts.download(),
        )
    }

    pub fn with_storage(
        storage_base_url: String,
        storage_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            storage_base_url,
            storage_token,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Media download URL for a Cloud Storage object.
    pub fn object_url(&self, bucket: &str, key: &str) -> Result<Url, String> {
        let mut url = Url::parse(&self.storage_base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("invalid storage endpoint '{}'", self.storage_base_url))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", key]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    /// Stream a GET response into memory.
    ///
    /// The configured timeout bounds the whole transfer.
    pub async fn download(&self, url: &str, bearer: Option<&str>) -> Result<Vec<u8>, String> {
        let mut request = self.http_client.get(url).timeout(self.timeout);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("status {}: {}", status, error_text));
        }

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err("response body was empty".to_string());
        }

        Ok(bytes)
    }
}

#[async_trait]
impl VideoFetcher for HttpVideoFetcher {
    async fn fetch(&self, source: &VideoSource) -> Result<Vec<u8>, GenerationError> {
        let result = match source {
            VideoSource::Https(url) => {
                println!("Downloading from HTTPS: {}", url);
                self.download(url, None).await
            }
            VideoSource::CloudObject { bucket, key } => {
                println!("Downloading from GCS: {}", source);
                match self.object_url(bucket, key) {
                    Ok(url) => self.download(url.as_str(), self.storage_token.as_deref()).await,
                    Err(e) => Err(e),
                }
            }
        };

        result.map_err(|message| {
            log::error!("Failed to download video from '{}': {}", source, message);
            GenerationError::Download {
                uri: source.to_string(),
                message,
            }
        })
    }
}
