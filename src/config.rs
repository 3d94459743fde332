//! Configuration file handling for veo-drive.
//!
//! Loads configuration from `~/.config/veo-drive/config.toml` or a custom path.
//! Every field is optional; a missing file yields the built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Gemini API key.
pub const API_KEY_ENV: &str = "GOOGLE_GEMINI_API_KEY";

/// Environment variable holding an optional bearer token for `gs://` reads.
pub const STORAGE_TOKEN_ENV: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

/// Default Veo model identifier.
pub const DEFAULT_MODEL_ID: &str = "models/veo-1.0";

/// Content type assumed when the service does not declare one.
pub const DEFAULT_VIDEO_MIME_TYPE: &str = "video/mp4";

/// Drive scope requested by the consent flow.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Upload chunk size (5 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Configuration file structure for veo-drive.
/// Loaded from ~/.config/veo-drive/config.toml (or custom path via --config).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_drive_scopes")]
    pub drive_scopes: Vec<String>,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_mime_type")]
    pub default_mime_type: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_generation_endpoint")]
    pub generation: String,
    #[serde(default = "default_storage_endpoint")]
    pub storage: String,
    #[serde(default = "default_drive_upload_endpoint")]
    pub drive_upload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_generation_secs")]
    pub generation_secs: u64,
    #[serde(default = "default_download_secs")]
    pub download_secs: u64,
    #[serde(default = "default_consent_secs")]
    pub consent_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_drive_scopes() -> Vec<String> {
    vec![DRIVE_SCOPE.to_string()]
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_mime_type() -> String {
    DEFAULT_VIDEO_MIME_TYPE.to_string()
}

fn default_generation_endpoint() -> String {
    crate::veo::GEMINI_API_BASE_URL.to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_drive_upload_endpoint() -> String {
    crate::drive::DRIVE_UPLOAD_BASE_URL.to_string()
}

fn default_generation_secs() -> u64 {
    600
}

fn default_download_secs() -> u64 {
    300
}

fn default_consent_secs() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            drive_scopes: default_drive_scopes(),
            token_path: default_token_path(),
            credentials_path: default_credentials_path(),
            default_mime_type: default_mime_type(),
            endpoints: EndpointsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            upload: UploadConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            generation: default_generation_endpoint(),
            storage: default_storage_endpoint(),
            drive_upload: default_drive_upload_endpoint(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            generation_secs: default_generation_secs(),
            download_secs: default_download_secs(),
            consent_secs: default_consent_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl TimeoutsConfig {
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    pub fn consent(&self) -> Duration {
        Duration::from_secs(self.consent_secs)
    }
}

impl CacheConfig {
    /// Cache directory, falling back to `~/.cache/veo-drive/videos`.
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("veo-drive")
                .join("videos")
        })
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            config.validate().map_err(|message| ConfigError::InvalidValue {
                path: path.clone(),
                message,
            })?;
            Ok(config)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Check values that parse but cannot work.
    fn validate(&self) -> Result<(), String> {
        let mime = self.default_mime_type.trim().to_ascii_lowercase();
        match mime.strip_prefix("video/") {
            Some(subtype) if !subtype.is_empty() => Ok(()),
            _ => Err(format!(
                "default_mime_type must be a video/* type, got '{}'",
                self.default_mime_type
            )),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: PathBuf,
        message: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, message } => {
                write!(f, "Invalid config file '{}': {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("veo-drive").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/veo-drive/config.toml")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.model_id, "models/veo-1.0");
        assert_eq!(config.drive_scopes, vec![DRIVE_SCOPE.to_string()]);
        assert_eq!(config.token_path, PathBuf::from("token.json"));
        assert_eq!(config.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.default_mime_type, "video/mp4");
        assert_eq!(config.timeouts.download(), Duration::from_secs(300));
        assert_eq!(config.upload.chunk_size, 5 * 1024 * 1024);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
model_id = "models/veo-2.0"

[timeouts]
download_secs = 60

[upload]
chunk_size = 262144
"#
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.model_id, "models/veo-2.0");
        assert_eq!(config.timeouts.download_secs, 60);
        assert_eq!(config.timeouts.consent_secs, 300);
        assert_eq!(config.upload.chunk_size, 262144);
        assert_eq!(config.default_mime_type, DEFAULT_VIDEO_MIME_TYPE);
    }

    #[test]
    fn test_load_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model_id = [not toml").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_rejects_non_video_default_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, r#"default_mime_type = "application/octet-stream""#).unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("default_mime_type"));

        std::fs::write(&path, r#"default_mime_type = "video/webm""#).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().default_mime_type, "video/webm");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_cache_dir_override() {
        let cache = CacheConfig {
            enabled: true,
            dir: Some(PathBuf::from("/tmp/veo-cache")),
        };
        assert_eq!(cache.dir(), PathBuf::from("/tmp/veo-cache"));
    }
}
