//! VideoCache - keeps generated videos on disk until they are uploaded.
//!
//! A video is stored right after generation and removed once Drive has it,
//! so a failed upload can be retried without paying for a new generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::config::CacheConfig;
use crate::veo::GeneratedVideo;

/// Sidecar metadata for a cached video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Original prompt text
    pub prompt: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Persistent disk cache for generated videos, keyed by prompt.
pub struct VideoCache {
    cache_dir: PathBuf,
}

impl VideoCache {
    /// Create a VideoCache with the given cache directory.
    /// Does not create the directory - call `ensure_dir_exists()` to create it.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Cache described by config, or `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(config.dir()))
    }

    /// Ensure the cache directory exists, creating it if necessary.
    pub fn ensure_dir_exists(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.cache_dir)
    }

    /// Get the cache directory path.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Generate deterministic SHA256 hash for prompt.
    /// Returns a 32-character hex string (first 16 bytes of SHA256).
    pub fn hash_prompt(prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    fn video_path(&self, hash: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.video", hash))
    }

    fn meta_path(&self, hash: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", hash))
    }

    /// Metadata of the cached video for `prompt`, if any.
    pub fn entry(&self, prompt: &str) -> Option<CacheEntry> {
        let content = std::fs::read_to_string(self.meta_path(&Self::hash_prompt(prompt))).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Get the cached video for `prompt`.
    ///
    /// Entries whose metadata is missing, unreadable, belongs to a different
    /// prompt, or disagrees with the stored size are ignored.
    pub fn get(&self, prompt: &str) -> Option<GeneratedVideo> {
        let entry = self.entry(prompt)?;
        if entry.prompt != prompt {
            return None;
        }

        let bytes = std::fs::read(self.video_path(&Self::hash_prompt(prompt))).ok()?;
        if bytes.is_empty() || bytes.len() as u64 != entry.size_bytes {
            log::warn!("Ignoring incomplete cached video for prompt hash {}", Self::hash_prompt(prompt));
            return None;
        }

        Some(GeneratedVideo::new(bytes, entry.content_type))
    }

    /// Store a generated video for `prompt`, replacing any previous entry.
    pub fn store(&self, prompt: &str, video: &GeneratedVideo) -> Result<PathBuf, std::io::Error> {
        self.ensure_dir_exists()?;
        let hash = Self::hash_prompt(prompt);
        let video_path = self.video_path(&hash);

        // Write under a temporary name so a crash never leaves a truncated entry.
        let tmp_path = self.cache_dir.join(format!("{}.video.tmp", hash));
        std::fs::write(&tmp_path, video.bytes())?;
        std::fs::rename(&tmp_path, &video_path)?;

        let entry = CacheEntry {
            prompt: prompt.to_string(),
            content_type: video.content_type().to_string(),
            size_bytes: video.len() as u64,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&entry).map_err(std::io::Error::other)?;
        std::fs::write(self.meta_path(&hash), json)?;

        Ok(video_path)
    }

    /// Remove the cached video for `prompt`.
    /// Returns true if a video was removed, false if none was cached.
    pub fn remove(&self, prompt: &str) -> Result<bool, std::io::Error> {
        let hash = Self::hash_prompt(prompt);
        let video_path = self.video_path(&hash);

        let mut removed = false;
        if video_path.exists() {
            std::fs::remove_file(&video_path)?;
            removed = true;
        }

        // Also remove metadata file if it exists (don't fail if it doesn't)
        let _ = std::fs::remove_file(self.meta_path(&hash));

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn video() -> GeneratedVideo {
        GeneratedVideo::new(b"not really a video".to_vec(), "video/webm")
    }

    #[test]
    fn test_hash_prompt_deterministic() {
        let a = VideoCache::hash_prompt("a cat on a skateboard");
        let b = VideoCache::hash_prompt("a cat on a skateboard");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, VideoCache::hash_prompt("a dog on a skateboard"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let cache = VideoCache::new(dir.path().to_path_buf());
        assert!(cache.get("nothing here").is_none());
    }

    #[test]
    fn test_store_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = VideoCache::new(dir.path().join("videos"));

        cache.store("prompt", &video()).unwrap();

        assert_eq!(cache.get("prompt"), Some(video()));
        let entry = cache.entry("prompt").unwrap();
        assert_eq!(entry.content_type, "video/webm");
        assert_eq!(entry.size_bytes, 18);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let cache = VideoCache::new(dir.path().to_path_buf());
        cache.ensure_dir_exists().unwrap();

        cache.store("prompt", &video()).unwrap();
        assert!(cache.remove("prompt").unwrap());
        assert!(cache.get("prompt").is_none());
        assert!(cache.entry("prompt").is_none());
        assert!(!cache.remove("prompt").unwrap());
    }

    #[test]
    fn test_truncated_video_is_ignored() {
        let dir = TempDir::new().unwrap();
        let cache = VideoCache::new(dir.path().to_path_buf());

        let path = cache.store("prompt", &video()).unwrap();
        std::fs::write(&path, b"short").unwrap();

        assert!(cache.get("prompt").is_none());
    }

    #[test]
    fn test_from_config_respects_enabled() {
        let disabled = CacheConfig {
            enabled: false,
            dir: None,
        };
        assert!(VideoCache::from_config(&disabled).is_none());

        let enabled = CacheConfig {
            enabled: true,
            dir: Some(PathBuf::from("/tmp/veo-drive-cache")),
        };
        let cache = VideoCache::from_config(&enabled).unwrap();
        assert_eq!(cache.cache_dir(), Path::new("/tmp/veo-drive-cache"));
    }
}
