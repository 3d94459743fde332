//! Decoding of `generateContent` replies into a video reference.
//!
//! The reply shape for video output is provisional; only the fields below are
//! relied upon, everything else is ignored.

use serde::Deserialize;

use super::client::GenerationError;

/// Pointer to a finished video, before it is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference {
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub file_data: Option<FileData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    #[serde(default)]
    pub mime_type: Option<String>,
    pub file_uri: String,
}

impl FileData {
    fn declared_type(&self) -> Option<&str> {
        self.mime_type.as_deref().filter(|t| !t.trim().is_empty())
    }

    fn is_video(&self) -> bool {
        self.declared_type()
            .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("video/"))
    }
}

impl GenerateContentResponse {
    /// Parts of the first candidate, if it has any.
    pub fn parts(&self) -> Option<&[Part]> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .filter(|parts| !parts.is_empty())
    }

    /// Locate the generated video.
    ///
    /// The first file part declaring a `video/*` type wins. Untyped file parts
    /// and parts of other types (images, audio, transcripts) are skipped.
    ///
    /// # Errors
    ///
    /// `GenerationError::EmptyResponse` if the first candidate has no parts,
    /// `GenerationError::NoVideoPart` if no part qualifies.
    pub fn video_reference(&self, default_mime_type: &str) -> Result<VideoReference, GenerationError> {
        let parts = self.parts().ok_or(GenerationError::EmptyResponse)?;

        parts
            .iter()
            .filter_map(|p| p.file_data.as_ref())
            .find(|f| f.is_video())
            .map(|file| VideoReference {
                uri: file.file_uri.clone(),
                mime_type: file
                    .declared_type()
                    .map(str::trim)
                    .unwrap_or(default_mime_type)
                    .to_string(),
            })
            .ok_or_else(|| {
                self.log_missing_video(parts);
                GenerationError::NoVideoPart
            })
    }

    fn log_missing_video(&self, parts: &[Part]) {
        let finish_reason = self
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("unknown");
        let text: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        log::warn!(
            "No video part in response (finish reason: {}); model text: {:?}",
            finish_reason,
            text.join(" ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_video_part_is_found_after_text_part() {
        let response = decode(serde_json::json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is your video"},
                    {"fileData": {"mimeType": "video/webm", "fileUri": "https://cdn.example.com/v.webm"}}
                ]},
                "finishReason": "STOP"
            }]
        }));

        let reference = response.video_reference("video/mp4").unwrap();
        assert_eq!(reference.uri, "https://cdn.example.com/v.webm");
        assert_eq!(reference.mime_type, "video/webm");
    }

    #[test]
    fn test_no_candidates_is_empty_response() {
        let response = decode(serde_json::json!({}));
        assert!(matches!(
            response.video_reference("video/mp4"),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_candidate_without_parts_is_empty_response() {
        let response = decode(serde_json::json!({"candidates": [{"content": {"parts": []}}]}));
        assert!(matches!(
            response.video_reference("video/mp4"),
            Err(GenerationError::EmptyResponse)
        ));

        let response = decode(serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]}));
        assert!(matches!(
            response.video_reference("video/mp4"),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_only_non_video_parts_is_no_video_part() {
        let response = decode(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"text": "sorry"},
                {"fileData": {"mimeType": "image/png", "fileUri": "gs://b/frame.png"}}
            ]}}]
        }));
        assert!(matches!(
            response.video_reference("video/mp4"),
            Err(GenerationError::NoVideoPart)
        ));
    }

    #[test]
    fn test_untyped_file_part_is_not_a_video() {
        let response = decode(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"fileData": {"fileUri": "gs://b/transcript.txt"}},
                {"fileData": {"mimeType": "", "fileUri": "gs://b/thumbnail"}}
            ]}}]
        }));
        assert!(matches!(
            response.video_reference("video/mp4"),
            Err(GenerationError::NoVideoPart)
        ));
    }

    #[test]
    fn test_typed_video_part_preferred_over_untyped() {
        let response = decode(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"fileData": {"fileUri": "gs://bucket/untyped"}},
                {"fileData": {"mimeType": "video/quicktime", "fileUri": "gs://bucket/typed.mov"}}
            ]}}]
        }));
        let reference = response.video_reference("video/mp4").unwrap();
        assert_eq!(reference.uri, "gs://bucket/typed.mov");
        assert_eq!(reference.mime_type, "video/quicktime");
    }

    #[test]
    fn test_only_first_candidate_is_inspected() {
        let response = decode(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "no video"}]}},
                {"content": {"parts": [{"fileData": {"mimeType": "video/mp4", "fileUri": "https://x/v.mp4"}}]}}
            ]
        }));
        assert!(matches!(
            response.video_reference("video/mp4"),
            Err(GenerationError::NoVideoPart)
        ));
    }
}
