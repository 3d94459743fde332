//! Output filename derivation for uploaded videos.

use chrono::Local;

/// Extensions accepted as-is on an explicit output name.
pub const KNOWN_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv"];

/// Prefix of synthesized filenames.
pub const GENERATED_NAME_PREFIX: &str = "veo_video";

/// Number of prompt characters carried into a synthesized filename.
const PROMPT_PREFIX_CHARS: usize = 20;

/// Format of the timestamp embedded in synthesized filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Current local time formatted as `YYYYMMDD-HHMMSS`.
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Infer a file extension from a content type such as `video/webm`.
///
/// Parameters after `;` are ignored. Subtypes with a well-known container
/// extension are mapped onto it; anything else (including an empty or `*`
/// subtype) falls back to `mp4`, so the result is always a known extension.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let subtype = essence
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    match subtype.as_str() {
        "mp4" => "mp4",
        "webm" => "webm",
        "quicktime" | "mov" => "mov",
        "x-msvideo" | "avi" => "avi",
        "x-matroska" | "matroska" | "mkv" => "mkv",
        _ => "mp4",
    }
}

/// Whether `name` already ends in one of [`KNOWN_VIDEO_EXTENSIONS`].
pub fn has_known_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KNOWN_VIDEO_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

fn sanitize_prompt_prefix(prompt: &str) -> String {
    prompt
        .chars()
        .take(PROMPT_PREFIX_CHARS)
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Derive the name the video is stored under.
///
/// An explicit name keeps its extension when it is a known video extension
/// and otherwise gets one inferred from `content_type`. Without an explicit
/// name, one is synthesized from the prompt and `timestamp`.
pub fn derive_filename(
    explicit: Option<&str>,
    prompt: &str,
    content_type: &str,
    timestamp: &str,
) -> String {
    let ext = extension_for(content_type);

    match explicit {
        Some(name) if has_known_extension(name) => name.to_string(),
        Some(name) => format!("{}.{}", name, ext),
        None => format!(
            "{}_{}_{}.{}",
            GENERATED_NAME_PREFIX,
            sanitize_prompt_prefix(prompt),
            timestamp,
            ext
        ),
    }
}
