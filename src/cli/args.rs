//! CLI argument parsing with clap.

use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::RunRequest;

/// Generate a Veo video from a prompt using the Gemini API and upload it to Google Drive
#[derive(Parser, Debug)]
#[command(name = "veo-drive")]
#[command(version, about = "Generate a Veo video from a prompt and upload it to Google Drive", long_about = None)]
pub struct Args {
    /// The text prompt for video generation
    pub prompt: String,

    /// Desired filename on Google Drive (e.g. my_veo_video.mp4). Default uses the prompt and a timestamp
    #[arg(short = 'o', long = "output_filename", alias = "output-filename")]
    pub output_filename: Option<String>,

    /// Google Drive folder ID to upload the video into
    #[arg(short = 'f', long = "folder_id", alias = "folder-id")]
    pub folder_id: Option<String>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Generate a new video even if one for this prompt is waiting to be uploaded
    #[arg(long)]
    pub fresh: bool,
}

impl Args {
    pub fn run_request(&self) -> RunRequest {
        RunRequest {
            prompt: self.prompt.clone(),
            output_filename: self.output_filename.clone(),
            folder_id: self.folder_id.clone(),
            fresh: self.fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["veo-drive", "a cat on a skateboard"]);
        assert_eq!(args.prompt, "a cat on a skateboard");
        assert!(args.output_filename.is_none());
        assert!(args.folder_id.is_none());
        assert!(args.config.is_none());
        assert!(!args.fresh);
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::parse_from(["veo-drive", "prompt", "-o", "clip.mp4", "-f", "folder123"]);
        assert_eq!(args.output_filename.as_deref(), Some("clip.mp4"));
        assert_eq!(args.folder_id.as_deref(), Some("folder123"));
    }

    #[test]
    fn test_args_long_flags_keep_underscores() {
        let args = Args::parse_from([
            "veo-drive",
            "prompt",
            "--output_filename",
            "clip",
            "--folder_id",
            "abc",
            "--fresh",
        ]);
        assert_eq!(args.output_filename.as_deref(), Some("clip"));
        assert_eq!(args.folder_id.as_deref(), Some("abc"));
        assert!(args.fresh);
    }

    #[test]
    fn test_args_require_prompt() {
        assert!(Args::try_parse_from(["veo-drive"]).is_err());
    }

    #[test]
    fn test_run_request_carries_args() {
        let args = Args::parse_from(["veo-drive", "prompt", "-o", "clip", "--fresh"]);
        let request = args.run_request();
        assert_eq!(request.prompt, "prompt");
        assert_eq!(request.output_filename.as_deref(), Some("clip"));
        assert!(request.folder_id.is_none());
        assert!(request.fresh);
    }
}
