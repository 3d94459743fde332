//! Handler for the generate-and-upload command.

use super::args::Args;
use crate::cache::VideoCache;
use crate::config::{Config, API_KEY_ENV};
use crate::pipeline::{Pipeline, PipelineError, RunOutcome};
use crate::{CredentialStore, DriveUploader, VeoGenerator};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Run the whole command and return the process exit code.
pub fn run_generate(args: &Args, config: &Config) -> i32 {
    let api_key = std::env::var(API_KEY_ENV).ok();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create async runtime: {}", e);
            return EXIT_FAILURE;
        }
    };

    rt.block_on(async {
        let store = match CredentialStore::new(config) {
            Ok(store) => store,
            Err(e) => return report_setup_error("credential store", e),
        };
        let generator = match VeoGenerator::new(config) {
            Ok(generator) => generator,
            Err(e) => return report_setup_error("video generator", e),
        };
        let uploader = match DriveUploader::new(config) {
            Ok(uploader) => uploader,
            Err(e) => return report_setup_error("Drive uploader", e),
        };

        let pipeline = Pipeline::new(&store, &generator, &uploader)
            .with_cache(VideoCache::from_config(&config.cache));

        match pipeline.run(&args.run_request(), api_key.as_deref()).await {
            Ok(RunOutcome::Uploaded { file, .. }) => {
                println!("\nProcess complete! Video available at: {}", file.web_view_link);
                EXIT_SUCCESS
            }
            Ok(RunOutcome::UploadedWithoutLink { name, file_id }) => {
                println!("\nUpload of '{}' finished, but Drive did not return a view link.", name);
                if let Some(id) = file_id {
                    println!("File ID: {}", id);
                }
                EXIT_SUCCESS
            }
            Err(e) => {
                report_failure(&e);
                EXIT_FAILURE
            }
        }
    })
}

fn report_setup_error(what: &str, error: impl std::fmt::Display) -> i32 {
    eprintln!("Error: Failed to create {}: {}", what, error);
    EXIT_FAILURE
}

fn report_failure(error: &PipelineError) {
    eprintln!("ERROR ({}): {}", error.phase(), error);
    match error {
        PipelineError::MissingApiKey { var } => {
            eprintln!("Please set it: export {}=\"YOUR_API_KEY\"", var);
            eprintln!("Or add it to a .env file in the current directory.");
        }
        PipelineError::Auth(_) => {
            eprintln!("Failed to authenticate with Google Drive. Exiting.");
        }
        PipelineError::Generation(_) => {
            eprintln!("Video generation or download failed. Exiting.");
        }
        PipelineError::Upload(_) => {
            eprintln!("\nProcess completed, but upload to Drive failed.");
        }
    }
}
