use clap::Parser;
use veo_drive::cli::{run_generate, Args, EXIT_CONFIG_ERROR};
use veo_drive::config::{self, Config, API_KEY_ENV};

fn load_env() {
    // Load .env file, don't override existing env vars
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();

    if std::env::var(API_KEY_ENV).is_err() {
        log::debug!("{} not set after loading .env", API_KEY_ENV);
    }
}

fn main() {
    // Load .env file before anything else
    load_env();

    let args = Args::parse();

    // If --config is specified, require the file to exist
    // Otherwise, fall back to defaults if default config not found
    let cfg = if let Some(ref path) = args.config {
        if !path.exists() {
            eprintln!("Error: Config file not found: {}", path.display());
            std::process::exit(EXIT_CONFIG_ERROR);
        }
        Config::load(Some(path.as_path()))
    } else {
        Config::load(None)
    };

    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Default config location: {}", config::default_path().display());
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    println!("Veo video generation and Google Drive upload");
    println!("Model: {}", cfg.model_id);

    let code = run_generate(&args, &cfg);
    std::process::exit(code);
}
