//! Command-line interface definitions and the command handler.

mod args;
mod commands;

pub use args::Args;
pub use commands::{run_generate, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_SUCCESS};
