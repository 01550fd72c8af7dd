//! genmeta CLI - read the generation metadata AI image tools embed in PNGs.
//!
//! genmeta recovers the prompt, negative prompt, model names and raw text
//! chunks from images written by node-graph and parameter-string generators,
//! and prints them as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Extract from a single image
//! genmeta extract image.png
//!
//! # Extract from a directory
//! genmeta extract ./renders/ --format jsonl --output metadata.jsonl
//!
//! # View configuration
//! genmeta config show
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use genmeta_core::Config;

mod cli;
mod logging;

/// genmeta - extract prompts, workflows and model names from generated PNGs.
#[derive(Parser, Debug)]
#[command(name = "genmeta")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "GENMETA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract generation metadata from PNG files
    Extract(cli::extract::ExtractArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

/// Load the config named by `--config`, or the default one.
///
/// An explicit path that does not exist, or any file that fails to load,
/// yields the defaults plus a warning. The path is still returned so
/// `config init` can create it.
fn load_config(explicit: Option<&Path>) -> (Config, PathBuf, Option<String>) {
    let Some(path) = explicit else {
        let path = Config::default_path();
        return match Config::load() {
            Ok(config) => (config, path, None),
            Err(e) => (Config::default(), path, Some(load_failed(&e))),
        };
    };

    let path = genmeta_core::config::expand_path(&path.to_string_lossy());
    if !path.exists() {
        let warning = format!(
            "Config file {} does not exist; using default configuration.",
            path.display()
        );
        return (Config::default(), path, Some(warning));
    }
    match Config::load_from(&path) {
        Ok(config) => (config, path, None),
        Err(e) => (Config::default(), path, Some(load_failed(&e))),
    }
}

fn load_failed(e: &genmeta_core::ConfigError) -> String {
    format!(
        "Failed to load config: {e}\n  \
         Using default configuration. Check your config file with `genmeta config path`."
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let (config, config_path, warning) = load_config(cli.config.as_deref());
    if let Some(warning) = warning {
        eprintln!("Warning: {warning}");
    }
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("genmeta v{}", genmeta_core::VERSION);

    match cli.command {
        Commands::Extract(args) => cli::extract::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args, &config, &config_path).await,
    }
}
