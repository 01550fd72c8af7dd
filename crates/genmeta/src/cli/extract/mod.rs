//! The `genmeta extract` command.

mod batch;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use genmeta_core::pipeline::FileDiscovery;
use genmeta_core::{Config, MetadataProcessor, OutputFormat as CoreOutputFormat, OutputWriter};

use batch::process_batch;

/// Arguments for the `extract` command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// PNG file or directory to extract from
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format [default: from config]
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Number of files extracted concurrently [default: from config]
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object or array
    Json,
    /// One JSON object per line (newline-delimited)
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// CLI flags merged over the loaded config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Settings {
    pub format: CoreOutputFormat,
    pub pretty: bool,
    pub parallel: usize,
}

impl Settings {
    pub fn resolve(args: &ExtractArgs, config: &Config) -> Self {
        Self {
            format: args
                .format
                .map(Into::into)
                .unwrap_or_else(|| CoreOutputFormat::from_config(&config.output)),
            pretty: config.output.pretty && !args.compact,
            parallel: args
                .parallel
                .unwrap_or(config.processing.parallel_workers)
                .max(1),
        }
    }
}

/// Execute the extract command.
pub async fn execute(args: ExtractArgs, config: &Config) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.input
        );
    }

    let settings = Settings::resolve(&args, config);
    let processor = MetadataProcessor::new(config);

    if args.input.is_file() {
        return process_single(&processor, &args, settings);
    }

    let files = processor.discover(&args.input);
    if files.is_empty() {
        tracing::warn!("No PNG files found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!(
        "Found {} file(s) to extract ({:.1} MB)",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0
    );

    let writer = open_writer(args.output.as_deref(), settings)?;
    process_batch(processor, files, writer, settings.parallel).await?;
    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }
    Ok(())
}

/// Extract one file; any failure aborts with a descriptive error.
fn process_single(
    processor: &MetadataProcessor,
    args: &ExtractArgs,
    settings: Settings,
) -> anyhow::Result<()> {
    let result = processor
        .process(&args.input)
        .with_context(|| format!("Could not extract metadata from {}", args.input.display()))?;

    let mut writer = open_writer(args.output.as_deref(), settings)?;
    writer.write(&result)?;
    writer.flush()?;

    if let Some(path) = &args.output {
        tracing::info!("Output written to {:?}", path);
    }
    Ok(())
}

/// Writer for `path`, or stdout when none is given.
pub(crate) fn open_writer(
    path: Option<&Path>,
    settings: Settings,
) -> anyhow::Result<OutputWriter<Box<dyn Write + Send>>> {
    let sink: Box<dyn Write + Send> = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create output file {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    Ok(OutputWriter::new(sink, settings.format, settings.pretty))
}
