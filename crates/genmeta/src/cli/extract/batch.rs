//! Batch extraction: concurrent processing with progress and streaming output.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use genmeta_core::{DiscoveredFile, ExtractedImage, MetadataProcessor, OutputWriter};

/// Counters shown in the end-of-run summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchStats {
    pub succeeded: u64,
    pub failed: u64,
    pub with_prompt: u64,
    /// Files carrying a prompt, workflow or model name
    pub with_generation_data: u64,
}

impl BatchStats {
    fn record(&mut self, image: &ExtractedImage) {
        if image.is_ok() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if image.has_prompt() {
            self.with_prompt += 1;
        }
        if image
            .metadata
            .as_ref()
            .is_some_and(|m| m.has_generation_data())
        {
            self.with_generation_data += 1;
        }
    }

    fn total(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Extract every file, `parallel` at a time, writing records in discovery order.
///
/// Failures become records with `error` set instead of stopping the run.
/// JSONL output is written as results arrive; JSON is written as one array
/// at the end.
pub(crate) async fn process_batch<W: Write>(
    processor: MetadataProcessor,
    files: Vec<DiscoveredFile>,
    mut writer: OutputWriter<W>,
    parallel: usize,
) -> anyhow::Result<BatchStats> {
    let progress = create_progress_bar(files.len() as u64);
    let processor = Arc::new(processor);
    let streaming = writer.format().is_streaming();

    let mut stats = BatchStats::default();
    let mut collected = Vec::new();
    let start_time = Instant::now();

    let mut results = stream::iter(files)
        .map(|file| {
            let processor = Arc::clone(&processor);
            async move {
                let (path, size) = (file.path.clone(), file.size);
                match tokio::task::spawn_blocking(move || processor.process_lenient(&file.path))
                    .await
                {
                    Ok(image) => image,
                    Err(e) => {
                        tracing::error!("Worker failed on {:?}: {}", path, e);
                        ExtractedImage::failure(&path, size, e.to_string())
                    }
                }
            }
        })
        .buffered(parallel);

    while let Some(image) = results.next().await {
        stats.record(&image);

        if streaming {
            writer.write(&image)?;
        } else {
            collected.push(image);
        }

        progress.inc(1);
        let elapsed = start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            progress.set_message(format!("{:.1} files/sec", stats.total() as f64 / elapsed));
        }
    }

    if !streaming {
        writer.write_all(&collected)?;
    }
    writer.flush()?;

    progress.finish_and_clear();
    print_summary(&stats, start_time.elapsed());

    Ok(stats)
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    let pb = ProgressBar::new(total);
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after batch processing.
fn print_summary(stats: &BatchStats, elapsed: Duration) {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        stats.total() as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", stats.succeeded);
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    eprintln!("    With prompt:  {:>8}", stats.with_prompt);
    eprintln!("    With metadata:{:>8}", stats.with_generation_data);
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", stats.total());
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} files/sec", rate);
    eprintln!("  ====================================");
}
