//! CLI entry point for fetchkit.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fetchkit::{BatchItem, BatchOptions, Fetcher, TransferRequest};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn).
    // Default is warn, not info, so progress bars stay readable.
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let fetcher = Fetcher::new();
    let cancel = CancellationToken::new();

    // Ctrl-C cancels all in-flight and queued transfers.
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling transfers");
            cancel_on_signal.cancel();
        }
    });

    // One request per URL; duplicate filenames get a numeric prefix so no
    // two transfers target the same destination.
    let mut used_names = HashSet::new();
    let items: Vec<BatchItem> = args
        .urls
        .iter()
        .enumerate()
        .map(|(index, url)| {
            let destination = destination_for(url, &args.output, &mut used_names);
            let request = TransferRequest::new(url.clone(), destination)
                .with_max_retries(u32::from(args.max_retries))
                .with_timeout(Duration::from_secs(args.timeout));
            BatchItem::new(index, request)
        })
        .collect();

    let bars = make_progress_bars(&items, args.quiet);
    let progress_bars = Arc::clone(&bars);
    let complete_bars = Arc::clone(&bars);

    let options = BatchOptions {
        concurrency_limit: usize::from(args.concurrency),
        on_progress: Some(Arc::new(move |index, _filename, sample| {
            if let Some(bar) = progress_bars.get(index) {
                if sample.bytes_total > 0 {
                    bar.set_length(sample.bytes_total);
                }
                bar.set_position(sample.bytes_done);
            }
        })),
        on_complete: Some(Arc::new(move |index, filename, outcome| {
            if let Some(bar) = complete_bars.get(index) {
                if outcome.succeeded {
                    bar.finish_with_message(format!("{filename} done"));
                } else {
                    let reason = outcome.error_message.as_deref().unwrap_or("failed");
                    bar.abandon_with_message(format!("{filename}: {reason}"));
                }
            }
        })),
    };

    let result = fetcher.download_batch(items, &options, cancel).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !args.quiet {
        info!(
            completed = result.success_count,
            failed = result.failure_count,
            "download complete"
        );
        eprintln!(
            "{} completed, {} failed",
            result.success_count, result.failure_count
        );
    }

    if result.failure_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Builds one progress bar per item (hidden in quiet mode).
fn make_progress_bars(items: &[BatchItem], quiet: bool) -> Arc<Vec<ProgressBar>> {
    if quiet {
        return Arc::new(items.iter().map(|_| ProgressBar::hidden()).collect());
    }

    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template(
        "{msg:24!} {bar:30} {bytes}/{total_bytes} {bytes_per_sec}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    Arc::new(
        items
            .iter()
            .map(|item| {
                let bar = multi.add(ProgressBar::new(0));
                bar.set_style(style.clone());
                let name = item
                    .request
                    .destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                bar.set_message(name);
                bar
            })
            .collect(),
    )
}

/// Picks a destination path for a URL, avoiding duplicate filenames.
fn destination_for(url: &str, output: &Path, used: &mut HashSet<String>) -> PathBuf {
    let base = filename_from_url(url);
    let mut name = base.clone();
    let mut suffix = 2;
    while !used.insert(name.clone()) {
        name = format!("{suffix}_{base}");
        suffix += 1;
    }
    output.join(name)
}

/// Last non-empty URL path segment, or a generic fallback.
fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "download.bin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url_uses_last_segment() {
        assert_eq!(
            filename_from_url("https://example.com/files/report.pdf"),
            "report.pdf"
        );
    }

    #[test]
    fn test_filename_from_url_empty_path_falls_back() {
        assert_eq!(filename_from_url("https://example.com/"), "download.bin");
        assert_eq!(filename_from_url("not a url"), "download.bin");
    }

    #[test]
    fn test_destination_for_deduplicates() {
        let mut used = HashSet::new();
        let out = Path::new("/tmp/out");
        let first = destination_for("https://a.example/file.bin", out, &mut used);
        let second = destination_for("https://b.example/file.bin", out, &mut used);
        assert_eq!(first, PathBuf::from("/tmp/out/file.bin"));
        assert_eq!(second, PathBuf::from("/tmp/out/2_file.bin"));
    }
}
