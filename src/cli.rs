//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use fetchkit::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};

/// Download files over HTTP(S) with retry, progress, and bounded concurrency.
#[derive(Parser, Debug)]
#[command(name = "fetchkit")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Output directory for downloaded files
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Maximum retry attempts per file (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Per-attempt timeout in seconds
    #[arg(short = 't', long, default_value_t = 30)]
    pub timeout: u64,

    /// Print the batch result as JSON when done
    #[arg(long)]
    pub json: bool,

    /// Suppress progress bars and non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parse_successfully() {
        let args = Args::try_parse_from(["fetchkit", "https://example.com/a.bin"]).unwrap();
        assert_eq!(args.urls.len(), 1);
        assert_eq!(args.concurrency, 5); // DEFAULT_CONCURRENCY
        assert_eq!(args.max_retries, 3); // DEFAULT_MAX_RETRIES
        assert_eq!(args.timeout, 30);
        assert!(!args.quiet);
        assert!(!args.json);
    }

    #[test]
    fn test_cli_requires_at_least_one_url() {
        assert!(Args::try_parse_from(["fetchkit"]).is_err());
    }

    #[test]
    fn test_cli_rejects_zero_concurrency() {
        assert!(
            Args::try_parse_from(["fetchkit", "-c", "0", "https://example.com/a.bin"]).is_err()
        );
    }

    #[test]
    fn test_cli_custom_values() {
        let args = Args::try_parse_from([
            "fetchkit",
            "-c",
            "3",
            "-r",
            "1",
            "-t",
            "10",
            "-o",
            "/tmp/out",
            "https://example.com/a.bin",
            "https://example.com/b.bin",
        ])
        .unwrap();
        assert_eq!(args.concurrency, 3);
        assert_eq!(args.max_retries, 1);
        assert_eq!(args.timeout, 10);
        assert_eq!(args.output, PathBuf::from("/tmp/out"));
        assert_eq!(args.urls.len(), 2);
    }
}
