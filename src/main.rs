use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use wipetrace::orchestrator::{build_result_document, run_scan, writer, CancellationToken};
use wipetrace::scorer::Verdict;
use wipetrace::ScannerConfig;

/// Runs the forensic wipe-detection pipeline standalone over a single image
/// and writes the result document next to the uploads directory (spec.md
/// §6): `wipetrace <image_path> <session_id> [sha256]`.
#[derive(Parser)]
#[command(name = "wipetrace")]
#[command(about = "Detects deliberate data-wiping patterns in raw disk images")]
#[command(version)]
struct Cli {
    /// Path to the raw disk image to scan.
    image_path: PathBuf,

    /// Session identifier to stamp into the result document.
    session_id: String,

    /// Pre-computed SHA-256 of the image; re-hashed if omitted.
    sha256: Option<String>,

    /// Directory the result document is written into.
    #[arg(long, default_value = "uploads")]
    uploads_dir: PathBuf,

    /// Optional TOML config file layered under defaults and env overrides.
    #[arg(long)]
    config: Option<String>,

    /// Enable verbose debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("wipetrace=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wipetrace=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cancel = CancellationToken::new();
    setup_signal_handler(cancel.clone())?;

    let config = ScannerConfig::load(cli.config.as_deref())
        .context("failed to load scanner configuration")?;

    let filename = cli
        .image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.image_path.to_string_lossy().into_owned());

    let size_bytes = std::fs::metadata(&cli.image_path)
        .with_context(|| format!("cannot stat image {}", cli.image_path.display()))?
        .len();

    let sha256 = match cli.sha256 {
        Some(hash) => Some(hash),
        None => Some(
            wipetrace::orchestrator::hashing::hash_file(&cli.image_path)
                .context("failed to hash image")?,
        ),
    };

    let progress = wipetrace::ui::ScanProgress::new(0);
    let started_at = std::time::Instant::now();
    let outcome = run_scan(&cli.image_path, &config, progress.callback(), &cancel);

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(wipetrace::ScanError::Cancelled) => {
            progress.finish("scan cancelled");
            eprintln!("{}", "scan cancelled".yellow());
            std::process::exit(130);
        }
        Err(e) => {
            progress.finish("scan failed");
            return Err(e).context("scan failed");
        }
    };
    progress.finish("scan complete");
    println!("elapsed: {}", humantime::format_duration(started_at.elapsed()));

    let verdict_line = match outcome.stats.verdict {
        Verdict::High => format!("verdict: {}", outcome.stats.verdict).red().bold(),
        Verdict::Medium => format!("verdict: {}", outcome.stats.verdict).yellow().bold(),
        Verdict::Low => format!("verdict: {}", outcome.stats.verdict).blue(),
        Verdict::Negligible => format!("verdict: {}", outcome.stats.verdict).green(),
    };
    println!("{verdict_line}  (intent score {}/100)", outcome.stats.intent_score);
    println!(
        "{} blocks scanned, {} suspicious, {} region(s)",
        outcome.stats.total_blocks, outcome.stats.suspicious_blocks, outcome.stats.regions_count
    );

    let doc = build_result_document(cli.session_id, filename, sha256, size_bytes, outcome);
    let path = writer::write_results(&cli.uploads_dir, &doc)
        .context("failed to write result document")?;
    println!("results written to {}", path.display());

    Ok(())
}

fn setup_signal_handler(cancel: CancellationToken) -> Result<()> {
    use signal_hook::consts::SIGINT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT])?;
    std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig == SIGINT {
                eprintln!("\ninterrupt received, finishing current block and stopping...");
                cancel.cancel();
            }
        }
    });

    Ok(())
}
