use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Import from our modularized library
use bates_stamper_rs::prelude::*;

#[derive(Parser)]
#[command(name = "bates_stamper_rs")]
#[command(about = "Batch Bates stamping for PDF document trees", long_about = None)]
struct Cli {
    /// Root directory to scan for PDF files
    input_directory: PathBuf,

    /// Root directory the input layout is mirrored into
    output_directory: PathBuf,

    /// Label prefix
    #[arg(long, default_value = "BATES-")]
    prefix: String,

    /// First counter value
    #[arg(long, default_value_t = 1)]
    start: u64,

    /// Stamp anchor position
    #[arg(long, value_enum, default_value_t = StampPosition::BottomRight)]
    position: StampPosition,

    /// Stamp color as #RRGGBB
    #[arg(long, default_value = "#000000")]
    color: String,

    /// Distance from the page edges, in points
    #[arg(long, default_value_t = 10.0)]
    margin: f32,

    /// Stamp font size, in points
    #[arg(long, default_value_t = 12.0)]
    size: f32,

    /// Flatten each input before stamping
    #[arg(long)]
    flatten_input: bool,

    /// Flatten each stamped output
    #[arg(long)]
    flatten_output: bool,

    /// Seconds before an external flatten call is killed
    #[arg(long, default_value_t = 120)]
    flatten_timeout: u64,

    /// Output report filename
    #[arg(short, long, default_value = "stamping_report.txt")]
    report: PathBuf,

    /// Write a JSON manifest (Bates log) to this path
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Number of parallel worker threads (default: number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run in batch mode (no progress bar)
    #[arg(long)]
    batch: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up graceful shutdown handler
    let shutdown_requested = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown_requested.clone();

    ctrlc::set_handler(move || {
        eprintln!("\n⚠️  Shutdown requested. Finishing current documents...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    // Set up rayon thread pool
    if let Some(workers) = cli.workers {
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    // Validate configuration before touching any document
    let color = RgbColor::parse(&cli.color)?;
    let config = StampConfig {
        prefix: cli.prefix.clone(),
        start: cli.start,
        position: cli.position,
        color,
        margin: cli.margin,
        font_size: cli.size,
        flatten_input: cli.flatten_input,
        flatten_output: cli.flatten_output,
    };
    config.validate()?;

    let num_threads = rayon::current_num_threads();
    println!("Bates Stamper (Rust Edition)");
    println!("Using {} worker thread(s)", num_threads);
    println!(
        "Stamp: {}{:0width$} onward, {} at {}, {}pt, margin {}pt",
        config.prefix,
        config.start,
        config.position,
        color.to_hex(),
        config.font_size,
        config.margin,
        width = LABEL_PAD_WIDTH
    );

    let pipeline = StampPipeline::new(config, Duration::from_secs(cli.flatten_timeout))
        .verbose(cli.verbose)
        .shutdown_on(shutdown_requested.clone());
    if let Some(engine) = pipeline.flattener_name() {
        let stages = match (cli.flatten_input, cli.flatten_output) {
            (true, true) => "input and output",
            (true, false) => "input",
            _ => "output",
        };
        println!("Flatten: {} (engine: {})", stages, engine);
    }
    println!();

    // Mirror root must exist before any worker writes into it
    fs::create_dir_all(&cli.output_directory).with_context(|| {
        format!(
            "Failed to create output directory {}",
            cli.output_directory.display()
        )
    })?;

    // Discover documents
    let documents = locate_documents(&cli.input_directory, &cli.output_directory)?;
    if documents.is_empty() {
        println!("No PDF files found in the input directory.");
        return Ok(());
    }
    println!("Found {} PDF document(s) to stamp\n", documents.len());

    // Set up progress bar (skip in batch mode)
    let progress = if cli.batch {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(documents.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    };

    let report = pipeline.run(&documents, &progress);

    if !cli.batch {
        if report.interrupted {
            progress.finish_and_clear();
            eprintln!("\n⏹️  Graceful shutdown complete");
            eprintln!(
                "📊 Processed {}/{} documents",
                report.total_documents,
                documents.len()
            );
        } else {
            progress.finish_with_message("Stamping complete!");
        }
        println!();
    }

    print_summary(&report);

    // Write report; partial results get their own file when interrupted
    let report_path = if report.interrupted {
        PathBuf::from(format!("{}.partial", cli.report.display()))
    } else {
        cli.report.clone()
    };
    write_report(&report_path, &report)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    println!("Detailed report saved to: {:?}", report_path);

    if let Some(manifest_path) = &cli.manifest {
        write_manifest(manifest_path, &report)
            .with_context(|| format!("Failed to write manifest to {}", manifest_path.display()))?;
        println!("Bates manifest saved to: {:?}", manifest_path);
    }

    // Per-document failures are already in the report; only
    // configuration and discovery problems change the exit code
    Ok(())
}
