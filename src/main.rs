//! BatchPress CLI - Load-Aware Batch Image Compressor
//!
//! Compresses every image in a folder to JPEG, PNG or WebP, optionally
//! resizing, walking subfolders and spreading the work over a worker pool.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use console::style;
use tracing::{debug, info, warn};

use batchpress::{
    init_with_config, BatchCompressor, BatchError, CompressionOptions, Config, LoggingConfig, OutputFormat,
    RunConfig,
};

/// Exit status after Ctrl-C, as shells report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

/// BatchPress - Load-Aware Batch Image Compressor
#[derive(Parser, Debug)]
#[command(
    name = "batchpress",
    version,
    about = "Bulk image compressor with load-aware parallelism",
    long_about = "BatchPress re-encodes every image in a folder to JPEG, PNG or WebP, optionally \
                  downscaling wide images. With --parallel the work is spread over a worker pool \
                  sized from the current CPU load. Failed images are appended to an error log and \
                  never stop the run."
)]
struct Cli {
    /// Path to the folder containing images to compress
    input_folder: PathBuf,

    /// Path where compressed images will be saved
    output_folder: PathBuf,

    /// Quality setting for image compression (default: 80)
    #[arg(long, value_name = "1-100", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Enable resizing of images wider than --max_width
    #[arg(long)]
    resize: bool,

    /// Maximum width for resized images (default: 1024)
    #[arg(long = "max_width", value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    max_width: Option<u32>,

    /// Desired output format: jpeg, png or webp (default: jpeg)
    #[arg(long = "output_format", value_name = "FORMAT")]
    output_format: Option<String>,

    /// Process subfolders recursively
    #[arg(long)]
    recursive: bool,

    /// Put every output directly in the output folder (same-named files overwrite each other)
    #[arg(long = "break_structure")]
    break_structure: bool,

    /// Compress on a worker pool sized from the current CPU load
    #[arg(long)]
    parallel: bool,

    /// Configuration file path (.toml or .yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Append failures to this file (default: error_log.txt)
    #[arg(long = "error_log", value_name = "FILE")]
    error_log: Option<PathBuf>,

    /// Show what would be processed without writing anything
    #[arg(long = "dry_run")]
    dry_run: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only, no progress bar)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<BatchError>() {
                Some(batch_error) => eprintln!("{}", style(batch_error.user_message()).red()),
                None => eprintln!("{}: {:#}", style("Error").red().bold(), e),
            }
            1
        }
    };

    process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let file_config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    init_with_config(&logging_config(&cli, &file_config)).context("Failed to initialize logging")?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from: {:?}", path);
    }

    let run_config = build_run_config(&cli, &file_config)?;
    let compressor = BatchCompressor::new(run_config).show_progress(!cli.json && !cli.quiet);
    if !cli.json && !cli.quiet {
        print_banner(compressor.config());
    }

    if cli.dry_run {
        print_plan(&compressor, cli.json)?;
        return Ok(0);
    }

    let json = cli.json;
    let batch = tokio::task::spawn_blocking(move || compressor.run());

    tokio::select! {
        joined = batch => {
            let summary = joined.context("Batch thread terminated unexpectedly")??;
            if json {
                println!("{}", summary.to_json()?);
            } else {
                summary.print();
            }
            Ok(0)
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            warn!("Interrupted, abandoning the remaining jobs");
            eprintln!(
                "{}: completed outputs were kept; the run is incomplete",
                style("Interrupted").yellow().bold()
            );
            Ok(EXIT_INTERRUPTED)
        }
    }
}

/// Log level from the flags, falling back to the config file
fn logging_config(cli: &Cli, file_config: &Config) -> LoggingConfig {
    let level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        file_config.logging.level.clone()
    };

    LoggingConfig {
        level,
        json_format: file_config.logging.json_format,
    }
}

/// Merge flags over the config file; presence flags are OR-ed
fn build_run_config(cli: &Cli, file_config: &Config) -> batchpress::Result<RunConfig> {
    let compression = &file_config.compression;
    let run = &file_config.run;

    let output_format = match &cli.output_format {
        Some(name) => parse_output_format(name),
        None => compression.output_format,
    };

    let options = CompressionOptions::new(
        cli.quality.unwrap_or(compression.quality),
        cli.resize || compression.resize,
        cli.max_width.unwrap_or(compression.max_width),
        output_format,
    )?;

    Ok(RunConfig::new(&cli.input_folder, &cli.output_folder)
        .recursive(cli.recursive || run.recursive)
        .flatten(cli.break_structure || run.break_structure)
        .parallel(cli.parallel || run.parallel)
        .error_log(cli.error_log.clone().unwrap_or_else(|| run.error_log.clone()))
        .options(options))
}

/// Unknown format names fall back to JPEG with a notice
fn parse_output_format(name: &str) -> OutputFormat {
    name.parse().unwrap_or_else(|_| {
        eprintln!("Invalid output format '{}'. Defaulting to 'jpeg'.", name);
        OutputFormat::Jpeg
    })
}

fn print_banner(config: &RunConfig) {
    let options = &config.options;

    println!();
    println!("{}", style(":::: Compression Configuration ::::").bold());
    println!("Input Folder: {}", config.input_root.display());
    println!("Output Folder: {}", config.output_root.display());
    println!("Quality: {}", options.quality());
    println!("Resize: {}", options.resize());
    if options.resize() {
        println!("Max Width: {}", options.max_width());
    }
    println!("Output Format: {}", options.output_format());
    if config.recursive {
        println!(
            "Structure: {}",
            if config.flatten { "flattened" } else { "mirrored" }
        );
    }
    println!("Mode: {}", if config.parallel { "parallel" } else { "serial" });
    println!();
}

fn print_plan(compressor: &BatchCompressor, json: bool) -> anyhow::Result<()> {
    let plan = compressor.plan()?;
    debug!("Dry run resolved {} paths", plan.len());

    if json {
        let pairs: Vec<serde_json::Value> = plan
            .iter()
            .map(|path| serde_json::json!({ "input": path.input, "output": path.output }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&pairs)?);
        return Ok(());
    }

    if plan.is_empty() {
        println!("No images found in the input folder.");
        return Ok(());
    }

    println!("{} files would be processed:", style(plan.len()).bold());
    for path in &plan {
        println!("  {} -> {}", path.input.display(), path.output.display());
    }
    Ok(())
}
