//! LoRaWAN capture report
//!
//! This tool:
//! - Loads the CSV capture log written by the LoRa scanner
//! - Optionally restricts it to a window of hours since start of recording
//! - Aggregates RSSI, SNR, message types, devices, ACKs and packets per hour
//! - Renders an overview page plus one page per requested device into a PDF
//!
//! Pipeline: CSV → records → page summaries → plotters → printpdf

use anyhow::{Context, Result};
use clap::Parser;
use lorascan_report::cli::Args;
use lorascan_report::config::Config;
use lorascan_report::render::{self, PdfReport};
use lorascan_report::{capture, report};
use tracing::info;

fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    info!("LoRaWAN capture report starting");

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::from_env()?,
    };
    info!("Configuration loaded successfully");

    let options = args.report_options()?;

    let input = args.input_path();
    let records = capture::load_captures(&input)?;

    let pages = report::build_report(&records, &options, &config)?.pages;
    info!(pages = pages.len(), "Report built");

    let mut pdf = PdfReport::new(&config.page.title, config.page.size())?;
    for page in &pages {
        pdf.add_page(page)?;
    }

    if let Some(dir) = &args.svg_dir {
        render::write_svg_pages(dir, &pages, config.page.size())?;
    }

    pdf.save(args.output_path())?;

    Ok(())
}
