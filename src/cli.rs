//! Command-line arguments

use crate::report::ReportOptions;
use crate::stats::TimeWindow;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Render summary charts of LoRaWAN scanner captures into a PDF report
#[derive(Debug, Parser)]
#[command(name = "lorascan-report", version)]
pub struct Args {
    /// CSV file or path to a CSV file to get the data from
    pub input_file: String,

    /// Name for a new PDF file, or path to an existing PDF file to overwrite
    pub output_file: String,

    /// Device address(es) to add a detailed page for
    #[arg(short = 'd', long = "devaddr", num_args = 0.., value_name = "ADDR")]
    pub devaddr: Vec<String>,

    /// Only use hours [START, END) since start of recording
    #[arg(
        short = 't',
        long = "time",
        num_args = 2,
        value_names = ["START", "END"],
        allow_negative_numbers = true
    )]
    pub time: Option<Vec<i64>>,

    /// TOML file with chart and page settings
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write every page as SVG into this directory
    #[arg(long = "svg-dir", value_name = "DIR")]
    pub svg_dir: Option<PathBuf>,
}

impl Args {
    pub fn input_path(&self) -> PathBuf {
        with_extension_hint(&self.input_file, ".csv")
    }

    pub fn output_path(&self) -> PathBuf {
        with_extension_hint(&self.output_file, ".pdf")
    }

    /// Validated time window and device list
    pub fn report_options(&self) -> Result<ReportOptions> {
        let window = match self.time.as_deref() {
            Some([start, end]) => Some(TimeWindow::new(*start, *end)?),
            Some(other) => anyhow::bail!("--time takes two values, got {}", other.len()),
            None => None,
        };

        Ok(ReportOptions {
            window,
            devices: self.devaddr.clone(),
        })
    }
}

/// Append `suffix` unless the name already contains it
fn with_extension_hint(name: &str, suffix: &str) -> PathBuf {
    if name.contains(suffix) {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}{}", name, suffix))
    }
}
