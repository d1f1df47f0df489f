//! LoRaWAN capture report
//!
//! Library side of the `lorascan-report` tool: loading the scanner's CSV capture
//! log, aggregating it into report pages and rendering those pages to PDF or SVG.

pub mod capture;
pub mod cli;
pub mod config;
pub mod render;
pub mod report;
pub mod stats;
