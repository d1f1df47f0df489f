//! Report pages
//!
//! A report is an overview page over all (time restricted) captures followed by
//! one page per requested device.

use crate::capture::{CaptureRecord, MessageType};
use crate::config::Config;
use crate::stats::{self, AckRatio, ChannelCounts, DeviceActivity, Distribution, HourlyCounts, TimeWindow};
use anyhow::Result;
use tracing::{info, warn};

/// Fourth chart of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChart {
    /// Most active devices
    Devices { shown: Vec<(String, u32)> },
    /// Single device: messages per channel
    Channels(ChannelCounts),
}

/// Everything drawn on one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub headline: String,
    pub packets: usize,
    pub rssi: Distribution,
    pub snr: Distribution,
    pub message_types: Vec<(MessageType, u32)>,
    pub devices: DeviceChart,
    pub ack: AckRatio,
    pub hourly: HourlyCounts,
}

impl PageSummary {
    /// Summarise `records`; `hourly` replaces the packets-per-hour series when the
    /// records were cut to a time window
    pub fn build(
        records: &[CaptureRecord],
        config: &Config,
        window: Option<(TimeWindow, HourlyCounts)>,
    ) -> Result<Self> {
        let activity = stats::device_activity(records);
        let top_n = config.devices.top_n;

        let (mut headline, devices) = match activity.len() {
            0 => (
                "No packets recorded".to_string(),
                DeviceChart::Devices { shown: Vec::new() },
            ),
            1 => (
                format!(
                    "Overview of the device with the device address {}",
                    activity.devices[0].0
                ),
                DeviceChart::Channels(stats::channel_counts(
                    records,
                    &config.devices.channel_frequencies,
                )),
            ),
            n => (
                if n > top_n {
                    "Overview of all devices".to_string()
                } else {
                    format!("Overview of all {} devices", n)
                },
                DeviceChart::Devices {
                    shown: activity.top(top_n).to_vec(),
                },
            ),
        };

        let hourly = match window {
            Some((window, hourly)) => {
                headline.push_str(&format!(" (hours {}-{})", window.start, window.end));
                hourly
            }
            None => stats::packets_per_hour(records)?,
        };

        Ok(Self {
            headline,
            packets: records.len(),
            rssi: stats::rssi_distribution(records, config.histogram.rssi_range()),
            snr: stats::snr_distribution(records, config.histogram.snr_range()),
            message_types: stats::message_type_counts(records),
            devices,
            ack: stats::ack_ratio(records),
            hourly,
        })
    }
}

/// What to put in the report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub window: Option<TimeWindow>,
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub pages: Vec<PageSummary>,
}

/// Build the overview page and the per-device pages
pub fn build_report(
    records: &[CaptureRecord],
    options: &ReportOptions,
    config: &Config,
) -> Result<Report> {
    let (records, window) = match options.window {
        Some(window) => {
            let (kept, hourly) = stats::restrict_to_window(records, window)?;
            info!(
                start = window.start,
                end = window.end,
                kept = kept.len(),
                "Restricted captures to time window"
            );
            (kept, Some((window, hourly)))
        }
        None => (records.to_vec(), None),
    };

    let mut pages = vec![PageSummary::build(&records, config, window)?];

    if options.devices.is_empty() {
        info!("No specific device(s) given");
    }

    let known: DeviceActivity = stats::device_activity(&records);
    let mut seen: Vec<String> = Vec::new();
    for dev_addr in &options.devices {
        let dev_addr = dev_addr.to_ascii_uppercase();
        if seen.contains(&dev_addr) {
            continue;
        }
        if !known.contains(&dev_addr) {
            warn!(dev_addr = %dev_addr, "Device address not found in captures, skipping");
            continue;
        }

        let device_records = stats::restrict_to_device(&records, &dev_addr);
        info!(dev_addr = %dev_addr, packets = device_records.len(), "Adding device page");
        pages.push(PageSummary::build(&device_records, config, None)?);
        seen.push(dev_addr);
    }

    Ok(Report { pages })
}
