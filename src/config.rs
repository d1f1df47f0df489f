//! Configuration management for the capture report
//!
//! Loads chart ranges, device options and page geometry from a TOML file with
//! environment variable overrides. Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// EU868 uplink channels the scanner hops across
pub const EU868_CHANNELS: [u32; 8] = [
    867_100_000,
    867_300_000,
    867_500_000,
    867_700_000,
    867_900_000,
    868_100_000,
    868_300_000,
    868_500_000,
];

/// Complete report configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub histogram: HistogramConfig,
    pub devices: DeviceConfig,
    pub page: PageConfig,
}

/// Value ranges of the RSSI and SNR distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub rssi_min: i16,
    pub rssi_max: i16,
    pub snr_min: i16,
    pub snr_max: i16,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            rssi_min: -120,
            rssi_max: 0,
            snr_min: -20,
            snr_max: 10,
        }
    }
}

impl HistogramConfig {
    pub fn rssi_range(&self) -> RangeInclusive<i16> {
        self.rssi_min..=self.rssi_max
    }

    pub fn snr_range(&self) -> RangeInclusive<i16> {
        self.snr_min..=self.snr_max
    }
}

/// Device chart options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Number of devices shown on the overview page
    pub top_n: usize,
    /// Channels shown on a single-device page, in Hz
    pub channel_frequencies: Vec<u32>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            channel_frequencies: EU868_CHANNELS.to_vec(),
        }
    }
}

/// Page geometry in PDF points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub width_pt: u32,
    pub height_pt: u32,
    pub title: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        // 18 x 12 inches
        Self {
            width_pt: 1296,
            height_pt: 864,
            title: "LoRaWAN capture report".to_string(),
        }
    }
}

impl PageConfig {
    pub fn size(&self) -> (u32, u32) {
        (self.width_pt, self.height_pt)
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Environment variables override config file values:
    /// - LORASCAN_TOP_DEVICES: Override the number of devices on the overview page
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Defaults with environment overrides, used when no config file is given
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(top_n) = std::env::var("LORASCAN_TOP_DEVICES") {
            tracing::info!(top_n = %top_n, "Using LORASCAN_TOP_DEVICES from environment");
            self.apply_top_devices(&top_n)?;
        }
        Ok(())
    }

    fn apply_top_devices(&mut self, value: &str) -> Result<()> {
        self.devices.top_n = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid LORASCAN_TOP_DEVICES value: {}", value))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let h = &self.histogram;
        if h.rssi_min >= h.rssi_max {
            anyhow::bail!(
                "Invalid RSSI range: {}..{} (min must be lower than max)",
                h.rssi_min,
                h.rssi_max
            );
        }
        if h.snr_min >= h.snr_max {
            anyhow::bail!(
                "Invalid SNR range: {}..{} (min must be lower than max)",
                h.snr_min,
                h.snr_max
            );
        }

        if self.devices.top_n == 0 {
            anyhow::bail!("devices.top_n must be greater than 0");
        }
        if self.devices.channel_frequencies.is_empty() {
            anyhow::bail!("devices.channel_frequencies must not be empty");
        }

        if self.page.width_pt < 400 || self.page.height_pt < 300 {
            anyhow::bail!(
                "Page of {}x{} pt is too small (minimum 400x300)",
                self.page.width_pt,
                self.page.height_pt
            );
        }

        Ok(())
    }
}
