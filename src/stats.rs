//! Aggregations over capture records
//!
//! Every chart on a report page is one count-by-value or count-by-bucket pass over
//! the records of that page.

use crate::capture::{CaptureRecord, MessageType};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

const SECONDS_PER_HOUR: u64 = 3600;

/// Longest recording the hourly chart covers: 366 days
pub const MAX_HOURS_RECORDED: u32 = 366 * 24;

/// Zero-filled counts over a contiguous integer range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub range: RangeInclusive<i16>,
    /// One count per value of `range`
    pub counts: Vec<u32>,
    pub out_of_range: u32,
}

impl Distribution {
    fn collect(range: RangeInclusive<i16>, values: impl Iterator<Item = i16>) -> Self {
        let (lo, hi) = (*range.start(), *range.end());
        let mut counts = vec![0; (hi as i32 - lo as i32 + 1).max(0) as usize];
        let mut out_of_range = 0;

        for value in values {
            if range.contains(&value) {
                counts[(value as i32 - lo as i32) as usize] += 1;
            } else {
                out_of_range += 1;
            }
        }

        Self {
            range,
            counts,
            out_of_range,
        }
    }

    /// `(value, count)` pairs over the whole range
    pub fn iter(&self) -> impl Iterator<Item = (i16, u32)> + '_ {
        self.range.clone().zip(self.counts.iter().copied())
    }

    pub fn count(&self, value: i16) -> u32 {
        if !self.range.contains(&value) {
            return 0;
        }
        self.counts[(value as i32 - *self.range.start() as i32) as usize]
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// RSSI histogram in 1 dBm buckets
pub fn rssi_distribution(records: &[CaptureRecord], range: RangeInclusive<i16>) -> Distribution {
    Distribution::collect(range, records.iter().map(|r| r.rssi))
}

/// SNR histogram in 1 dB buckets
pub fn snr_distribution(records: &[CaptureRecord], range: RangeInclusive<i16>) -> Distribution {
    Distribution::collect(range, records.iter().map(|r| r.snr))
}

/// Messages per type; the three uplink types come first and are always present
pub fn message_type_counts(records: &[CaptureRecord]) -> Vec<(MessageType, u32)> {
    let mut counted: BTreeMap<MessageType, u32> = BTreeMap::new();
    for record in records {
        *counted.entry(record.mtype).or_default() += 1;
    }

    let mut counts: Vec<(MessageType, u32)> = MessageType::UPLINKS
        .iter()
        .map(|t| (*t, counted.remove(t).unwrap_or(0)))
        .collect();
    // BTreeMap iterates in code order
    counts.extend(counted);
    counts
}

/// Message count per device, most active first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceActivity {
    pub devices: Vec<(String, u32)>,
}

impl DeviceActivity {
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn top(&self, n: usize) -> &[(String, u32)] {
        &self.devices[..n.min(self.devices.len())]
    }

    pub fn contains(&self, dev_addr: &str) -> bool {
        self.devices
            .iter()
            .any(|(addr, _)| addr.eq_ignore_ascii_case(dev_addr))
    }
}

pub fn device_activity(records: &[CaptureRecord]) -> DeviceActivity {
    let mut counted: HashMap<&str, u32> = HashMap::new();
    for record in records {
        *counted.entry(record.dev_addr.as_str()).or_default() += 1;
    }

    let mut devices: Vec<(String, u32)> = counted
        .into_iter()
        .map(|(addr, count)| (addr.to_string(), count))
        .collect();
    devices.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    DeviceActivity { devices }
}

/// Messages per configured channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCounts {
    /// `(frequency in Hz, count)` in configuration order
    pub channels: Vec<(u32, u32)>,
    /// Messages on frequencies that are not configured
    pub other: u32,
}

impl ChannelCounts {
    /// Channel frequency in MHz, e.g. `868.1`
    pub fn label(freq_hz: u32) -> String {
        format!("{}", freq_hz as f64 / 1_000_000.0)
    }
}

pub fn channel_counts(records: &[CaptureRecord], frequencies: &[u32]) -> ChannelCounts {
    let mut channels: Vec<(u32, u32)> = frequencies.iter().map(|f| (*f, 0)).collect();
    let mut other = 0;

    for record in records {
        match channels.iter_mut().find(|(f, _)| *f == record.channel_freq) {
            Some((_, count)) => *count += 1,
            None => other += 1,
        }
    }

    ChannelCounts { channels, other }
}

/// Frames with and without the ACK bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AckRatio {
    pub acked: u32,
    pub not_acked: u32,
}

impl AckRatio {
    pub fn total(&self) -> u32 {
        self.acked + self.not_acked
    }

    /// Percentage of acknowledged frames, `None` without frames
    pub fn acked_percent(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.acked as f64 * 100.0 / total as f64),
        }
    }
}

pub fn ack_ratio(records: &[CaptureRecord]) -> AckRatio {
    records.iter().fold(AckRatio::default(), |mut ratio, r| {
        if r.ack {
            ratio.acked += 1;
        } else {
            ratio.not_acked += 1;
        }
        ratio
    })
}

/// Packets per hour since the first capture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HourlyCounts {
    /// Hour index of `counts[0]`
    pub first_hour: u32,
    pub counts: Vec<u32>,
}

impl HourlyCounts {
    pub fn hours_recorded(&self) -> u32 {
        self.counts.len() as u32
    }

    /// `(hour, count)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.first_hour..).zip(self.counts.iter().copied())
    }

    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Hour bucket of each record, relative to the earliest record
fn hour_buckets(records: &[CaptureRecord]) -> Result<Vec<u32>> {
    let start = records.iter().map(|r| r.time_ms / 1000).min().unwrap_or(0);
    records
        .iter()
        .map(|r| {
            let hour = (r.time_ms / 1000 - start) / SECONDS_PER_HOUR;
            match u32::try_from(hour) {
                Ok(hour) if hour < MAX_HOURS_RECORDED => Ok(hour),
                _ => anyhow::bail!(
                    "Capture at {} ms lies {} hours after the first capture (at most {} hours are supported)",
                    r.time_ms,
                    hour,
                    MAX_HOURS_RECORDED
                ),
            }
        })
        .collect()
}

pub fn packets_per_hour(records: &[CaptureRecord]) -> Result<HourlyCounts> {
    let mut counts: Vec<u32> = Vec::new();
    for hour in hour_buckets(records)? {
        let hour = hour as usize;
        if hour >= counts.len() {
            counts.resize(hour + 1, 0);
        }
        counts[hour] += 1;
    }

    Ok(HourlyCounts {
        first_hour: 0,
        counts,
    })
}

/// Hours `[start, end)` since start of recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    /// Check the bounds given on the command line
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start < 0 {
            anyhow::bail!("Attention: first timeslot value can't be lower than zero");
        }
        if start > end {
            anyhow::bail!(
                "Attention: first timeslot value can not be higher than the second timeslot value"
            );
        }
        let end = u32::try_from(end).map_err(|_| {
            anyhow::anyhow!(
                "Attention: second timeslot value is higher than the actual number of hours recorded in the data"
            )
        })?;

        Ok(Self {
            start: start as u32,
            end,
        })
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..self.end).contains(&hour)
    }
}

/// Records inside `window` together with the sliced hourly series
pub fn restrict_to_window(
    records: &[CaptureRecord],
    window: TimeWindow,
) -> Result<(Vec<CaptureRecord>, HourlyCounts)> {
    let hourly = packets_per_hour(records)?;
    if window.end > hourly.hours_recorded() {
        anyhow::bail!(
            "Attention: second timeslot value is higher than the actual number of hours recorded in the data ({} > {})",
            window.end,
            hourly.hours_recorded()
        );
    }

    let kept: Vec<CaptureRecord> = records
        .iter()
        .zip(hour_buckets(records)?)
        .filter(|(_, hour)| window.contains(*hour))
        .map(|(r, _)| r.clone())
        .collect();

    let sliced = HourlyCounts {
        first_hour: window.start,
        counts: hourly.counts[window.start as usize..window.end as usize].to_vec(),
    };

    Ok((kept, sliced))
}

/// Records sent by one device
pub fn restrict_to_device(records: &[CaptureRecord], dev_addr: &str) -> Vec<CaptureRecord> {
    records
        .iter()
        .filter(|r| r.dev_addr.eq_ignore_ascii_case(dev_addr))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::record;
    use crate::config::EU868_CHANNELS;

    const HOUR_MS: u64 = 3_600_000;

    #[test]
    fn test_rssi_distribution_zero_fills() {
        let records = vec![
            record(0, "A", -97, 0),
            record(1, "A", -97, 0),
            record(2, "A", -120, 0),
            record(3, "A", -130, 0),
            record(4, "A", 3, 0),
        ];

        let dist = rssi_distribution(&records, -120..=0);
        assert_eq!(dist.counts.len(), 121);
        assert_eq!(dist.count(-97), 2);
        assert_eq!(dist.count(-120), 1);
        assert_eq!(dist.count(-50), 0);
        assert_eq!(dist.out_of_range, 2);
        assert_eq!(dist.max_count(), 2);
        assert_eq!(dist.iter().next(), Some((-120, 1)));
        assert_eq!(dist.iter().last(), Some((0, 0)));
    }

    #[test]
    fn test_snr_distribution() {
        let records = vec![record(0, "A", -90, -20), record(1, "A", -90, 10), record(2, "A", -90, 11)];

        let dist = snr_distribution(&records, -20..=10);
        assert_eq!(dist.counts.len(), 31);
        assert_eq!(dist.count(-20), 1);
        assert_eq!(dist.count(10), 1);
        assert_eq!(dist.out_of_range, 1);
    }

    #[test]
    fn test_message_type_counts_fixed_order() {
        let mut join = record(0, "A", -90, 0);
        join.mtype = MessageType::JoinRequest;
        let mut proprietary = record(1, "A", -90, 0);
        proprietary.mtype = MessageType::Proprietary;
        let records = vec![join, proprietary, record(2, "A", -90, 0), record(3, "A", -90, 0)];

        let counts = message_type_counts(&records);
        assert_eq!(
            counts,
            vec![
                (MessageType::JoinRequest, 1),
                (MessageType::UnconfirmedDataUp, 2),
                (MessageType::ConfirmedDataUp, 0),
                (MessageType::Proprietary, 1),
            ]
        );

        assert_eq!(message_type_counts(&[]).len(), 3);
    }

    #[test]
    fn test_device_activity_sorted() {
        let records = vec![
            record(0, "BBBB0001", -90, 0),
            record(1, "AAAA0001", -90, 0),
            record(2, "CCCC0001", -90, 0),
            record(3, "CCCC0001", -90, 0),
        ];

        let activity = device_activity(&records);
        assert_eq!(activity.len(), 3);
        assert_eq!(activity.devices[0], ("CCCC0001".to_string(), 2));
        // Ties by address
        assert_eq!(activity.devices[1].0, "AAAA0001");
        assert_eq!(activity.devices[2].0, "BBBB0001");
        assert_eq!(activity.top(2).len(), 2);
        assert_eq!(activity.top(10).len(), 3);
        assert!(activity.contains("cccc0001"));
        assert!(!activity.contains("DDDD0001"));
    }

    #[test]
    fn test_channel_counts() {
        let mut off_plan = record(0, "A", -90, 0);
        off_plan.channel_freq = 869_525_000;
        let mut low = record(1, "A", -90, 0);
        low.channel_freq = 867_100_000;
        let records = vec![off_plan, low, record(2, "A", -90, 0)];

        let counts = channel_counts(&records, &EU868_CHANNELS);
        assert_eq!(counts.channels.len(), 8);
        assert_eq!(counts.channels[0], (867_100_000, 1));
        assert_eq!(counts.channels[5], (868_100_000, 1));
        assert_eq!(counts.other, 1);
        assert_eq!(ChannelCounts::label(868_100_000), "868.1");
    }

    #[test]
    fn test_ack_ratio() {
        let mut acked = record(0, "A", -90, 0);
        acked.ack = true;
        let records = vec![acked, record(1, "A", -90, 0), record(2, "A", -90, 0), record(3, "A", -90, 0)];

        let ratio = ack_ratio(&records);
        assert_eq!(ratio, AckRatio { acked: 1, not_acked: 3 });
        assert_eq!(ratio.acked_percent(), Some(25.0));
        assert_eq!(ack_ratio(&[]).acked_percent(), None);
    }

    #[test]
    fn test_packets_per_hour_contiguous() {
        let records = vec![
            record(5_000, "A", -90, 0),
            record(5_000 + 10_000, "A", -90, 0),
            record(5_000 + 2 * HOUR_MS, "A", -90, 0),
            record(5_000 + 3 * HOUR_MS - 1, "A", -90, 0),
        ];

        let hourly = packets_per_hour(&records).unwrap();
        assert_eq!(hourly.counts, vec![2, 0, 2]);
        assert_eq!(hourly.hours_recorded(), 3);
        assert_eq!(hourly.max_count(), 2);
        assert_eq!(hourly.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 0), (2, 2)]);

        assert_eq!(packets_per_hour(&[]).unwrap().hours_recorded(), 0);
    }

    #[test]
    fn test_packets_per_hour_rejects_huge_span() {
        // 2^32 hours apart must not wrap into the same bucket
        let wrapped = vec![record(0, "A", -90, 0), record((1u64 << 32) * HOUR_MS, "A", -90, 0)];
        assert!(packets_per_hour(&wrapped).is_err());

        let outlier = vec![record(0, "A", -90, 0), record(50_000_000 * HOUR_MS, "A", -90, 0)];
        let err = packets_per_hour(&outlier).unwrap_err();
        assert!(err.to_string().contains("hours after the first capture"), "{}", err);

        let window = TimeWindow::new(0, 1).unwrap();
        assert!(restrict_to_window(&outlier, window).is_err());

        // Last supported hour is still accepted
        let longest = vec![
            record(0, "A", -90, 0),
            record((MAX_HOURS_RECORDED as u64 - 1) * HOUR_MS, "A", -90, 0),
        ];
        let hourly = packets_per_hour(&longest).unwrap();
        assert_eq!(hourly.hours_recorded(), MAX_HOURS_RECORDED);
    }

    #[test]
    fn test_time_window_sanity_checks() {
        assert!(TimeWindow::new(-1, 3).unwrap_err().to_string().contains("lower than zero"));
        assert!(TimeWindow::new(4, 3)
            .unwrap_err()
            .to_string()
            .contains("can not be higher"));
        assert_eq!(TimeWindow::new(1, 3).unwrap(), TimeWindow { start: 1, end: 3 });
    }

    #[test]
    fn test_restrict_to_window() {
        let records: Vec<CaptureRecord> = (0..4)
            .map(|h| record(h * HOUR_MS + 1_000, "A", -90, 0))
            .collect();

        let (kept, hourly) = restrict_to_window(&records, TimeWindow::new(1, 3).unwrap()).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].time_ms, HOUR_MS + 1_000);
        assert_eq!(hourly.first_hour, 1);
        assert_eq!(hourly.counts, vec![1, 1]);

        let err = restrict_to_window(&records, TimeWindow::new(0, 5).unwrap()).unwrap_err();
        assert!(err.to_string().contains("second timeslot value is higher"));

        // Whole recording
        let (kept, _) = restrict_to_window(&records, TimeWindow::new(0, 4).unwrap()).unwrap();
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn test_restrict_to_device() {
        let records = vec![record(0, "26011BDA", -90, 0), record(1, "260B3C4D", -90, 0)];
        let device = restrict_to_device(&records, "26011bda");
        assert_eq!(device.len(), 1);
        assert_eq!(device[0].dev_addr, "26011BDA");
    }
}
