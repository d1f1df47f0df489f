//! LoRaWAN capture log loading
//!
//! The scanner firmware appends one CSV row per received uplink:
//! `Time,ChannelFreq,RSSI,SNR,MType,DevAddr,ADR,ADRACKReq,ACK,FCnt,FOptsLen,FOpts,FPort`

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// LoRaWAN MHDR message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageType {
    JoinRequest,
    JoinAccept,
    UnconfirmedDataUp,
    UnconfirmedDataDown,
    ConfirmedDataUp,
    ConfirmedDataDown,
    RejoinRequest,
    Proprietary,
}

impl MessageType {
    /// Types always present on the message type chart, in display order
    pub const UPLINKS: [MessageType; 3] = [
        MessageType::JoinRequest,
        MessageType::UnconfirmedDataUp,
        MessageType::ConfirmedDataUp,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::JoinRequest,
            1 => Self::JoinAccept,
            2 => Self::UnconfirmedDataUp,
            3 => Self::UnconfirmedDataDown,
            4 => Self::ConfirmedDataUp,
            5 => Self::ConfirmedDataDown,
            6 => Self::RejoinRequest,
            7 => Self::Proprietary,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::JoinRequest => "Join Request",
            Self::JoinAccept => "Join Accept",
            Self::UnconfirmedDataUp => "Unconfirmed Data Up",
            Self::UnconfirmedDataDown => "Unconfirmed Data Down",
            Self::ConfirmedDataUp => "Confirmed Data Up",
            Self::ConfirmedDataDown => "Confirmed Data Down",
            Self::RejoinRequest => "Rejoin Request",
            Self::Proprietary => "Proprietary",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        MessageType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown MType code {}", code)))
    }
}

/// One captured uplink (one CSV row)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptureRecord {
    /// Milliseconds since the scanner started recording
    #[serde(rename = "Time")]
    pub time_ms: u64,
    /// Channel frequency in Hz
    #[serde(rename = "ChannelFreq")]
    pub channel_freq: u32,
    /// RSSI in dBm
    #[serde(rename = "RSSI")]
    pub rssi: i16,
    /// SNR in dB
    #[serde(rename = "SNR")]
    pub snr: i16,
    #[serde(rename = "MType")]
    pub mtype: MessageType,
    /// Device address, uppercase hex
    #[serde(rename = "DevAddr", deserialize_with = "uppercase")]
    pub dev_addr: String,
    #[serde(rename = "ADR", deserialize_with = "flag")]
    pub adr: bool,
    #[serde(rename = "ADRACKReq", deserialize_with = "flag")]
    pub adr_ack_req: bool,
    #[serde(rename = "ACK", deserialize_with = "flag")]
    pub ack: bool,
    #[serde(rename = "FCnt")]
    pub fcnt: u16,
    #[serde(rename = "FOptsLen")]
    pub fopts_len: u8,
    /// FOpts bytes as hex, empty when absent
    #[serde(rename = "FOpts", default)]
    pub fopts: String,
    #[serde(rename = "FPort")]
    pub fport: u8,
}

fn uppercase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(s.to_ascii_uppercase())
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match u8::deserialize(deserializer)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "flag must be 0 or 1, got {}",
            other
        ))),
    }
}

/// Read capture records from a CSV file
pub fn load_captures(path: impl AsRef<Path>) -> Result<Vec<CaptureRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open capture log: {}", path.display()))?;

    let records = read_captures(file)
        .with_context(|| format!("Failed to parse capture log: {}", path.display()))?;

    info!(path = %path.display(), records = records.len(), "Loaded capture log");
    Ok(records)
}

/// Read capture records from any CSV source, sorted by capture time
pub fn read_captures<R: Read>(reader: R) -> Result<Vec<CaptureRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (index, row) in csv_reader.deserialize::<CaptureRecord>().enumerate() {
        let record = row.map_err(|e| {
            // Quoted fields may span lines, so ask the reader where the record starts
            let line = e
                .position()
                .map(|pos| pos.line())
                .unwrap_or(index as u64 + 2);
            anyhow::Error::new(e).context(format!("Invalid capture record on line {}", line))
        })?;
        records.push(record);
    }

    records.sort_by_key(|r| r.time_ms);
    debug!(records = records.len(), "Parsed capture records");

    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const HEADER: &str =
        "Time,ChannelFreq,RSSI,SNR,MType,DevAddr,ADR,ADRACKReq,ACK,FCnt,FOptsLen,FOpts,FPort";

    /// Build a record with the fields the aggregations look at
    pub(crate) fn record(time_ms: u64, dev_addr: &str, rssi: i16, snr: i16) -> CaptureRecord {
        CaptureRecord {
            time_ms,
            channel_freq: 868_100_000,
            rssi,
            snr,
            mtype: MessageType::UnconfirmedDataUp,
            dev_addr: dev_addr.to_string(),
            adr: true,
            adr_ack_req: false,
            ack: false,
            fcnt: 1,
            fopts_len: 0,
            fopts: String::new(),
            fport: 1,
        }
    }

    #[test]
    fn test_read_firmware_rows() {
        let csv = format!(
            "{}\n\
             7200000,868300000,-97,7,2,26011bda,1,0,0,42,0, ,1\n\
             1500,867100000,-113,-12,4,260B3C4D,0,0,1,7,3,030700,10\n",
            HEADER
        );

        let records = read_captures(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        // Sorted by capture time
        let first = &records[0];
        assert_eq!(first.time_ms, 1500);
        assert_eq!(first.channel_freq, 867_100_000);
        assert_eq!(first.rssi, -113);
        assert_eq!(first.snr, -12);
        assert_eq!(first.mtype, MessageType::ConfirmedDataUp);
        assert!(first.ack);
        assert_eq!(first.fopts_len, 3);
        assert_eq!(first.fopts, "030700");
        assert_eq!(first.fport, 10);

        let second = &records[1];
        assert_eq!(second.dev_addr, "26011BDA");
        assert!(second.adr);
        assert!(!second.ack);
        assert_eq!(second.fopts, "");
        assert_eq!(second.fcnt, 42);
    }

    #[test]
    fn test_header_only_is_empty() {
        let records = read_captures(HEADER.as_bytes()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_bad_row_names_line() {
        let csv = format!(
            "{}\n\
             1000,868100000,-90,5,2,26011BDA,1,0,0,1,0, ,1\n\
             2000,868100000,loud,5,2,26011BDA,1,0,0,2,0, ,1\n",
            HEADER
        );

        let err = read_captures(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn test_bad_row_after_multiline_field_names_line() {
        // FOpts of the first record spans lines 2 and 3
        let csv = format!(
            "{}\n\
             1000,868100000,-90,5,2,26011BDA,1,0,0,1,2,\"03\n05\",1\n\
             2000,868100000,loud,5,2,26011BDA,1,0,0,2,0, ,1\n",
            HEADER
        );

        let err = read_captures(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 4"), "{}", err);
    }

    #[test]
    fn test_unknown_mtype_rejected() {
        let csv = format!("{}\n1000,868100000,-90,5,9,26011BDA,1,0,0,1,0, ,1\n", HEADER);
        assert!(read_captures(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_message_type_codes() {
        for code in 0..=7u8 {
            let mtype = MessageType::from_code(code).unwrap();
            assert_eq!(mtype.code(), code);
        }
        assert_eq!(MessageType::from_code(8), None);
        assert_eq!(MessageType::ConfirmedDataUp.to_string(), "Confirmed Data Up");
    }
}
