//! Shared identity and provenance types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one recorded waveform stream: network, station, location and
/// channel codes (e.g. `GE.MORC..BHZ`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveformStreamId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl WaveformStreamId {
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
        }
    }

    /// `NET.STA`, the key used for per-station parameter lookups.
    pub fn station_id(&self) -> String {
        format!("{}.{}", self.network, self.station)
    }

    /// The abstract stream key `net.sta.loc.ch` where the channel code is
    /// truncated to its first two characters, so that e.g. `BHZ` and `BHN`
    /// of one sensor collapse into the same group.
    pub fn abstract_stream(&self) -> String {
        let band: String = self.channel.chars().take(2).collect();
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, band
        )
    }
}

impl fmt::Display for WaveformStreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// How an observation was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Automatic,
    Manual,
}

/// Review state of an origin or network magnitude. A network magnitude
/// with any status set is frozen for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Preliminary,
    Confirmed,
    Reviewed,
    Final,
    Rejected,
    Reported,
}

/// Provenance attached to every record: who produced it and when.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreationInfo {
    pub agency_id: Option<String>,
    pub author: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub modification_time: Option<DateTime<Utc>>,
}

impl CreationInfo {
    /// The agency id, or `""` when unset. Used for agency blocklisting.
    pub fn agency(&self) -> &str {
        self.agency_id.as_deref().unwrap_or("")
    }
}
