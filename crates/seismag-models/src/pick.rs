//! Picks: timed phase detections at a single station.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{CreationInfo, EvaluationMode, WaveformStreamId};

/// A timed arrival detection at one station, independent of any origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub public_id: String,
    pub waveform_id: WaveformStreamId,
    /// Phase arrival time.
    pub time: DateTime<Utc>,
    pub phase_hint: Option<String>,
    pub evaluation_mode: Option<EvaluationMode>,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

impl Pick {
    pub fn new(public_id: &str, waveform_id: WaveformStreamId, time: DateTime<Utc>) -> Self {
        Self {
            public_id: public_id.to_string(),
            waveform_id,
            time,
            phase_hint: None,
            evaluation_mode: None,
            creation_info: CreationInfo::default(),
        }
    }
}
