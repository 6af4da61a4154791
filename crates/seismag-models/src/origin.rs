//! Origins: hypocentres with arrivals and derived magnitudes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{CreationInfo, EvaluationStatus, WaveformStreamId};
use crate::magnitude::{NetworkMagnitude, StationMagnitude};

/// A pick's use within one origin: the association carries the
/// source–receiver distance and the weight the locator assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    /// Public id of the referenced pick.
    pub pick_id: String,
    pub phase: Option<String>,
    /// Source–station distance in degrees.
    pub distance: Option<f64>,
    /// Locator weight; unset counts as 1.0.
    pub weight: Option<f64>,
}

impl Arrival {
    pub fn new(pick_id: &str, distance: f64, weight: f64) -> Self {
        Self {
            pick_id: pick_id.to_string(),
            phase: None,
            distance: Some(distance),
            weight: Some(weight),
        }
    }

    /// Whether this arrival takes part in magnitude computation.
    pub fn is_valid(&self, minimum_weight: f64) -> bool {
        self.weight.unwrap_or(1.0) >= minimum_weight
    }
}

/// A hypocentre with its arrivals and the magnitudes derived for it.
///
/// Station and network magnitudes are owned by the origin as id-keyed
/// child tables; contributions inside a network magnitude reference
/// station magnitudes of the same origin by public id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub public_id: String,
    pub time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Hypocentre depth in kilometres. Required for magnitude computation.
    pub depth_km: Option<f64>,
    pub evaluation_status: Option<EvaluationStatus>,
    #[serde(default)]
    pub arrivals: Vec<Arrival>,
    #[serde(default)]
    pub station_magnitudes: Vec<StationMagnitude>,
    #[serde(default)]
    pub magnitudes: Vec<NetworkMagnitude>,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

impl Origin {
    pub fn new(public_id: &str) -> Self {
        Self {
            public_id: public_id.to_string(),
            time: None,
            latitude: None,
            longitude: None,
            depth_km: None,
            evaluation_status: None,
            arrivals: Vec::new(),
            station_magnitudes: Vec::new(),
            magnitudes: Vec::new(),
            creation_info: CreationInfo::default(),
        }
    }

    /// Find the station magnitude keyed by (waveform stream id, type).
    pub fn station_magnitude_index(
        &self,
        waveform_id: &WaveformStreamId,
        magnitude_type: &str,
    ) -> Option<usize> {
        self.station_magnitudes
            .iter()
            .position(|m| m.waveform_id == *waveform_id && m.magnitude_type == magnitude_type)
    }

    /// Find the network magnitude of the given type.
    pub fn network_magnitude_index(&self, magnitude_type: &str) -> Option<usize> {
        self.magnitudes
            .iter()
            .position(|m| m.magnitude_type == magnitude_type)
    }

    pub fn network_magnitude(&self, magnitude_type: &str) -> Option<&NetworkMagnitude> {
        self.magnitudes
            .iter()
            .find(|m| m.magnitude_type == magnitude_type)
    }
}
