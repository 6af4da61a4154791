//! Derived magnitudes attached to origins.
//!
//! Station and network magnitudes are children of exactly one origin and
//! reference each other by public id only. The engine is the sole writer
//! of these records.

use serde::{Deserialize, Serialize};

use crate::identity::{CreationInfo, EvaluationStatus, WaveformStreamId};

/// A per-station magnitude of one type, attached to an origin and keyed
/// by (waveform stream id, type) within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMagnitude {
    pub public_id: String,
    /// Public id of the parent origin.
    pub origin_id: String,
    pub magnitude_type: String,
    pub magnitude: f64,
    pub waveform_id: WaveformStreamId,
    /// Public id of the amplitude this magnitude was computed from.
    pub amplitude_id: Option<String>,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

/// Reference from a network magnitude to one of the station magnitudes it
/// was aggregated from, with the weight the estimator assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMagnitudeContribution {
    pub station_magnitude_id: String,
    pub weight: Option<f64>,
}

/// Aggregate magnitude of one type for an origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMagnitude {
    pub public_id: String,
    /// Public id of the parent origin.
    pub origin_id: String,
    pub magnitude_type: String,
    pub magnitude: f64,
    /// Standard deviation (or Mw estimation error) of the aggregate.
    pub uncertainty: Option<f64>,
    /// Canonical estimator tag, e.g. `"mean"` or `"trimmed mean(25)"`.
    pub method_id: Option<String>,
    /// Number of contributions with weight > 0.
    pub station_count: Option<usize>,
    /// Set only by reviewers. While set, the engine never rewrites this
    /// magnitude.
    pub evaluation_status: Option<EvaluationStatus>,
    #[serde(default)]
    pub contributions: Vec<StationMagnitudeContribution>,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

impl NetworkMagnitude {
    /// Whether a reviewer has pinned this magnitude against engine updates.
    pub fn is_frozen(&self) -> bool {
        self.evaluation_status.is_some()
    }

    pub fn contribution(&self, station_magnitude_id: &str) -> Option<&StationMagnitudeContribution> {
        self.contributions
            .iter()
            .find(|c| c.station_magnitude_id == station_magnitude_id)
    }

    pub fn contribution_mut(
        &mut self,
        station_magnitude_id: &str,
    ) -> Option<&mut StationMagnitudeContribution> {
        self.contributions
            .iter_mut()
            .find(|c| c.station_magnitude_id == station_magnitude_id)
    }
}
