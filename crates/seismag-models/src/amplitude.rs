//! Amplitudes: measured ground-motion values attached to picks.

use serde::{Deserialize, Serialize};

use crate::identity::{CreationInfo, EvaluationMode, WaveformStreamId};

/// A measured ground-motion value at a station, tagged with the amplitude
/// type a magnitude processor consumes (e.g. `MLv`, `mB`, `Mwp`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amplitude {
    pub public_id: String,
    /// Amplitude type tag; dispatches to the processors registered for it.
    pub amplitude_type: String,
    /// Measured value, in the unit the processors for this type expect.
    pub value: f64,
    /// Dominant period of the measurement, if the type carries one.
    pub period: Option<f64>,
    pub evaluation_mode: Option<EvaluationMode>,
    /// Public id of the pick this measurement belongs to.
    pub pick_id: String,
    pub waveform_id: WaveformStreamId,
    #[serde(default)]
    pub creation_info: CreationInfo,
}

impl Amplitude {
    pub fn new(
        public_id: &str,
        amplitude_type: &str,
        value: f64,
        pick_id: &str,
        waveform_id: WaveformStreamId,
    ) -> Self {
        Self {
            public_id: public_id.to_string(),
            amplitude_type: amplitude_type.to_string(),
            value,
            period: None,
            evaluation_mode: None,
            pick_id: pick_id.to_string(),
            waveform_id,
            creation_info: CreationInfo::default(),
        }
    }
}
