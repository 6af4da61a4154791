//! MLv: local magnitude from the vertical-component amplitude.
//!
//! Uses the Hutton & Boore (1987) attenuation:
//!
//! ```text
//! ML = log10(A) + 1.110 log10(r/100) + 0.00189 (r - 100) + 3.0
//! ```
//!
//! with A the zero-to-peak displacement amplitude in millimetres and r the
//! hypocentral distance in kilometres.

use crate::processor::{MagnitudeProcessor, ProcessorError};

pub const MAGNITUDE_TYPE: &str = "MLv";

const KM_PER_DEGREE: f64 = 111.195;
const MAX_DISTANCE_DEG: f64 = 8.0;
const MAX_DEPTH_KM: f64 = 80.0;

#[derive(Debug, Default)]
pub struct MlvProcessor;

impl MlvProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl MagnitudeProcessor for MlvProcessor {
    fn amplitude_type(&self) -> &str {
        MAGNITUDE_TYPE
    }

    fn magnitude_type(&self) -> &str {
        MAGNITUDE_TYPE
    }

    fn compute_magnitude(
        &self,
        amplitude: f64,
        _period: Option<f64>,
        distance_deg: f64,
        depth_km: f64,
    ) -> Result<f64, ProcessorError> {
        if amplitude <= 0.0 {
            return Err(ProcessorError::AmplitudeOutOfRange);
        }
        if !(0.0..=MAX_DISTANCE_DEG).contains(&distance_deg) {
            return Err(ProcessorError::DistanceOutOfRange);
        }
        if !(0.0..=MAX_DEPTH_KM).contains(&depth_km) {
            return Err(ProcessorError::DepthOutOfRange);
        }

        let epicentral_km = distance_deg * KM_PER_DEGREE;
        let hypocentral_km = (epicentral_km * epicentral_km + depth_km * depth_km).sqrt();
        if hypocentral_km <= 0.0 {
            return Err(ProcessorError::DistanceOutOfRange);
        }

        Ok(amplitude.log10()
            + 1.110 * (hypocentral_km / 100.0).log10()
            + 0.00189 * (hypocentral_km - 100.0)
            + 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_amplitude_at_100km() {
        // 1 mm at 100 km hypocentral distance is ML 3.0 by definition.
        let proc = MlvProcessor::new();
        let distance_deg = 100.0 / KM_PER_DEGREE;
        let mag = proc.compute_magnitude(1.0, None, distance_deg, 0.0).unwrap();
        assert!((mag - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_out_of_range_inputs() {
        let proc = MlvProcessor::new();
        assert_eq!(
            proc.compute_magnitude(0.0, None, 1.0, 10.0),
            Err(ProcessorError::AmplitudeOutOfRange)
        );
        assert_eq!(
            proc.compute_magnitude(1.0, None, 9.0, 10.0),
            Err(ProcessorError::DistanceOutOfRange)
        );
        assert_eq!(
            proc.compute_magnitude(1.0, None, 1.0, 120.0),
            Err(ProcessorError::DepthOutOfRange)
        );
    }

    #[test]
    fn test_no_mw_estimation() {
        let proc = MlvProcessor::new();
        assert_eq!(
            proc.estimate_mw(5.0),
            Err(ProcessorError::MwEstimationNotSupported)
        );
    }
}
