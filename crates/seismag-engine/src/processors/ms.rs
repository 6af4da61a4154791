//! Ms: teleseismic surface-wave magnitude.
//!
//! The IASPEI Prague formula
//!
//! ```text
//! Ms = log10(A/T) + 1.66 log10(D) + 3.3
//! ```
//!
//! with A the vertical surface-wave displacement amplitude in micrometres,
//! T the period in seconds (nominally 20 s) and D the epicentral distance
//! in degrees. Mw is estimated with the Scordilis (2006) regression
//! `Mw = 0.67 Ms + 2.07` (standard error 0.17), so this type feeds the
//! moment-magnitude branch of the aggregator.

use crate::processor::{MagnitudeProcessor, ProcessorError};

pub const MAGNITUDE_TYPE: &str = "Ms";

const MIN_DISTANCE_DEG: f64 = 20.0;
const MAX_DISTANCE_DEG: f64 = 160.0;
const MAX_DEPTH_KM: f64 = 60.0;
const DEFAULT_PERIOD_S: f64 = 20.0;
const MIN_PERIOD_S: f64 = 10.0;
const MAX_PERIOD_S: f64 = 30.0;

#[derive(Debug, Default)]
pub struct MsProcessor;

impl MsProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl MagnitudeProcessor for MsProcessor {
    fn amplitude_type(&self) -> &str {
        MAGNITUDE_TYPE
    }

    fn magnitude_type(&self) -> &str {
        MAGNITUDE_TYPE
    }

    fn compute_magnitude(
        &self,
        amplitude: f64,
        period: Option<f64>,
        distance_deg: f64,
        depth_km: f64,
    ) -> Result<f64, ProcessorError> {
        if amplitude <= 0.0 {
            return Err(ProcessorError::AmplitudeOutOfRange);
        }
        if !(MIN_DISTANCE_DEG..=MAX_DISTANCE_DEG).contains(&distance_deg) {
            return Err(ProcessorError::DistanceOutOfRange);
        }
        if !(0.0..=MAX_DEPTH_KM).contains(&depth_km) {
            return Err(ProcessorError::DepthOutOfRange);
        }

        let period = period.unwrap_or(DEFAULT_PERIOD_S);
        if !(MIN_PERIOD_S..=MAX_PERIOD_S).contains(&period) {
            return Err(ProcessorError::PeriodOutOfRange);
        }

        Ok((amplitude / period).log10() + 1.66 * distance_deg.log10() + 3.3)
    }

    fn estimate_mw(&self, magnitude: f64) -> Result<(f64, f64), ProcessorError> {
        Ok((0.67 * magnitude + 2.07, 0.17))
    }
}
