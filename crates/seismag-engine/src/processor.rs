//! Magnitude processor plugins and their registry.
//!
//! A processor turns one amplitude observation into one magnitude value of
//! a fixed type, and may additionally estimate a moment magnitude from the
//! aggregated network value. Processors are registered through factory
//! functions keyed by their magnitude type tag; the instantiated registry
//! is indexed by amplitude type for dispatch, and several processors may
//! share an amplitude type.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::archive::KeyValues;

/// Non-fatal reasons a processor refuses an amplitude or an estimation.
#[derive(Debug, Error, PartialEq)]
pub enum ProcessorError {
    #[error("Mw estimation is not supported")]
    MwEstimationNotSupported,

    #[error("amplitude out of range")]
    AmplitudeOutOfRange,

    #[error("distance out of range")]
    DistanceOutOfRange,

    #[error("depth out of range")]
    DepthOutOfRange,

    #[error("period out of range")]
    PeriodOutOfRange,

    #[error("magnitude computation failed: {0}")]
    Failed(String),
}

/// Per-amplitude setup context handed to a processor before computation.
pub struct StationSettings<'a> {
    pub module: &'a str,
    pub network: &'a str,
    pub station: &'a str,
    pub location: &'a str,
    pub channel: &'a str,
    /// Station parameter overrides resolved by (network, station), if any.
    pub parameters: Option<&'a KeyValues>,
}

/// A per-type magnitude computation plugin.
pub trait MagnitudeProcessor {
    /// The amplitude type this processor consumes.
    fn amplitude_type(&self) -> &str;

    /// The magnitude type this processor emits.
    fn magnitude_type(&self) -> &str;

    /// The type tag of the derived moment magnitude.
    fn mw_magnitude_type(&self) -> String {
        format!("Mw({})", self.magnitude_type())
    }

    /// Per-amplitude configuration. Returning false skips this processor
    /// for the amplitude at hand.
    fn setup(&mut self, _settings: &StationSettings<'_>) -> bool {
        true
    }

    /// Compute a station magnitude from an amplitude observation.
    fn compute_magnitude(
        &self,
        amplitude: f64,
        period: Option<f64>,
        distance_deg: f64,
        depth_km: f64,
    ) -> Result<f64, ProcessorError>;

    /// Estimate (Mw, standard error) from an aggregated network magnitude.
    fn estimate_mw(&self, _magnitude: f64) -> Result<(f64, f64), ProcessorError> {
        Err(ProcessorError::MwEstimationNotSupported)
    }
}

/// Factory producing a fresh processor instance.
pub type ProcessorFactory = fn() -> Box<dyn MagnitudeProcessor>;

/// Registry of magnitude processors.
///
/// Factories are registered under the magnitude type tag they produce.
/// `instantiate` intersects the registered set with the operator-enabled
/// set, drops unknown types with a warning and builds the dispatch index.
pub struct ProcessorRegistry {
    factories: BTreeMap<String, ProcessorFactory>,
    by_amplitude_type: BTreeMap<String, Vec<Box<dyn MagnitudeProcessor>>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            by_amplitude_type: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in processors pre-registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::processors::mlv::MAGNITUDE_TYPE, || {
            Box::new(crate::processors::mlv::MlvProcessor::new())
        });
        registry.register(crate::processors::ms::MAGNITUDE_TYPE, || {
            Box::new(crate::processors::ms::MsProcessor::new())
        });
        registry
    }

    /// Register a processor factory under its magnitude type tag.
    pub fn register(&mut self, magnitude_type: &str, factory: ProcessorFactory) {
        self.factories.insert(magnitude_type.to_string(), factory);
    }

    /// All registered magnitude type tags, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// Instantiate processors for the requested types. Unknown types are
    /// discarded with a warning. Returns (accepted, rejected) type tags,
    /// preserving request order.
    pub fn instantiate(&mut self, requested: &[String]) -> (Vec<String>, Vec<String>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for magnitude_type in requested {
            match self.factories.get(magnitude_type) {
                Some(factory) => {
                    let processor = factory();
                    self.by_amplitude_type
                        .entry(processor.amplitude_type().to_string())
                        .or_default()
                        .push(processor);
                    accepted.push(magnitude_type.clone());
                }
                None => {
                    warn!(
                        magnitude_type = %magnitude_type,
                        "[ENGINE] disabling unknown magnitude type"
                    );
                    rejected.push(magnitude_type.clone());
                }
            }
        }
        (accepted, rejected)
    }

    /// Whether any instantiated processor consumes this amplitude type.
    pub fn handles_amplitude_type(&self, amplitude_type: &str) -> bool {
        self.by_amplitude_type
            .get(amplitude_type)
            .is_some_and(|v| !v.is_empty())
    }

    /// All instantiated processors for an amplitude type, for setup and
    /// computation.
    pub fn processors_for_amplitude_mut(
        &mut self,
        amplitude_type: &str,
    ) -> impl Iterator<Item = &mut Box<dyn MagnitudeProcessor>> {
        self.by_amplitude_type
            .get_mut(amplitude_type)
            .into_iter()
            .flatten()
    }

    /// The processor responsible for a network magnitude type, used for Mw
    /// estimation. Lookup runs over the amplitude-type index because for
    /// every shipped processor the two tags coincide.
    pub fn for_network_type(&self, magnitude_type: &str) -> Option<&dyn MagnitudeProcessor> {
        self.by_amplitude_type
            .get(magnitude_type)
            .and_then(|v| v.first())
            .map(|b| b.as_ref())
    }
}
