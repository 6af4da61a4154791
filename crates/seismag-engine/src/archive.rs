//! Collaborator seams: the archive the engine reads from, the sink it
//! publishes to, and the per-station setup source.
//!
//! The engine is strictly synchronous; implementations may block but must
//! never re-enter the engine. Archive failures are reported as errors and
//! treated by the engine as empty results.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

use seismag_models::{Amplitude, ObjectKind, Origin, Pick, PublicObject};

/// Per-station key/value parameters resolved from the host configuration.
pub type KeyValues = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive backend unavailable: {0}")]
    Unavailable(String),

    #[error("archive query failed: {0}")]
    Query(String),
}

/// One record of an archive query result.
///
/// `cached` tells whether the backend served the record from its own hot
/// set rather than from storage; `last_modified` is the storage timestamp
/// of the record. Both feed the race-avoidance window for historical
/// origins.
#[derive(Debug, Clone)]
pub struct ArchiveRecord<T> {
    pub object: T,
    pub cached: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

impl<T> ArchiveRecord<T> {
    pub fn fresh(object: T, last_modified: DateTime<Utc>) -> Self {
        Self {
            object,
            cached: false,
            last_modified: Some(last_modified),
        }
    }

    pub fn cached(object: T) -> Self {
        Self {
            object,
            cached: true,
            last_modified: None,
        }
    }
}

/// Read access to previously persisted objects.
pub trait Archive {
    /// All picks referenced by the arrivals of the given origin.
    fn get_picks(&self, origin_id: &str) -> Result<Vec<Pick>, ArchiveError>;

    /// All amplitudes referencing picks of the given origin.
    fn get_amplitudes_for_origin(&self, origin_id: &str) -> Result<Vec<Amplitude>, ArchiveError>;

    /// All origins with an arrival matching the given amplitude's pick.
    fn get_origins_for_amplitude(
        &self,
        amplitude_id: &str,
    ) -> Result<Vec<ArchiveRecord<Origin>>, ArchiveError>;

    /// Fill in the arrivals of a shallow origin.
    fn load_arrivals(&self, origin: &mut Origin) -> Result<bool, ArchiveError>;

    /// Fill in the network magnitudes (with contributions) of an origin.
    fn load_magnitudes(&self, origin: &mut Origin) -> Result<bool, ArchiveError>;

    /// Fill in the station magnitudes of an origin.
    fn load_station_magnitudes(&self, origin: &mut Origin) -> Result<bool, ArchiveError>;

    /// Fetch a single object by kind and public id.
    fn load_object(
        &self,
        kind: ObjectKind,
        public_id: &str,
    ) -> Result<Option<PublicObject>, ArchiveError>;
}

/// Where computed results go.
pub trait Sink {
    /// Publish the origin with its current magnitude state.
    fn dump_origin(&mut self, origin: &Origin);

    /// Account one emitted output object (creation or update).
    fn log_object(&mut self, kind: ObjectKind, time: DateTime<Utc>);
}

/// Per-station setup lookups keyed by (module name, network, station).
pub trait StationSetupSource {
    fn station_setup(&self, module: &str, network: &str, station: &str) -> Option<KeyValues>;
}
