//! seismag-engine
//!
//! The computational core of a seismic magnitude service. It consumes
//! picks, amplitudes and origins through three ingress points and keeps
//! each origin's station, network and summary magnitudes current,
//! reacting incrementally to out-of-order arrivals: an amplitude received
//! after its origin retroactively updates that origin, an origin received
//! before its amplitudes consumes them when they arrive.
//!
//! The engine owns all state (an expiring object cache and the pick
//! cross-reference indexes) and talks to the outside world through three
//! seams: [`Archive`] for reads of persisted objects, [`Sink`] for
//! publication, and [`StationSetupSource`] for per-station parameters.
//! Per-type magnitude formulas plug in via [`MagnitudeProcessor`]
//! factories registered in a [`ProcessorRegistry`].

mod context;
mod network;
mod station;
mod summary;

pub mod archive;
pub mod bindings;
pub mod cache;
pub mod config;
pub mod engine;
pub mod processor;
pub mod processors;

pub use archive::{Archive, ArchiveError, ArchiveRecord, KeyValues, Sink, StationSetupSource};
pub use bindings::PickBindings;
pub use cache::{NotifierGuard, NotifierState, ObjectCache};
pub use config::{
    AverageMethod, Coefficients, EngineConfig, StationCountPolicy, SummaryConfig,
};
pub use engine::{MagnitudeEngine, NowFn};
pub use processor::{
    MagnitudeProcessor, ProcessorError, ProcessorFactory, ProcessorRegistry, StationSettings,
};
