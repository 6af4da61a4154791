//! seismag-models
//!
//! Datamodel for the seismag magnitude engine.
//!
//! This crate is intentionally minimal: it defines the observation records
//! (picks, amplitudes, origins) delivered by external producers and the
//! derived magnitude records the engine attaches to origins. All records
//! are plain values keyed by public id; cross-references between them are
//! expressed as ids, never as pointers, so the engine can own everything
//! in id-keyed tables.

pub mod amplitude;
pub mod identity;
pub mod magnitude;
pub mod object;
pub mod origin;
pub mod pick;

pub use amplitude::Amplitude;
pub use identity::{CreationInfo, EvaluationMode, EvaluationStatus, WaveformStreamId};
pub use magnitude::{NetworkMagnitude, StationMagnitude, StationMagnitudeContribution};
pub use object::{ObjectKind, PublicObject};
pub use origin::{Arrival, Origin};
pub use pick::Pick;
