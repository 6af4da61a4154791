//! Built-in magnitude processors.
//!
//! Two small reference implementations that exercise the registry, the Mw
//! derivation path and the summary presets end to end. Hosts with their
//! own calibrations register replacement factories under the same type
//! tags.

pub mod mlv;
pub mod ms;
