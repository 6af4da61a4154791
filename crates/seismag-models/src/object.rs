//! The tagged variant stored by the expiring public-object cache.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amplitude::Amplitude;
use crate::origin::Origin;
use crate::pick::Pick;

/// Discriminates the object classes the engine caches and exchanges with
/// the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Pick,
    Amplitude,
    Origin,
    StationMagnitude,
    NetworkMagnitude,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Pick => "pick",
            ObjectKind::Amplitude => "amplitude",
            ObjectKind::Origin => "origin",
            ObjectKind::StationMagnitude => "station-magnitude",
            ObjectKind::NetworkMagnitude => "network-magnitude",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A polymorphic public object: pick, amplitude or origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PublicObject {
    Pick(Pick),
    Amplitude(Amplitude),
    Origin(Origin),
}

impl PublicObject {
    pub fn public_id(&self) -> &str {
        match self {
            PublicObject::Pick(p) => &p.public_id,
            PublicObject::Amplitude(a) => &a.public_id,
            PublicObject::Origin(o) => &o.public_id,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            PublicObject::Pick(_) => ObjectKind::Pick,
            PublicObject::Amplitude(_) => ObjectKind::Amplitude,
            PublicObject::Origin(_) => ObjectKind::Origin,
        }
    }

    pub fn as_pick(&self) -> Option<&Pick> {
        match self {
            PublicObject::Pick(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_amplitude(&self) -> Option<&Amplitude> {
        match self {
            PublicObject::Amplitude(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_origin(&self) -> Option<&Origin> {
        match self {
            PublicObject::Origin(o) => Some(o),
            _ => None,
        }
    }

    pub fn into_origin(self) -> Option<Origin> {
        match self {
            PublicObject::Origin(o) => Some(o),
            _ => None,
        }
    }
}
