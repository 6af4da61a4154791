//! Shared context for magnitude upserts.

use chrono::{DateTime, Utc};

use seismag_models::{CreationInfo, ObjectKind};

use crate::archive::Sink;
use crate::cache::NotifierState;

/// Everything an upsert needs besides the origin itself: the wall clock,
/// the identity stamped on created objects, and the (suppressible) output
/// accounting channel.
pub(crate) struct UpsertContext<'a> {
    pub now: DateTime<Utc>,
    pub agency_id: &'a str,
    pub author: &'a str,
    pub custom_public_ids: bool,
    pub sink: &'a mut dyn Sink,
    pub notifier: &'a NotifierState,
}

impl UpsertContext<'_> {
    /// Account one emitted output object, unless notifications are
    /// suppressed (eviction cleanup, archive back-fill).
    pub fn log_output(&mut self, kind: ObjectKind) {
        if self.notifier.is_enabled() {
            self.sink.log_object(kind, self.now);
        }
    }

    /// Provenance for a freshly created magnitude.
    pub fn new_creation_info(&self) -> CreationInfo {
        CreationInfo {
            agency_id: Some(self.agency_id.to_string()),
            author: Some(self.author.to_string()),
            creation_time: Some(self.now),
            modification_time: None,
        }
    }
}
