//! Cross-reference indexes between picks, amplitudes and origins.
//!
//! Two process-wide maps, both keyed by pick public id and both holding
//! public ids only:
//!
//! - pick → amplitudes, in insertion order, no duplicate amplitude ids;
//! - pick → origins that reference the pick through an arrival.
//!
//! An absent origin binding means "pick never seen"; an empty one means
//! "seen, but no origins yet". The distinction prevents repeated archive
//! queries for the same pick.
//!
//! Entries referencing an object must be removed when that object leaves
//! the cache; `purge` is invoked from the engine's eviction path.

use std::collections::HashMap;

use seismag_models::PublicObject;

#[derive(Debug, Default)]
pub struct PickBindings {
    amplitudes: HashMap<String, Vec<String>>,
    origins: HashMap<String, Vec<String>>,
}

impl PickBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Establish an (empty) origin binding for a pick, marking it as seen.
    pub fn create_binding(&mut self, pick_id: &str) {
        self.origins.entry(pick_id.to_string()).or_default();
    }

    /// Append an origin to a pick's binding. Does nothing when the pick
    /// has no binding yet: an unseen pick must not accumulate origins the
    /// retroactive updater would then trust as complete.
    pub fn bind(&mut self, pick_id: &str, origin_id: &str) {
        match self.origins.get_mut(pick_id) {
            Some(list) => {
                if !list.iter().any(|o| o == origin_id) {
                    list.push(origin_id.to_string());
                }
            }
            None => {
                tracing::debug!(pick = %pick_id, "[INDEX] no complete binding for pick yet");
            }
        }
    }

    /// The origins bound to a pick; `None` when the pick was never seen.
    pub fn origins_for_pick(&self, pick_id: &str) -> Option<&[String]> {
        self.origins.get(pick_id).map(|v| v.as_slice())
    }

    /// The amplitude ids recorded for a pick, in insertion order.
    pub fn amplitudes_for_pick(&self, pick_id: &str) -> &[String] {
        self.amplitudes.get(pick_id).map_or(&[], |v| v.as_slice())
    }

    pub fn has_amplitudes(&self, pick_id: &str) -> bool {
        self.amplitudes.get(pick_id).is_some_and(|v| !v.is_empty())
    }

    pub fn contains_amplitude(&self, pick_id: &str, amplitude_id: &str) -> bool {
        self.amplitudes
            .get(pick_id)
            .is_some_and(|v| v.iter().any(|a| a == amplitude_id))
    }

    /// Record an amplitude under its pick. Returns false on duplicates.
    pub fn add_amplitude(&mut self, pick_id: &str, amplitude_id: &str) -> bool {
        let list = self.amplitudes.entry(pick_id.to_string()).or_default();
        if list.iter().any(|a| a == amplitude_id) {
            return false;
        }
        list.push(amplitude_id.to_string());
        true
    }

    pub fn amplitude_entry_count(&self) -> usize {
        self.amplitudes.values().map(|v| v.len()).sum()
    }

    pub fn binding_count(&self) -> usize {
        self.origins.len()
    }

    /// Drop every index entry referencing an evicted object.
    pub fn purge(&mut self, evicted: &PublicObject) {
        match evicted {
            PublicObject::Pick(p) => {
                self.amplitudes.remove(&p.public_id);
                self.origins.remove(&p.public_id);
            }
            PublicObject::Amplitude(a) => {
                if let Some(list) = self.amplitudes.get_mut(&a.pick_id) {
                    list.retain(|id| id != &a.public_id);
                }
            }
            PublicObject::Origin(o) => {
                for list in self.origins.values_mut() {
                    list.retain(|id| id != &o.public_id);
                }
            }
        }
    }
}
