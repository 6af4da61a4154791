//! The magnitude engine.
//!
//! Orchestration of the expiring object cache, the cross-reference
//! indexes and the per-type processors behind the three ingress points
//! `feed_pick`, `feed_amplitude` and `feed_origin`.
//!
//! ## Invariants
//!
//! - Per origin feed: station magnitudes are upserted before their network
//!   magnitude is aggregated; the summary magnitude is computed last.
//! - A network magnitude with a set evaluation status is frozen and never
//!   rewritten.
//! - No error escapes the ingress functions; each reports success as a
//!   boolean and degraded modes are logged.
//!
//! The engine is single-threaded; archive and sink calls are synchronous
//! and never re-enter it.

use chrono::{DateTime, Utc};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::{debug, error, info, warn};

use seismag_models::{
    Amplitude, CreationInfo, EvaluationMode, EvaluationStatus, ObjectKind, Origin, Pick,
    PublicObject,
};

use crate::archive::{Archive, Sink, StationSetupSource};
use crate::bindings::PickBindings;
use crate::cache::{NotifierState, ObjectCache};
use crate::config::EngineConfig;
use crate::context::UpsertContext;
use crate::network;
use crate::processor::ProcessorRegistry;
use crate::station::{self, StationParameterCache};
use crate::summary;

/// Wall clock source; injectable for deterministic tests.
pub type NowFn = Box<dyn Fn() -> DateTime<Utc>>;

macro_rules! upsert_ctx {
    ($self:ident, $now:expr) => {
        UpsertContext {
            now: $now,
            agency_id: &$self.config.agency_id,
            author: &$self.config.author,
            custom_public_ids: $self.config.custom_public_ids,
            sink: $self.sink.as_mut(),
            notifier: &$self.notifier,
        }
    };
}

/// Amplitude priority: manual beats automatic; within one mode the later
/// creation time wins; without any priority information the reference
/// (first seen) stays.
fn has_higher_priority(candidate: &Amplitude, reference: &Amplitude) -> bool {
    let candidate_mode = candidate
        .evaluation_mode
        .unwrap_or(EvaluationMode::Automatic);
    let reference_mode = reference
        .evaluation_mode
        .unwrap_or(EvaluationMode::Automatic);

    if candidate_mode != reference_mode {
        return candidate_mode == EvaluationMode::Manual;
    }

    match (
        candidate.creation_info.creation_time,
        reference.creation_info.creation_time,
    ) {
        (Some(candidate_time), Some(reference_time)) => candidate_time > reference_time,
        _ => false,
    }
}

/// The incremental magnitude engine.
pub struct MagnitudeEngine {
    config: EngineConfig,
    registry: ProcessorRegistry,
    cache: ObjectCache,
    bindings: PickBindings,
    station_parameters: StationParameterCache,
    archive: Option<Box<dyn Archive>>,
    setup_source: Option<Box<dyn StationSetupSource>>,
    sink: Box<dyn Sink>,
    notifier: Rc<NotifierState>,
    now_fn: NowFn,
    archive_accesses: u64,
}

impl MagnitudeEngine {
    /// Build an engine from a configuration, a processor registry and the
    /// output sink. The registry is instantiated against the configured
    /// magnitude types; unknown types are dropped with a warning.
    pub fn new(config: EngineConfig, mut registry: ProcessorRegistry, sink: Box<dyn Sink>) -> Self {
        let (accepted, rejected) = registry.instantiate(&config.magnitude_types);

        info!(
            expiry_secs = config.cache_expiry_secs,
            "[ENGINE] setting object expiry"
        );

        let cache = ObjectCache::new(config.cache_expiry());
        let engine = Self {
            config,
            registry,
            cache,
            bindings: PickBindings::new(),
            station_parameters: StationParameterCache::new(),
            archive: None,
            setup_source: None,
            sink,
            notifier: NotifierState::new(),
            now_fn: Box::new(Utc::now),
            archive_accesses: 0,
        };
        engine.log_init_report(&accepted, &rejected);
        engine
    }

    pub fn with_archive(mut self, archive: Box<dyn Archive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_setup_source(mut self, setup_source: Box<dyn StationSetupSource>) -> Self {
        self.setup_source = Some(setup_source);
        self
    }

    /// Replace the wall clock, for deterministic tests.
    pub fn with_now_fn(mut self, now_fn: NowFn) -> Self {
        self.now_fn = now_fn;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, public_id: &str) -> bool {
        self.cache.contains(public_id)
    }

    pub fn cached_origin(&self, public_id: &str) -> Option<&Origin> {
        self.cache.get(public_id).and_then(|o| o.as_origin())
    }

    /// The origins bound to a pick; `None` when the pick was never seen.
    pub fn origins_for_pick(&self, pick_id: &str) -> Option<&[String]> {
        self.bindings.origins_for_pick(pick_id)
    }

    pub fn amplitudes_for_pick(&self, pick_id: &str) -> &[String] {
        self.bindings.amplitudes_for_pick(pick_id)
    }

    pub fn archive_accesses(&self) -> u64 {
        self.archive_accesses
    }

    /// Log the lifetime statistics. The engine stays usable afterwards.
    pub fn shutdown(&self) {
        info!(
            archive_accesses = self.archive_accesses,
            "[ENGINE] shutting down magnitude engine"
        );
    }

    // ---------------------------------------------------------------------
    // Ingress
    // ---------------------------------------------------------------------

    /// Validate and cache a pick, seeding its (empty) origin binding.
    pub fn feed_pick(&mut self, pick: Pick) -> bool {
        let now = self.now();
        self.sweep_cache(now);

        if self.is_agency_blocked(&pick.creation_info) {
            debug!(
                pick = %pick.public_id,
                agency = %pick.creation_info.agency(),
                "[ENGINE] skipping pick: agency blocked"
            );
            return false;
        }

        let pick_id = pick.public_id.clone();
        self.cache.feed(PublicObject::Pick(pick), now);
        self.bindings.create_binding(&pick_id);
        debug!(
            pick = %pick_id,
            cache_size = self.cache.len(),
            "[CACHE] inserted pick"
        );
        true
    }

    /// Ingest an amplitude and retroactively update every origin bound to
    /// its pick, pulling historical origins from the archive when the
    /// binding is unknown.
    pub fn feed_amplitude(&mut self, amplitude: Amplitude, update: bool) -> bool {
        let now = self.now();
        self.sweep_cache(now);

        if self.is_agency_blocked(&amplitude.creation_info) {
            return false;
        }

        if !self
            .registry
            .handles_amplitude_type(&amplitude.amplitude_type)
        {
            info!(
                amplitude_type = %amplitude.amplitude_type,
                "[ENGINE] ignoring unknown amplitude type"
            );
            return false;
        }

        let Some(amplitude) = self.store_amplitude(amplitude, update, now) else {
            return false;
        };
        let pick_id = amplitude.pick_id.clone();

        let mut bound: Option<Vec<String>> = self
            .bindings
            .origins_for_pick(&pick_id)
            .map(|ids| ids.to_vec());

        if bound.is_none() && self.archive.is_some() {
            self.fetch_historical_origins(&amplitude, &pick_id, now);
            bound = self
                .bindings
                .origins_for_pick(&pick_id)
                .map(|ids| ids.to_vec());
        }

        let Some(origin_ids) = bound else {
            debug!(pick = %pick_id, "[ENGINE] no historical origin to update");
            return true;
        };

        for origin_id in origin_ids {
            let Some((object, inserted_at)) = self.cache.take(&origin_id) else {
                continue;
            };
            let mut origin = match object {
                PublicObject::Origin(origin) => origin,
                other => {
                    self.cache.put_back(other, inserted_at);
                    continue;
                }
            };

            let updated = self.update_origin_from_amplitude(&mut origin, &amplitude, update, now);
            if updated {
                self.sink.dump_origin(&origin);
            }
            self.cache.put_back(PublicObject::Origin(origin), inserted_at);
        }

        true
    }

    /// Entry point for a new or updated origin: complete it, bind its
    /// picks, compute station, network and summary magnitudes, and dump
    /// the result.
    pub fn feed_origin(&mut self, origin: Origin) -> bool {
        let now = self.now();
        self.sweep_cache(now);

        if self.is_agency_blocked(&origin.creation_info) {
            debug!(
                origin = %origin.public_id,
                agency = %origin.creation_info.agency(),
                "[ENGINE] skipping origin: agency blocked"
            );
            return false;
        }

        let origin_id = origin.public_id.clone();

        // A duplicate public id adopts the cached instance: it may carry
        // deep-loaded children the incoming copy lacks.
        let duplicate = self
            .cache
            .get(&origin_id)
            .is_some_and(|o| o.kind() == ObjectKind::Origin);
        if duplicate {
            return self.process_cached_origin(&origin_id, now);
        }

        if origin.evaluation_status == Some(EvaluationStatus::Rejected) {
            info!(origin = %origin_id, "[ENGINE] ignoring rejected origin");
            return false;
        }

        let mut origin = origin;
        if origin.arrivals.is_empty() {
            self.archive_load_arrivals(&mut origin);
        }
        if origin.arrivals.is_empty() {
            info!(origin = %origin_id, "[ENGINE] ignoring incomplete origin");
            return false;
        }
        if origin.magnitudes.is_empty() {
            self.archive_load_magnitudes(&mut origin);
        }
        if origin.station_magnitudes.is_empty() {
            self.archive_load_station_magnitudes(&mut origin);
        }

        self.cache.feed(PublicObject::Origin(origin), now);
        debug!(
            origin = %origin_id,
            cache_size = self.cache.len(),
            "[CACHE] inserted origin"
        );

        self.process_cached_origin(&origin_id, now)
    }

    // ---------------------------------------------------------------------
    // Origin pipeline
    // ---------------------------------------------------------------------

    fn process_cached_origin(&mut self, origin_id: &str, now: DateTime<Utc>) -> bool {
        let Some((object, inserted_at)) = self.cache.take(origin_id) else {
            return false;
        };
        let mut origin = match object {
            PublicObject::Origin(origin) => origin,
            other => {
                self.cache.put_back(other, inserted_at);
                return false;
            }
        };

        let ok = self.process_origin(&mut origin, now);
        self.cache.put_back(PublicObject::Origin(origin), inserted_at);
        ok
    }

    fn process_origin(&mut self, origin: &mut Origin, now: DateTime<Utc>) -> bool {
        info!(origin = %origin.public_id, "[ENGINE] working on origin");

        self.retrieve_missing_objects(origin, now);

        let Some(depth_km) = origin.depth_km else {
            warn!(origin = %origin.public_id, "[ENGINE] depth not set, ignoring origin");
            return false;
        };

        // Group valid arrivals by abstract stream, keeping the earliest
        // pick per group. Every arrival is bound, including invalid ones:
        // a late amplitude for a disabled pick must not need an archive
        // query to find this origin. The pick itself stays cached so its
        // expiry drives the cleanup of the binding.
        let mut pick_streams: BTreeMap<String, (Pick, f64)> = BTreeMap::new();
        for (index, arrival) in origin.arrivals.iter().enumerate() {
            let Some(pick) = self.resolve_pick(&arrival.pick_id, now) else {
                warn!(pick = %arrival.pick_id, "[ENGINE] pick not found");
                continue;
            };

            self.bindings.bind(&arrival.pick_id, &origin.public_id);

            if !arrival.is_valid(self.config.minimum_arrival_weight) {
                continue;
            }

            debug!(arrival = index, pick = %arrival.pick_id, "[ENGINE] processing arrival");

            let Some(distance) = arrival.distance else {
                warn!(pick = %arrival.pick_id, "[ENGINE] arrival has no distance, skipping");
                continue;
            };

            match pick_streams.entry(pick.waveform_id.abstract_stream()) {
                Entry::Occupied(mut slot) => {
                    if slot.get().0.time < pick.time {
                        info!(pick = %pick.public_id, "[ENGINE] already using earlier pick for stream");
                    } else {
                        slot.insert((pick, distance));
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert((pick, distance));
                }
            }
        }

        let mut magnitude_types: BTreeSet<String> = BTreeSet::new();

        for (pick, distance) in pick_streams.values() {
            info!(pick = %pick.public_id, "[ENGINE] using pick");

            // Keep one amplitude per type: the highest-priority one.
            let amplitudes = self.resolved_amplitudes_for_pick(&pick.public_id);
            let mut selected: BTreeMap<&str, &Amplitude> = BTreeMap::new();
            for amplitude in &amplitudes {
                match selected.entry(amplitude.amplitude_type.as_str()) {
                    Entry::Vacant(slot) => {
                        slot.insert(amplitude);
                    }
                    Entry::Occupied(mut slot) => {
                        if has_higher_priority(amplitude, slot.get()) {
                            slot.insert(amplitude);
                        }
                    }
                }
            }

            for amplitude in selected.values() {
                let entries = station::compute_station_magnitudes(
                    &mut self.registry,
                    &mut self.station_parameters,
                    self.setup_source.as_deref(),
                    &self.config.module_name,
                    amplitude,
                    &origin.public_id,
                    *distance,
                    depth_km,
                );

                for entry in entries {
                    let mut ctx = upsert_ctx!(self, now);
                    if let Some(index) = station::upsert_station_magnitude(
                        origin,
                        &amplitude.waveform_id,
                        &entry.magnitude_type,
                        entry.value,
                        false,
                        &mut ctx,
                    ) {
                        origin.station_magnitudes[index].amplitude_id =
                            Some(amplitude.public_id.clone());
                        magnitude_types.insert(entry.magnitude_type);
                    }
                }
            }
        }

        for magnitude_type in &magnitude_types {
            let method = self.config.average_method_for(magnitude_type);
            let mut ctx = upsert_ctx!(self, now);
            let Some((index, new_instance)) =
                network::find_or_create_network_magnitude(origin, magnitude_type, &mut ctx)
            else {
                continue;
            };
            network::aggregate_network_magnitude(
                origin,
                magnitude_type,
                index,
                method,
                &self.registry,
                &mut ctx,
            );
            if !new_instance {
                origin.magnitudes[index].creation_info.modification_time = Some(now);
                ctx.log_output(ObjectKind::NetworkMagnitude);
            }
        }

        {
            let mut ctx = upsert_ctx!(self, now);
            summary::compute_summary_magnitude(origin, &self.config.summary, &mut ctx);
        }

        self.sink.dump_origin(origin);
        true
    }

    /// Fetch uncached picks (and their amplitudes) for the origin's valid
    /// arrivals from the archive. A pick that is uncached but already
    /// amplitude-bound is skipped: the binding proves it was seen once.
    fn retrieve_missing_objects(&mut self, origin: &Origin, now: DateTime<Utc>) -> usize {
        let mut missing: BTreeSet<String> = BTreeSet::new();
        for arrival in &origin.arrivals {
            if !arrival.is_valid(self.config.minimum_arrival_weight) {
                continue;
            }
            if self.cache.contains(&arrival.pick_id) {
                continue;
            }
            if self.bindings.has_amplitudes(&arrival.pick_id) {
                warn!(
                    pick = %arrival.pick_id,
                    "[ENGINE] pick not cached but associated to amplitudes"
                );
                continue;
            }
            missing.insert(arrival.pick_id.clone());
        }

        if missing.is_empty() {
            return 0;
        }
        if self.archive.is_none() {
            warn!("[ARCHIVE] archive not configured, cannot retrieve missing picks");
            return 0;
        }

        info!(
            count = missing.len(),
            origin = %origin.public_id,
            "[ARCHIVE] retrieving missing picks"
        );

        let mut retrieved = 0usize;

        self.archive_accesses += 1;
        let picks = match self
            .archive
            .as_ref()
            .unwrap()
            .get_picks(&origin.public_id)
        {
            Ok(picks) => picks,
            Err(e) => {
                warn!(error = %e, "[ARCHIVE] pick query failed");
                Vec::new()
            }
        };
        for pick in picks {
            if !missing.contains(&pick.public_id) {
                continue;
            }
            info!(pick = %pick.public_id, "[ARCHIVE] got pick");
            if self.feed_pick(pick) {
                retrieved += 1;
            }
        }

        self.archive_accesses += 1;
        let amplitudes = match self
            .archive
            .as_ref()
            .unwrap()
            .get_amplitudes_for_origin(&origin.public_id)
        {
            Ok(amplitudes) => amplitudes,
            Err(e) => {
                warn!(error = %e, "[ARCHIVE] amplitude query failed");
                Vec::new()
            }
        };
        for amplitude in amplitudes {
            if !missing.contains(&amplitude.pick_id) {
                continue;
            }
            info!(amplitude = %amplitude.public_id, "[ARCHIVE] got amplitude");
            // Stored without retroactive update: this origin is being
            // processed right now.
            if self.store_amplitude(amplitude, false, now).is_some() {
                retrieved += 1;
            }
        }

        info!(count = retrieved, "[ARCHIVE] retrieved missing objects");
        retrieved
    }

    // ---------------------------------------------------------------------
    // Retroactive update
    // ---------------------------------------------------------------------

    /// Query the archive for origins referencing the amplitude, insert the
    /// usable ones into the cache and append them to the pick's binding.
    /// Runs with notifications suppressed.
    fn fetch_historical_origins(
        &mut self,
        amplitude: &Amplitude,
        pick_id: &str,
        now: DateTime<Utc>,
    ) {
        info!(
            pick = %pick_id,
            archive_accesses = self.archive_accesses,
            "[ARCHIVE] fetching origins for pick"
        );
        self.archive_accesses += 1;

        // Mark the pick as queried so further amplitudes skip the archive.
        self.bindings.create_binding(pick_id);

        let _guard = self.notifier.suppress();

        let records = match self
            .archive
            .as_ref()
            .unwrap()
            .get_origins_for_amplitude(&amplitude.public_id)
        {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "[ARCHIVE] origin query failed");
                Vec::new()
            }
        };

        let mut reload: Vec<String> = Vec::new();
        for record in records {
            let origin_id = record.object.public_id.clone();

            if !record.cached && !self.cache.contains(&origin_id) {
                // An origin written to storage within half the cache
                // lifetime should still arrive through messaging;
                // processing it now would race that update.
                if let Some(last_modified) = record.last_modified {
                    if now - last_modified < self.config.cache_expiry() / 2 {
                        debug!(
                            origin = %origin_id,
                            "[ARCHIVE] ignoring origin, expecting its arrival via messaging soon"
                        );
                        continue;
                    }
                }
                self.cache.feed(PublicObject::Origin(record.object), now);
                reload.push(origin_id.clone());
                info!(
                    origin = %origin_id,
                    cache_size = self.cache.len(),
                    "[ARCHIVE] stored historical origin in cache"
                );
            } else if !self.cache.contains(&origin_id) {
                self.cache.feed(PublicObject::Origin(record.object), now);
            }

            self.bindings.bind(pick_id, &origin_id);
        }

        // Deep-reload the origins taken from storage.
        for origin_id in reload {
            let Some((object, inserted_at)) = self.cache.take(&origin_id) else {
                continue;
            };
            let mut origin = match object {
                PublicObject::Origin(origin) => origin,
                other => {
                    self.cache.put_back(other, inserted_at);
                    continue;
                }
            };
            self.archive_load_arrivals(&mut origin);
            self.archive_load_magnitudes(&mut origin);
            self.archive_load_station_magnitudes(&mut origin);
            self.cache.put_back(PublicObject::Origin(origin), inserted_at);
        }
    }

    /// Locate the arrival matching the amplitude under the "first P" rule
    /// and re-run the station → network → summary pipeline for it.
    fn update_origin_from_amplitude(
        &mut self,
        origin: &mut Origin,
        amplitude: &Amplitude,
        update: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if self.is_agency_blocked(&origin.creation_info) {
            debug!(
                origin = %origin.public_id,
                agency = %origin.creation_info.agency(),
                "[ENGINE] skipping historic origin: agency blocked"
            );
            return false;
        }

        // "First P" rule: the matching arrival must reference the
        // amplitude's pick, and that pick must be the earliest valid one
        // among the station's arrivals.
        let mut first_pick: Option<Pick> = None;
        let mut matched: Option<usize> = None;
        let mut another_first = false;
        let mut invalid_weight = false;

        for (index, arrival) in origin.arrivals.iter().enumerate() {
            let Some(pick) = self.resolve_pick(&arrival.pick_id, now) else {
                warn!(
                    pick = %arrival.pick_id,
                    origin = %origin.public_id,
                    arrival = index,
                    "[ENGINE] pick not found, skipping arrival"
                );
                continue;
            };

            if amplitude.waveform_id.network != pick.waveform_id.network
                || amplitude.waveform_id.station != pick.waveform_id.station
                || amplitude.waveform_id.location != pick.waveform_id.location
            {
                continue;
            }

            if !arrival.is_valid(self.config.minimum_arrival_weight) {
                invalid_weight = true;
                continue;
            }

            match &first_pick {
                None => first_pick = Some(pick.clone()),
                Some(first) => {
                    if pick.time < first.time {
                        another_first = true;
                        matched = None;
                        first_pick = Some(pick.clone());
                    }
                }
            }

            if amplitude.pick_id == arrival.pick_id {
                let first = first_pick.as_ref().unwrap();
                if first.public_id == pick.public_id {
                    matched = Some(index);
                } else {
                    warn!(
                        pick = %arrival.pick_id,
                        first_pick = %first.public_id,
                        "[ENGINE] amplitude pick outranked by another first P arrival"
                    );
                }
            }
        }

        let Some(arrival_index) = matched else {
            if another_first {
                info!(
                    amplitude = %amplitude.public_id,
                    pick = %amplitude.pick_id,
                    "[ENGINE] another first P arrival exists for this station"
                );
            } else if !invalid_weight {
                warn!(
                    pick = %amplitude.pick_id,
                    origin = %origin.public_id,
                    "[ENGINE] no matching arrival found for amplitude"
                );
            }
            return false;
        };

        let (Some(distance), Some(depth_km)) =
            (origin.arrivals[arrival_index].distance, origin.depth_km)
        else {
            error!(
                origin = %origin.public_id,
                "[ENGINE] matched arrival lacks distance or origin lacks depth"
            );
            return false;
        };

        let entries = station::compute_station_magnitudes(
            &mut self.registry,
            &mut self.station_parameters,
            self.setup_source.as_deref(),
            &self.config.module_name,
            amplitude,
            &origin.public_id,
            distance,
            depth_km,
        );

        let mut updated = false;
        for entry in entries {
            let mut ctx = upsert_ctx!(self, now);
            let Some(index) = station::upsert_station_magnitude(
                origin,
                &amplitude.waveform_id,
                &entry.magnitude_type,
                entry.value,
                update,
                &mut ctx,
            ) else {
                continue;
            };
            origin.station_magnitudes[index].amplitude_id = Some(amplitude.public_id.clone());

            let magnitude_type = entry.magnitude_type;
            let method = self.config.average_method_for(&magnitude_type);
            let Some((net_index, new_instance)) =
                network::find_or_create_network_magnitude(origin, &magnitude_type, &mut ctx)
            else {
                continue;
            };
            network::aggregate_network_magnitude(
                origin,
                &magnitude_type,
                net_index,
                method,
                &self.registry,
                &mut ctx,
            );
            if !new_instance {
                origin.magnitudes[net_index].creation_info.modification_time = Some(now);
                ctx.log_output(ObjectKind::NetworkMagnitude);
            }
            info!(
                origin = %origin.public_id,
                magnitude_type = %magnitude_type,
                created = new_instance,
                "[ENGINE] network magnitude refreshed from late amplitude"
            );
            updated = true;
        }

        if updated {
            let mut ctx = upsert_ctx!(self, now);
            summary::compute_summary_magnitude(origin, &self.config.summary, &mut ctx);
        }

        updated
    }

    // ---------------------------------------------------------------------
    // Cache plumbing
    // ---------------------------------------------------------------------

    fn now(&self) -> DateTime<Utc> {
        (self.now_fn)()
    }

    fn is_agency_blocked(&self, info: &CreationInfo) -> bool {
        self.config.blocked_agencies.contains(info.agency())
    }

    /// Evict expired objects and purge every index entry referencing them.
    /// Cleanup runs with notifications suppressed.
    fn sweep_cache(&mut self, now: DateTime<Utc>) {
        let evicted = self.cache.expire(now);
        if evicted.is_empty() {
            return;
        }
        let _guard = self.notifier.suppress();
        for object in &evicted {
            debug!(
                id = %object.public_id(),
                kind = %object.kind(),
                "[CACHE] removed object from cache"
            );
            self.bindings.purge(object);
        }
    }

    /// Typed cache lookup with archive fallback; a pick loaded from the
    /// archive is inserted with the current timestamp.
    fn resolve_pick(&mut self, pick_id: &str, now: DateTime<Utc>) -> Option<Pick> {
        if let Some(object) = self.cache.get(pick_id) {
            return object.as_pick().cloned();
        }

        let archive = self.archive.as_ref()?;
        self.archive_accesses += 1;
        match archive.load_object(ObjectKind::Pick, pick_id) {
            Ok(Some(PublicObject::Pick(pick))) => {
                self.cache.feed(PublicObject::Pick(pick.clone()), now);
                Some(pick)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(pick = %pick_id, error = %e, "[ARCHIVE] pick lookup failed");
                None
            }
        }
    }

    /// The cached amplitudes recorded for a pick, in insertion order.
    fn resolved_amplitudes_for_pick(&self, pick_id: &str) -> Vec<Amplitude> {
        self.bindings
            .amplitudes_for_pick(pick_id)
            .iter()
            .filter_map(|id| self.cache.get(id).and_then(|o| o.as_amplitude()).cloned())
            .collect()
    }

    /// Record an amplitude in the cache and the pick index. Duplicates by
    /// public id are rejected unless `update` is set, in which case the
    /// cached instance is refreshed. The referenced pick is kept cached so
    /// its eviction drives cleanup of the index entry.
    fn store_amplitude(
        &mut self,
        amplitude: Amplitude,
        update: bool,
        now: DateTime<Utc>,
    ) -> Option<Amplitude> {
        if amplitude.pick_id.is_empty() {
            return None;
        }

        if self
            .bindings
            .contains_amplitude(&amplitude.pick_id, &amplitude.public_id)
        {
            if !update {
                warn!(
                    amplitude = %amplitude.public_id,
                    "[CACHE] duplicate amplitude ignored"
                );
                return None;
            }
            self.cache
                .feed(PublicObject::Amplitude(amplitude.clone()), now);
            return Some(amplitude);
        }

        self.bindings
            .add_amplitude(&amplitude.pick_id, &amplitude.public_id);
        self.cache
            .feed(PublicObject::Amplitude(amplitude.clone()), now);
        self.resolve_pick(&amplitude.pick_id, now);

        debug!(
            amplitude = %amplitude.public_id,
            pick = %amplitude.pick_id,
            amplitude_entries = self.bindings.amplitude_entry_count(),
            "[CACHE] stored amplitude"
        );
        Some(amplitude)
    }

    fn archive_load_arrivals(&mut self, origin: &mut Origin) {
        let Some(archive) = self.archive.as_ref() else {
            return;
        };
        self.archive_accesses += 1;
        if let Err(e) = archive.load_arrivals(origin) {
            warn!(
                origin = %origin.public_id,
                error = %e,
                "[ARCHIVE] loading arrivals failed"
            );
        }
    }

    fn archive_load_magnitudes(&mut self, origin: &mut Origin) {
        let Some(archive) = self.archive.as_ref() else {
            return;
        };
        self.archive_accesses += 1;
        if let Err(e) = archive.load_magnitudes(origin) {
            warn!(
                origin = %origin.public_id,
                error = %e,
                "[ARCHIVE] loading magnitudes failed"
            );
        }
    }

    fn archive_load_station_magnitudes(&mut self, origin: &mut Origin) {
        let Some(archive) = self.archive.as_ref() else {
            return;
        };
        self.archive_accesses += 1;
        if let Err(e) = archive.load_station_magnitudes(origin) {
            warn!(
                origin = %origin.public_id,
                error = %e,
                "[ARCHIVE] loading station magnitudes failed"
            );
        }
    }

    fn log_init_report(&self, accepted: &[String], rejected: &[String]) {
        let mut type_lines = String::new();
        let mut average_lines = String::new();
        let mut summary_lines = String::new();

        let summary_state = |magnitude_type: &str| {
            if self.config.summary.accepts_type(magnitude_type) {
                "OK"
            } else {
                "Disabled"
            }
        };

        for magnitude_type in accepted {
            type_lines.push_str(&format!(" * {magnitude_type}: OK\n"));
            average_lines.push_str(&format!(
                " * {magnitude_type}: {}\n",
                self.config.average_method_for(magnitude_type)
            ));
            summary_lines.push_str(&format!(
                " * {magnitude_type}: {}\n",
                summary_state(magnitude_type)
            ));

            if let Some(processor) = self.registry.for_network_type(magnitude_type) {
                if processor.estimate_mw(6.0).is_ok() {
                    let mw_type = processor.mw_magnitude_type();
                    type_lines.push_str(&format!(" * {mw_type}: OK\n"));
                    summary_lines.push_str(&format!(" * {mw_type}: {}\n", summary_state(&mw_type)));
                }
            }
        }
        for magnitude_type in rejected {
            type_lines.push_str(&format!(" * {magnitude_type}: Disabled (unknown type)\n"));
        }

        info!(types = %type_lines.trim_end(), "[ENGINE] magnitudes to calculate");
        info!(methods = %average_lines.trim_end(), "[ENGINE] average methods");
        info!(
            enabled = self.config.summary.enabled,
            "[ENGINE] summary magnitude"
        );
        info!(types = %summary_lines.trim_end(), "[ENGINE] summary magnitude types");

        let (a, b) = self.config.summary.effective_defaults();
        info!(a, b, "[ENGINE] default summary coefficients");
        for (magnitude_type, coefficients) in &self.config.summary.coefficients {
            info!(
                magnitude_type = %magnitude_type,
                a = ?coefficients.a,
                b = ?coefficients.b,
                "[ENGINE] summary coefficient override"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use seismag_models::WaveformStreamId;

    fn amplitude(mode: Option<EvaluationMode>, created_secs: Option<i64>) -> Amplitude {
        let mut a = Amplitude::new(
            "Amplitude/1",
            "MLv",
            1.0,
            "Pick/1",
            WaveformStreamId::new("GE", "MORC", "", "BHZ"),
        );
        a.evaluation_mode = mode;
        a.creation_info.creation_time =
            created_secs.map(|s| Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap());
        a
    }

    #[test]
    fn test_manual_beats_automatic_regardless_of_age() {
        let manual_old = amplitude(Some(EvaluationMode::Manual), Some(0));
        let auto_new = amplitude(Some(EvaluationMode::Automatic), Some(100));

        assert!(has_higher_priority(&manual_old, &auto_new));
        assert!(!has_higher_priority(&auto_new, &manual_old));
    }

    #[test]
    fn test_later_creation_time_wins_within_mode() {
        let older = amplitude(None, Some(0));
        let newer = amplitude(None, Some(100));

        assert!(has_higher_priority(&newer, &older));
        assert!(!has_higher_priority(&older, &newer));
    }

    #[test]
    fn test_no_priority_information_keeps_reference() {
        let first = amplitude(None, None);
        let second = amplitude(None, None);
        assert!(!has_higher_priority(&second, &first));
    }
}
