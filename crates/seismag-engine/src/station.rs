//! Station magnitude computation and upsert.

use std::collections::HashMap;
use tracing::{debug, error, info};
use uuid::Uuid;

use seismag_models::{Amplitude, ObjectKind, Origin, StationMagnitude, WaveformStreamId};

use crate::archive::{KeyValues, StationSetupSource};
use crate::context::UpsertContext;
use crate::processor::{ProcessorRegistry, StationSettings};

/// One emission of a processor: the magnitude type it produces and the
/// computed value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MagnitudeEntry {
    pub magnitude_type: String,
    pub value: f64,
}

/// Station parameter resolutions cached under `NET.STA`; negative lookups
/// are cached too.
pub(crate) type StationParameterCache = HashMap<String, Option<KeyValues>>;

/// Run every processor matching the amplitude's type and collect the
/// emitted (type, value) pairs. Setup failures and non-OK computations
/// skip the processor.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compute_station_magnitudes(
    registry: &mut ProcessorRegistry,
    parameters: &mut StationParameterCache,
    setup_source: Option<&dyn StationSetupSource>,
    module_name: &str,
    amplitude: &Amplitude,
    origin_id: &str,
    distance_deg: f64,
    depth_km: f64,
) -> Vec<MagnitudeEntry> {
    let wfid = &amplitude.waveform_id;
    let station_id = wfid.station_id();
    let params = parameters
        .entry(station_id)
        .or_insert_with(|| {
            setup_source.and_then(|s| s.station_setup(module_name, &wfid.network, &wfid.station))
        })
        .as_ref();

    let settings = StationSettings {
        module: module_name,
        network: &wfid.network,
        station: &wfid.station,
        location: &wfid.location,
        channel: &wfid.channel,
        parameters: params,
    };

    let mut entries = Vec::new();
    for processor in registry.processors_for_amplitude_mut(&amplitude.amplitude_type) {
        if !processor.setup(&settings) {
            debug!(
                amplitude = %amplitude.public_id,
                station = %settings.station,
                "[STAMAG] processor setup failed, skipping"
            );
            continue;
        }

        match processor.compute_magnitude(
            amplitude.value,
            amplitude.period,
            distance_deg,
            depth_km,
        ) {
            Ok(value) => {
                debug!(
                    origin = %origin_id,
                    amplitude_type = %amplitude.amplitude_type,
                    distance = distance_deg,
                    depth = depth_km,
                    station = %format!("{}.{}", wfid.network, wfid.station),
                    magnitude = value,
                    "[STAMAG] computed"
                );
                entries.push(MagnitudeEntry {
                    magnitude_type: processor.magnitude_type().to_string(),
                    value,
                });
            }
            Err(status) => {
                debug!(
                    amplitude = %amplitude.public_id,
                    amplitude_type = %amplitude.amplitude_type,
                    status = %status,
                    "[STAMAG] computation skipped"
                );
            }
        }
    }

    entries
}

/// Create or update the station magnitude keyed by (waveform stream id,
/// type) under the origin.
///
/// With `update == false` an existing magnitude is left untouched and
/// `None` is returned. Returns the index of the written magnitude in the
/// origin's table.
pub(crate) fn upsert_station_magnitude(
    origin: &mut Origin,
    waveform_id: &WaveformStreamId,
    magnitude_type: &str,
    value: f64,
    update: bool,
    ctx: &mut UpsertContext<'_>,
) -> Option<usize> {
    if let Some(index) = origin.station_magnitude_index(waveform_id, magnitude_type) {
        if !update {
            return None;
        }

        let origin_id = origin.public_id.clone();
        let magnitude = &mut origin.station_magnitudes[index];
        magnitude.creation_info.modification_time = Some(ctx.now);
        ctx.log_output(ObjectKind::StationMagnitude);

        if magnitude.origin_id != origin_id {
            // Should never happen: children live in per-origin tables.
            error!(
                origin = %origin_id,
                parent = %magnitude.origin_id,
                station_magnitude = %magnitude.public_id,
                "[STAMAG] re-homing station magnitude parented to a different origin"
            );
            magnitude.origin_id = origin_id;
        }

        magnitude.magnitude = value;
        return Some(index);
    }

    let public_id = if ctx.custom_public_ids {
        format!("StationMagnitude/{}", Uuid::new_v4())
    } else {
        format!(
            "{}#staMag.{}#{}.{}",
            origin.public_id, magnitude_type, waveform_id.network, waveform_id.station
        )
    };

    ctx.log_output(ObjectKind::StationMagnitude);
    info!(
        station_magnitude = %public_id,
        magnitude_type = %magnitude_type,
        origin = %origin.public_id,
        "[STAMAG] created new station magnitude"
    );

    origin.station_magnitudes.push(StationMagnitude {
        public_id,
        origin_id: origin.public_id.clone(),
        magnitude_type: magnitude_type.to_string(),
        magnitude: value,
        waveform_id: waveform_id.clone(),
        amplitude_id: None,
        creation_info: ctx.new_creation_info(),
    });

    Some(origin.station_magnitudes.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Sink;
    use crate::cache::NotifierState;
    use chrono::{TimeZone, Utc};
    use seismag_models::Origin;

    #[derive(Default)]
    struct CountingSink {
        logged: usize,
    }

    impl Sink for CountingSink {
        fn dump_origin(&mut self, _origin: &Origin) {}

        fn log_object(&mut self, _kind: ObjectKind, _time: chrono::DateTime<Utc>) {
            self.logged += 1;
        }
    }

    #[test]
    fn test_upsert_insert_only_skips_existing() {
        let mut origin = Origin::new("Origin/1");
        let wfid = WaveformStreamId::new("GE", "MORC", "", "BHZ");
        let notifier = NotifierState::new();
        let mut sink = CountingSink::default();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let mut ctx = UpsertContext {
            now,
            agency_id: "test",
            author: "test",
            custom_public_ids: false,
            sink: &mut sink,
            notifier: &notifier,
        };

        let index = upsert_station_magnitude(&mut origin, &wfid, "MLv", 3.1, false, &mut ctx);
        assert_eq!(index, Some(0));
        let created = &origin.station_magnitudes[0];
        assert_eq!(created.public_id, "Origin/1#staMag.MLv#GE.MORC");
        assert_eq!(created.creation_info.creation_time, Some(now));
        assert_eq!(created.creation_info.agency_id.as_deref(), Some("test"));

        // Insert-only: the second attempt must not overwrite.
        let skipped = upsert_station_magnitude(&mut origin, &wfid, "MLv", 9.9, false, &mut ctx);
        assert_eq!(skipped, None);
        assert_eq!(origin.station_magnitudes[0].magnitude, 3.1);

        let updated = upsert_station_magnitude(&mut origin, &wfid, "MLv", 3.5, true, &mut ctx);
        assert_eq!(updated, Some(0));
        assert_eq!(origin.station_magnitudes[0].magnitude, 3.5);
        assert_eq!(
            origin.station_magnitudes[0].creation_info.modification_time,
            Some(now)
        );
        assert_eq!(origin.station_magnitudes.len(), 1);
        assert_eq!(sink.logged, 2);
    }

    #[test]
    fn test_suppressed_notifications_skip_output_log() {
        let mut origin = Origin::new("Origin/1");
        let wfid = WaveformStreamId::new("GE", "MORC", "", "BHZ");
        let notifier = NotifierState::new();
        let mut sink = CountingSink::default();
        let _guard = notifier.suppress();

        let mut ctx = UpsertContext {
            now: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            agency_id: "test",
            author: "test",
            custom_public_ids: false,
            sink: &mut sink,
            notifier: &notifier,
        };

        upsert_station_magnitude(&mut origin, &wfid, "MLv", 3.1, false, &mut ctx);
        assert_eq!(sink.logged, 0);
    }
}
