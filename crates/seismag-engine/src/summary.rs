//! Summary magnitude: a station-count-weighted linear combination of the
//! per-type network magnitudes of an origin.

use tracing::debug;

use seismag_models::{ObjectKind, Origin};

use crate::config::{StationCountPolicy, SummaryConfig};
use crate::context::UpsertContext;
use crate::network::find_or_create_network_magnitude;

/// The value delta below which (at unchanged station count) a recomputed
/// summary is not republished.
const SUMMARY_DELTA_EPSILON: f64 = 1e-4;

/// Recompute the summary magnitude from the origin's network magnitudes.
/// Returns false when disabled, when no contributor qualifies, when the
/// existing summary is frozen, or when the change is below the publication
/// threshold.
pub(crate) fn compute_summary_magnitude(
    origin: &mut Origin,
    config: &SummaryConfig,
    ctx: &mut UpsertContext<'_>,
) -> bool {
    if !config.enabled || config.magnitude_type.is_empty() {
        return false;
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut count = 0usize;

    for netmag in &origin.magnitudes {
        let magnitude_type = &netmag.magnitude_type;
        if *magnitude_type == config.magnitude_type {
            continue;
        }
        if !config.accepts_type(magnitude_type) {
            continue;
        }

        let n = netmag.station_count.unwrap_or(0);
        if n < config.min_station_count {
            continue;
        }

        let (a, b) = config.coefficients_for(magnitude_type);
        let weight = a * n as f64 + b;
        if weight <= 0.0 {
            continue;
        }

        total_weight += weight;
        weighted_sum += weight * netmag.magnitude;
        count = match config.station_count_policy {
            StationCountPolicy::LargestContributor => count.max(n),
            StationCountPolicy::ContributingTotal => count + n,
        };
    }

    if total_weight == 0.0 {
        return false;
    }

    let value = weighted_sum / total_weight;

    let Some((index, new_instance)) =
        find_or_create_network_magnitude(origin, &config.magnitude_type, ctx)
    else {
        debug!(
            origin = %origin.public_id,
            magnitude_type = %config.magnitude_type,
            "[SUMMARY] existing summary magnitude is frozen, skipping"
        );
        return false;
    };

    if !new_instance {
        let existing = &origin.magnitudes[index];
        if (existing.magnitude - value).abs() < SUMMARY_DELTA_EPSILON
            && existing.station_count == Some(count)
        {
            debug!(
                origin = %origin.public_id,
                "[SUMMARY] skipping summary magnitude update, nothing changed"
            );
            return false;
        }
        origin.magnitudes[index].creation_info.modification_time = Some(ctx.now);
        ctx.log_output(ObjectKind::NetworkMagnitude);
    }

    let summary = &mut origin.magnitudes[index];
    summary.magnitude = value;
    summary.method_id = Some("weighted average".to_string());
    summary.station_count = Some(count);

    debug!(
        origin = %origin.public_id,
        magnitude_type = %config.magnitude_type,
        value,
        station_count = count,
        "[SUMMARY] computed"
    );

    true
}
