//! Network magnitude aggregation.
//!
//! Combines the station magnitudes of one type attached to an origin into
//! the network value using the configured estimator, reconciles the
//! contribution references, and derives a moment magnitude when the
//! type's processor supports it.

use tracing::{debug, info};
use uuid::Uuid;

use seismag_models::{NetworkMagnitude, ObjectKind, Origin, StationMagnitudeContribution};

use crate::config::AverageMethod;
use crate::context::UpsertContext;
use crate::processor::ProcessorRegistry;

/// Result of one estimator run. Weights are in input order and feed the
/// contribution records.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AverageResult {
    pub value: f64,
    pub stdev: f64,
    pub weights: Vec<f64>,
    pub method_id: String,
}

/// Trimmed mean: zero-weight `round(n·percent/200)` samples at each end of
/// the sorted sample (at least one sample survives), then take the
/// weighted mean. The standard deviation is the weighted sample deviation
/// normalized by `Σw − 1`.
pub(crate) fn trimmed_mean(values: &[f64], percent: f64) -> (f64, f64, Vec<f64>) {
    let n = values.len();
    debug_assert!(n > 0);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut cut = ((n as f64) * percent / 200.0 + 0.5).floor() as usize;
    cut = cut.min(n.saturating_sub(1) / 2);

    let mut weights = vec![0.0; n];
    for (rank, &index) in order.iter().enumerate() {
        if rank >= cut && rank < n - cut {
            weights[index] = 1.0;
        }
    }

    let weight_sum: f64 = weights.iter().sum();
    let mean: f64 = values
        .iter()
        .zip(&weights)
        .map(|(v, w)| v * w)
        .sum::<f64>()
        / weight_sum;

    let stdev = if weight_sum > 1.0 {
        let squared: f64 = values
            .iter()
            .zip(&weights)
            .map(|(v, w)| w * (v - mean) * (v - mean))
            .sum();
        (squared / (weight_sum - 1.0)).sqrt()
    } else {
        0.0
    };

    (mean, stdev, weights)
}

pub(crate) fn median(values: &[f64]) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Run the configured estimator over the station magnitude values.
/// Returns `None` for an empty sample.
pub(crate) fn average(values: &[f64], method: AverageMethod) -> Option<AverageResult> {
    let n = values.len();
    if n == 0 {
        return None;
    }

    let result = match method {
        AverageMethod::Default => {
            let (percent, method_id) = if n > 3 {
                (25.0, "trimmed mean(25)".to_string())
            } else {
                (0.0, "mean".to_string())
            };
            let (value, stdev, weights) = trimmed_mean(values, percent);
            AverageResult {
                value,
                stdev,
                weights,
                method_id,
            }
        }
        AverageMethod::Mean => {
            let (value, stdev, weights) = trimmed_mean(values, 0.0);
            AverageResult {
                value,
                stdev,
                weights,
                method_id: "mean".to_string(),
            }
        }
        AverageMethod::TrimmedMean(percent) => {
            let (value, stdev, weights) = trimmed_mean(values, percent);
            AverageResult {
                value,
                stdev,
                weights,
                method_id: format!("trimmed mean({percent})"),
            }
        }
        AverageMethod::Median => {
            let value = median(values);
            let stdev = if n > 1 {
                let squared: f64 = values.iter().map(|v| (v - value) * (v - value)).sum();
                (squared / (n as f64 - 1.0)).sqrt()
            } else {
                0.0
            };
            AverageResult {
                value,
                stdev,
                weights: vec![1.0; n],
                method_id: "median".to_string(),
            }
        }
        AverageMethod::TrimmedMedian(percent) => {
            // Trimming weights with median-centred deviations, normalized
            // by the cumulated weight minus one.
            let (_, _, weights) = trimmed_mean(values, percent);
            let value = median(values);
            let weight_sum: f64 = weights.iter().sum();
            let stdev = if weight_sum > 1.0 {
                let squared: f64 = values
                    .iter()
                    .zip(&weights)
                    .map(|(v, w)| w * (v - value) * (v - value))
                    .sum();
                (squared / (weight_sum - 1.0)).sqrt()
            } else {
                0.0
            };
            AverageResult {
                value,
                stdev,
                weights,
                method_id: format!("trimmed median({percent})"),
            }
        }
    };

    Some(result)
}

/// Find the network magnitude of the given type, or create it. Returns
/// `None` when an existing instance is frozen by a set evaluation status;
/// the boolean tells whether the instance is new.
pub(crate) fn find_or_create_network_magnitude(
    origin: &mut Origin,
    magnitude_type: &str,
    ctx: &mut UpsertContext<'_>,
) -> Option<(usize, bool)> {
    if let Some(index) = origin.network_magnitude_index(magnitude_type) {
        if origin.magnitudes[index].is_frozen() {
            return None;
        }
        return Some((index, false));
    }

    let public_id = if ctx.custom_public_ids {
        format!("NetworkMagnitude/{}", Uuid::new_v4())
    } else {
        format!("{}#netMag.{}", origin.public_id, magnitude_type)
    };

    ctx.log_output(ObjectKind::NetworkMagnitude);
    origin.magnitudes.push(NetworkMagnitude {
        public_id,
        origin_id: origin.public_id.clone(),
        magnitude_type: magnitude_type.to_string(),
        magnitude: 0.0,
        uncertainty: None,
        method_id: None,
        station_count: None,
        evaluation_status: None,
        contributions: Vec::new(),
        creation_info: ctx.new_creation_info(),
    });

    Some((origin.magnitudes.len() - 1, true))
}

/// Recompute the network magnitude of `magnitude_type` at `index` from the
/// station magnitudes currently attached to the origin.
pub(crate) fn aggregate_network_magnitude(
    origin: &mut Origin,
    magnitude_type: &str,
    index: usize,
    method: AverageMethod,
    registry: &ProcessorRegistry,
    ctx: &mut UpsertContext<'_>,
) -> bool {
    // Station magnitudes of this type, in enumeration order.
    let members: Vec<(String, f64)> = origin
        .station_magnitudes
        .iter()
        .filter(|m| m.magnitude_type == magnitude_type)
        .map(|m| (m.public_id.clone(), m.magnitude))
        .collect();

    if members.is_empty() {
        return false;
    }

    let values: Vec<f64> = members.iter().map(|(_, v)| *v).collect();
    let Some(result) = average(&values, method) else {
        return false;
    };

    // Reconcile contribution references and count contributing stations.
    let netmag = &mut origin.magnitudes[index];
    let mut station_count = 0usize;
    for ((stamag_id, _), weight) in members.iter().zip(&result.weights) {
        match netmag.contribution_mut(stamag_id) {
            Some(contribution) => {
                if contribution.weight != Some(*weight) {
                    contribution.weight = Some(*weight);
                    info!(
                        station_magnitude = %stamag_id,
                        weight = *weight,
                        "[NETMAG] updating magnitude reference"
                    );
                }
            }
            None => {
                info!(
                    station_magnitude = %stamag_id,
                    "[NETMAG] adding new magnitude reference"
                );
                netmag.contributions.push(StationMagnitudeContribution {
                    station_magnitude_id: stamag_id.clone(),
                    weight: Some(*weight),
                });
            }
        }
        if *weight > 0.0 {
            station_count += 1;
        }
    }

    netmag.method_id = Some(result.method_id.clone());
    netmag.magnitude = result.value;
    netmag.uncertainty = Some(result.stdev);
    netmag.evaluation_status = None;
    netmag.station_count = Some(station_count);

    debug!(
        origin = %origin.public_id,
        magnitude_type = %magnitude_type,
        value = result.value,
        stdev = result.stdev,
        method = %result.method_id,
        station_count,
        "[NETMAG] aggregated"
    );

    // Derive the moment magnitude when the type's processor supports it.
    let Some(processor) = registry.for_network_type(magnitude_type) else {
        return false;
    };
    if let Ok((mw, mw_stderr)) = processor.estimate_mw(result.value) {
        let mw_uncertainty = result.stdev.max(mw_stderr);
        let mw_type = processor.mw_magnitude_type();
        if let Some((mw_index, new_instance)) =
            find_or_create_network_magnitude(origin, &mw_type, ctx)
        {
            let mw_mag = &mut origin.magnitudes[mw_index];
            mw_mag.magnitude = mw;
            mw_mag.uncertainty = Some(mw_uncertainty);
            mw_mag.station_count = Some(station_count);
            mw_mag.evaluation_status = None;
            if !new_instance {
                mw_mag.creation_info.modification_time = Some(ctx.now);
                ctx.log_output(ObjectKind::NetworkMagnitude);
            }
        }
    }

    true
}
