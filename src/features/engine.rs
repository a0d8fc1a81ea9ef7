//! Feature Engine
//!
//! Pure transform: a batch of access contexts -> the fixed-order feature
//! matrix. Two entry points:
//!
//! - `fit_transform` fits the categorical encoding tables on the batch
//!   (training only) and transforms it.
//! - `transform` reuses stored tables (inference).
//!
//! Per-client pattern features and empirical frequencies are computed
//! within the batch in both modes. A batch of one has no history, so the
//! pattern columns take the documented singleton defaults (1, 1, 0):
//! no history means "not yet flagged as varying", not an error.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use chrono::{Datelike, TimeZone, Utc};
use ndarray::Array2;

use crate::context::AccessContext;
use super::encoders::{EncoderTables, LabelTable};
use super::layout::FEATURE_COUNT;

/// Fixed prior frequency for an entity absent from the batch maps.
const UNKNOWN_FREQUENCY: f64 = 0.1;

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Fit encoders on the batch and transform it. Training path only.
pub fn fit_transform(contexts: &[AccessContext]) -> (Array2<f64>, EncoderTables) {
    let tables = EncoderTables {
        location: LabelTable::fit(contexts.iter().map(|c| c.location.as_str())),
        device: LabelTable::fit(contexts.iter().map(|c| c.device.as_str())),
        department: LabelTable::fit(contexts.iter().map(|c| c.department.as_str())),
    };
    let matrix = transform(contexts, &tables);
    (matrix, tables)
}

/// Transform a batch with stored encoding tables. Inference path.
pub fn transform(contexts: &[AccessContext], tables: &EncoderTables) -> Array2<f64> {
    let n = contexts.len();
    let mut matrix = Array2::<f64>::zeros((n, FEATURE_COUNT));
    if n == 0 {
        return matrix;
    }

    let hours: Vec<f64> = contexts.iter().map(|c| f64::from(c.hour_of_day())).collect();

    // Empirical frequencies within the batch.
    let location_freq = frequency_map(contexts.iter().map(|c| c.location.as_str()), n);
    let device_freq = frequency_map(contexts.iter().map(|c| c.device.as_str()), n);

    // Per-client pattern stats across the batch.
    let patterns = client_patterns(contexts, &hours);

    for (i, (ctx, &hour)) in contexts.iter().zip(hours.iter()).enumerate() {
        let angle = 2.0 * PI * hour / 24.0;
        matrix[[i, 0]] = angle.sin();
        matrix[[i, 1]] = angle.cos();
        matrix[[i, 2]] = if is_weekend(ctx.epoch_seconds()) { 1.0 } else { 0.0 };
        matrix[[i, 3]] = if hour <= 6.0 || hour >= 22.0 { 1.0 } else { 0.0 };
        matrix[[i, 4]] = if (9.0..=17.0).contains(&hour) { 1.0 } else { 0.0 };

        matrix[[i, 5]] = tables.location.encode(&ctx.location);
        matrix[[i, 6]] = tables.device.encode(&ctx.device);
        matrix[[i, 7]] = tables.department.encode(&ctx.department);

        matrix[[i, 8]] = location_freq
            .get(ctx.location.as_str())
            .copied()
            .unwrap_or(UNKNOWN_FREQUENCY);
        matrix[[i, 9]] = device_freq
            .get(ctx.device.as_str())
            .copied()
            .unwrap_or(UNKNOWN_FREQUENCY);

        let pattern = patterns
            .get(ctx.client_id())
            .copied()
            .unwrap_or(ClientPattern::SINGLETON);
        matrix[[i, 10]] = pattern.locations;
        matrix[[i, 11]] = pattern.devices;
        matrix[[i, 12]] = pattern.hour_std;
    }

    // Whatever slipped through as non-finite is filled with 0.
    matrix.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
    matrix
}

// ============================================================================
// BATCH STATISTICS
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct ClientPattern {
    locations: f64,
    devices: f64,
    hour_std: f64,
}

impl ClientPattern {
    /// Singleton-inference fallback: one location, one device, no spread.
    const SINGLETON: ClientPattern = ClientPattern {
        locations: 1.0,
        devices: 1.0,
        hour_std: 0.0,
    };
}

fn frequency_map<'a, I: IntoIterator<Item = &'a str>>(
    values: I,
    n: usize,
) -> HashMap<&'a str, f64> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(k, c)| (k, c as f64 / n as f64))
        .collect()
}

fn client_patterns<'a>(
    contexts: &'a [AccessContext],
    hours: &[f64],
) -> HashMap<&'a str, ClientPattern> {
    if contexts.len() == 1 {
        // No history available for a lone request.
        let mut map = HashMap::new();
        map.insert(contexts[0].client_id(), ClientPattern::SINGLETON);
        return map;
    }

    struct Acc<'a> {
        locations: HashSet<&'a str>,
        devices: HashSet<&'a str>,
        hours: Vec<f64>,
    }

    let mut groups: HashMap<&str, Acc> = HashMap::new();
    for (ctx, &hour) in contexts.iter().zip(hours.iter()) {
        let acc = groups.entry(ctx.client_id()).or_insert_with(|| Acc {
            locations: HashSet::new(),
            devices: HashSet::new(),
            hours: Vec::new(),
        });
        acc.locations.insert(ctx.location.as_str());
        acc.devices.insert(ctx.device.as_str());
        acc.hours.push(hour);
    }

    groups
        .into_iter()
        .map(|(client, acc)| {
            (
                client,
                ClientPattern {
                    locations: acc.locations.len() as f64,
                    devices: acc.devices.len() as f64,
                    hour_std: sample_std(&acc.hours),
                },
            )
        })
        .collect()
}

/// Sample standard deviation (n-1 denominator); 0 for fewer than two points,
/// matching the NaN -> 0 fill of the source pipeline.
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

fn is_weekend(epoch_seconds: f64) -> bool {
    match Utc.timestamp_opt(epoch_seconds as i64, 0).single() {
        Some(dt) => dt.weekday().num_days_from_monday() >= 5,
        None => false,
    }
}
