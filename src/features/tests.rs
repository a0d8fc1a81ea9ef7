//! Feature engine tests.

use super::engine::{fit_transform, transform};
use super::layout::{feature_index, FEATURE_COUNT};
use crate::context::AccessContext;

// 2024-01-01 00:00:00 UTC (a Monday)
const MONDAY: f64 = 1_704_067_200.0;
// 2024-01-06 00:00:00 UTC (a Saturday)
const SATURDAY: f64 = 1_704_499_200.0;

fn ctx(user: &str, location: &str, device: &str, hour: u32) -> AccessContext {
    AccessContext::new(user)
        .with_location(location)
        .with_device(device)
        .with_department("eng")
        .with_hour(hour)
        .with_timestamp(MONDAY + f64::from(hour) * 3600.0)
}

fn col(name: &str) -> usize {
    feature_index(name).unwrap()
}

#[test]
fn test_matrix_shape() {
    let batch = vec![ctx("a", "nyc", "laptop", 9), ctx("b", "sf", "phone", 14)];
    let (x, _) = fit_transform(&batch);
    assert_eq!(x.shape(), &[2, FEATURE_COUNT]);
}

#[test]
fn test_cyclical_hour_adjacency() {
    // Hour 23 and hour 0 must be numerically close on the circle.
    let (x, _) = fit_transform(&vec![
        ctx("a", "nyc", "laptop", 23),
        ctx("a", "nyc", "laptop", 0),
        ctx("a", "nyc", "laptop", 12),
    ]);
    let sin = col("hour_sin");
    let cos = col("hour_cos");
    let d_adjacent = ((x[[0, sin]] - x[[1, sin]]).powi(2)
        + (x[[0, cos]] - x[[1, cos]]).powi(2))
    .sqrt();
    let d_opposite = ((x[[0, sin]] - x[[2, sin]]).powi(2)
        + (x[[0, cos]] - x[[2, cos]]).powi(2))
    .sqrt();
    assert!(d_adjacent < 0.3);
    assert!(d_opposite > 1.5);
}

#[test]
fn test_time_flags() {
    let (x, _) = fit_transform(&vec![
        ctx("a", "nyc", "laptop", 3),  // night
        ctx("a", "nyc", "laptop", 14), // business hours
        ctx("a", "nyc", "laptop", 19), // neither
    ]);
    assert_eq!(x[[0, col("is_night")]], 1.0);
    assert_eq!(x[[0, col("is_business_hours")]], 0.0);
    assert_eq!(x[[1, col("is_night")]], 0.0);
    assert_eq!(x[[1, col("is_business_hours")]], 1.0);
    assert_eq!(x[[2, col("is_night")]], 0.0);
    assert_eq!(x[[2, col("is_business_hours")]], 0.0);
}

#[test]
fn test_weekend_flag() {
    let weekday = ctx("a", "nyc", "laptop", 10);
    let weekend = AccessContext::new("a")
        .with_location("nyc")
        .with_device("laptop")
        .with_hour(10)
        .with_timestamp(SATURDAY + 10.0 * 3600.0);
    let (x, _) = fit_transform(&vec![weekday, weekend]);
    assert_eq!(x[[0, col("is_weekend")]], 0.0);
    assert_eq!(x[[1, col("is_weekend")]], 1.0);
}

#[test]
fn test_batch_frequencies() {
    let (x, _) = fit_transform(&vec![
        ctx("a", "nyc", "laptop", 9),
        ctx("b", "nyc", "laptop", 10),
        ctx("c", "nyc", "phone", 11),
        ctx("d", "sf", "laptop", 12),
    ]);
    let lf = col("location_frequency");
    let df = col("device_frequency");
    assert!((x[[0, lf]] - 0.75).abs() < 1e-12);
    assert!((x[[3, lf]] - 0.25).abs() < 1e-12);
    assert!((x[[2, df]] - 0.25).abs() < 1e-12);
    assert!((x[[0, df]] - 0.75).abs() < 1e-12);
}

#[test]
fn test_client_patterns() {
    // Client "a" roams across two locations and two devices; "b" is stable.
    let (x, _) = fit_transform(&vec![
        ctx("a", "nyc", "laptop", 9),
        ctx("a", "sf", "phone", 21),
        ctx("b", "nyc", "laptop", 10),
        ctx("b", "nyc", "laptop", 10),
    ]);
    assert_eq!(x[[0, col("location_pattern")]], 2.0);
    assert_eq!(x[[0, col("device_pattern")]], 2.0);
    assert!(x[[0, col("hour_pattern")]] > 0.0);
    assert_eq!(x[[2, col("location_pattern")]], 1.0);
    assert_eq!(x[[2, col("device_pattern")]], 1.0);
    assert_eq!(x[[2, col("hour_pattern")]], 0.0);
}

#[test]
fn test_singleton_pattern_defaults() {
    // A lone request has no history: location/device pattern 1, hour std 0.
    let (x, _) = fit_transform(&vec![ctx("a", "nyc", "laptop", 9)]);
    assert_eq!(x[[0, col("location_pattern")]], 1.0);
    assert_eq!(x[[0, col("device_pattern")]], 1.0);
    assert_eq!(x[[0, col("hour_pattern")]], 0.0);
    // Frequencies within a batch of one are trivially 1.0.
    assert_eq!(x[[0, col("location_frequency")]], 1.0);
    assert_eq!(x[[0, col("device_frequency")]], 1.0);
}

#[test]
fn test_inference_reuses_trained_tables() {
    let train = vec![
        ctx("a", "chennai", "laptop", 9),
        ctx("b", "mumbai", "phone", 10),
        ctx("c", "nyc", "tablet", 11),
    ];
    let (x_train, tables) = fit_transform(&train);

    // The same context encodes identically whether scored alone or with
    // unrelated rows next to it - encoders are not refit per call.
    let probe = ctx("a", "mumbai", "phone", 9);
    let alone = transform(&[probe.clone()], &tables);
    let mixed = transform(&[probe, ctx("z", "zurich", "watch", 3)], &tables);
    let le = col("location_encoded");
    let de = col("device_encoded");
    assert_eq!(alone[[0, le]], mixed[[0, le]]);
    assert_eq!(alone[[0, de]], mixed[[0, de]]);
    assert_eq!(alone[[0, le]], x_train[[1, le]]);

    // Unseen categories land one past the trained range.
    assert_eq!(mixed[[1, le]], 3.0);
}

#[test]
fn test_all_values_finite() {
    let (x, _) = fit_transform(&vec![
        ctx("a", "nyc", "laptop", 9),
        ctx("a", "nyc", "laptop", 9),
    ]);
    assert!(x.iter().all(|v| v.is_finite()));
}

#[test]
fn test_empty_batch() {
    let (x, _) = fit_transform(&[]);
    assert_eq!(x.shape(), &[0, FEATURE_COUNT]);
}
