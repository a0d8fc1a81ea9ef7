//! Offline training and evaluation.
//!
//! Splits a labeled dataset, fits the ensemble on the training slice and
//! evaluates on the held-out slice. The threshold that maximizes F1 on the
//! held-out slice is stamped onto the model as `trained_threshold`, which
//! the pipeline prefers over its configured default.

use serde::{Deserialize, Serialize};

use crate::context::AccessContext;
use crate::dataset::{train_test_split, AccessEvent, LABEL_ANOMALY};
use crate::error::{Error, Result};
use crate::model::{EnsembleParams, TrainedEnsemble};

const TRAIN_FRACTION: f64 = 0.8;

/// Candidate thresholds for the F1 sweep.
const THRESHOLD_GRID: std::ops::Range<u32> = 1..20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rank-based AUC on the held-out slice; 0.5 when it has one class.
    pub roc_auc: f64,
    /// Accuracy at the selected threshold.
    pub accuracy: f64,
    pub best_f1: f64,
    pub trained_threshold: f64,
}

/// Train on 80% of `events`, evaluate on the remaining 20%.
pub fn train_and_evaluate(
    events: Vec<AccessEvent>,
    params: &EnsembleParams,
    seed: u64,
) -> Result<(TrainedEnsemble, TrainReport)> {
    let (train, test) = train_test_split(events, TRAIN_FRACTION, seed);
    if train.is_empty() || test.is_empty() {
        return Err(Error::Training(
            "dataset too small to split for evaluation".to_string(),
        ));
    }

    let mut model = TrainedEnsemble::fit(&train, params)?;

    let contexts: Vec<AccessContext> = test.iter().map(|e| e.context.clone()).collect();
    let scores = model.score(&contexts);
    // Internal convention: 1.0 = anomaly.
    let labels: Vec<f64> = test
        .iter()
        .map(|e| if e.label_or_normal() == LABEL_ANOMALY { 1.0 } else { 0.0 })
        .collect();

    let roc_auc = rank_auc(&scores, &labels);
    let (trained_threshold, best_f1) = best_f1_threshold(&scores, &labels);
    let accuracy = accuracy_at(&scores, &labels, trained_threshold);

    model.trained_threshold = Some(trained_threshold);

    let report = TrainReport {
        train_rows: train.len(),
        test_rows: test.len(),
        roc_auc,
        accuracy,
        best_f1,
        trained_threshold,
    };
    log::info!(
        "trained on {} rows, held out {}: auc={:.3} f1={:.3} threshold={:.2}",
        report.train_rows,
        report.test_rows,
        report.roc_auc,
        report.best_f1,
        report.trained_threshold
    );
    Ok((model, report))
}

/// Mann-Whitney AUC via average ranks, so tied scores contribute fairly.
fn rank_auc(scores: &[f64], labels: &[f64]) -> f64 {
    let positives = labels.iter().filter(|&&l| l >= 0.5).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0_f64; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank across the tie group.
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l >= 0.5)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n)
}

fn accuracy_at(scores: &[f64], labels: &[f64], threshold: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let correct = scores
        .iter()
        .zip(labels)
        .filter(|(&s, &l)| (s >= threshold) == (l >= 0.5))
        .count();
    correct as f64 / scores.len() as f64
}

fn f1_at(scores: &[f64], labels: &[f64], threshold: f64) -> f64 {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (&s, &l) in scores.iter().zip(labels) {
        let predicted = s >= threshold;
        let actual = l >= 0.5;
        match (predicted, actual) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
    }
    if tp == 0 {
        return 0.0;
    }
    let precision = tp as f64 / (tp + fp) as f64;
    let recall = tp as f64 / (tp + fn_) as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Sweep a fixed grid of thresholds; return the best by F1, falling back
/// to 0.5 when nothing separates the classes.
fn best_f1_threshold(scores: &[f64], labels: &[f64]) -> (f64, f64) {
    let mut best = (0.5, f1_at(scores, labels, 0.5));
    for step in THRESHOLD_GRID {
        let threshold = step as f64 * 0.05;
        let f1 = f1_at(scores, labels, threshold);
        if f1 > best.1 {
            best = (threshold, f1);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{synthetic, SyntheticConfig};

    #[test]
    fn test_rank_auc_perfect_separation() {
        let scores = [0.1, 0.2, 0.8, 0.9];
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert!((rank_auc(&scores, &labels) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rank_auc_reversed_separation() {
        let scores = [0.9, 0.8, 0.2, 0.1];
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert!(rank_auc(&scores, &labels).abs() < 1e-12);
    }

    #[test]
    fn test_rank_auc_all_ties_is_half() {
        let scores = [0.5, 0.5, 0.5, 0.5];
        let labels = [0.0, 1.0, 0.0, 1.0];
        assert!((rank_auc(&scores, &labels) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rank_auc_single_class_is_half() {
        assert_eq!(rank_auc(&[0.1, 0.9], &[0.0, 0.0]), 0.5);
    }

    #[test]
    fn test_f1_sweep_picks_separating_threshold() {
        let scores = [0.1, 0.15, 0.2, 0.7, 0.8, 0.9];
        let labels = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let (threshold, f1) = best_f1_threshold(&scores, &labels);
        assert!((f1 - 1.0).abs() < 1e-12);
        assert!(threshold > 0.2 && threshold <= 0.7);
    }

    #[test]
    fn test_train_and_evaluate_end_to_end() {
        let events = synthetic::generate(&SyntheticConfig {
            users: 10,
            events_per_user: 40,
            anomaly_rate: 0.15,
            seed: 11,
        });
        let (model, report) =
            train_and_evaluate(events, &EnsembleParams::fast(), 11).unwrap();

        assert_eq!(report.train_rows, 320);
        assert_eq!(report.test_rows, 80);
        assert!(report.roc_auc > 0.7, "auc {} too low", report.roc_auc);
        assert_eq!(model.trained_threshold, Some(report.trained_threshold));
        assert!((0.0..=1.0).contains(&report.trained_threshold));
    }

    #[test]
    fn test_tiny_dataset_rejected() {
        let events = synthetic::generate(&SyntheticConfig {
            users: 1,
            events_per_user: 1,
            ..Default::default()
        });
        assert!(train_and_evaluate(events, &EnsembleParams::fast(), 1).is_err());
    }
}
