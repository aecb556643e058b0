//! Held-out evaluation metrics.
//!
//! Classification is scored with accuracy and support-weighted F1, regression
//! with mean squared error and R².

use std::collections::BTreeSet;

/// Fraction of exact matches. `0.0` for empty input.
#[must_use]
pub fn accuracy(y_true: &[u32], y_pred: &[u32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// F1 averaged over classes, weighted by each class's support in `y_true`.
///
/// A class with no true or predicted positives contributes an F1 of zero.
/// Classes that only appear in `y_pred` have zero support and zero weight.
#[must_use]
pub fn weighted_f1(y_true: &[u32], y_pred: &[u32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let classes: BTreeSet<u32> = y_true.iter().chain(y_pred).copied().collect();
    let mut weighted_sum = 0.0;

    for class in classes {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t == class, p == class) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }

        let support = tp + fn_;
        if support == 0 {
            continue;
        }
        let denominator = 2 * tp + fp + fn_;
        let f1 = if denominator == 0 {
            0.0
        } else {
            2.0 * tp as f64 / denominator as f64
        };
        weighted_sum += f1 * support as f64;
    }

    weighted_sum / y_true.len() as f64
}

/// Mean squared error. `0.0` for empty input.
#[must_use]
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    sum / y_true.len() as f64
}

/// Coefficient of determination.
///
/// For a constant `y_true` the score is `1.0` when every prediction is exact
/// and `0.0` otherwise.
#[must_use]
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
