//! Gradient-boosted regression trees.
//!
//! Both boosted models fit shallow `smartcore` regression trees to
//! pseudo-residuals of a squared-error or softmax cross-entropy loss:
//!
//! - [`BoostedRegressor`] starts from the target mean and adds one tree per
//!   round.
//! - [`BoostedClassifier`] keeps one raw score per class, starts from the
//!   log class priors and adds one tree per class per round.
//!
//! Every tree's contribution is scaled by the learning rate.

use crate::catalog::BoostingParams;
use crate::error::{LearningError, Result};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

fn tree_parameters(params: &BoostingParams) -> DecisionTreeRegressorParameters {
    DecisionTreeRegressorParameters::default().with_max_depth(params.max_depth)
}

fn check_params(params: &BoostingParams) -> Result<()> {
    if params.n_estimators == 0 {
        return Err(LearningError::InvalidConfig(
            "n_estimators must be at least 1".to_string(),
        ));
    }
    if !(params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
        return Err(LearningError::InvalidConfig(
            "learning_rate must be in (0.0, 1.0]".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Regression
// ============================================================================

/// Squared-error gradient boosting.
#[derive(Serialize, Deserialize)]
pub struct BoostedRegressor {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl fmt::Debug for BoostedRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoostedRegressor")
            .field("base_score", &self.base_score)
            .field("learning_rate", &self.learning_rate)
            .field("trees", &self.trees.len())
            .finish()
    }
}

impl BoostedRegressor {
    pub fn fit(x: &DenseMatrix<f64>, y: &[f64], params: &BoostingParams) -> Result<Self> {
        check_params(params)?;
        if y.is_empty() {
            return Err(LearningError::InvalidData(
                "cannot fit on zero rows".to_string(),
            ));
        }

        let base_score = y.iter().sum::<f64>() / y.len() as f64;
        let mut scores = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&scores).map(|(t, s)| t - s).collect();
            let tree = Tree::fit(x, &residuals, tree_parameters(params))?;
            let step = tree.predict(x)?;
            for (score, delta) in scores.iter_mut().zip(step) {
                *score += params.learning_rate * delta;
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, x: &DenseMatrix<f64>, n_rows: usize) -> Result<Vec<f64>> {
        let mut scores = vec![self.base_score; n_rows];
        for tree in &self.trees {
            let step = tree
                .predict(x)
                .map_err(|e| LearningError::InferenceError(e.to_string()))?;
            for (score, delta) in scores.iter_mut().zip(step) {
                *score += self.learning_rate * delta;
            }
        }
        Ok(scores)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Softmax gradient boosting over dense class indices `0..n_classes`.
#[derive(Serialize, Deserialize)]
pub struct BoostedClassifier {
    priors: Vec<f64>,
    learning_rate: f64,
    /// `rounds[r][k]` is the round-`r` tree for class `k`.
    rounds: Vec<Vec<Tree>>,
}

impl fmt::Debug for BoostedClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoostedClassifier")
            .field("n_classes", &self.priors.len())
            .field("learning_rate", &self.learning_rate)
            .field("rounds", &self.rounds.len())
            .finish()
    }
}

impl BoostedClassifier {
    pub fn fit(
        x: &DenseMatrix<f64>,
        labels: &[u32],
        n_classes: usize,
        params: &BoostingParams,
    ) -> Result<Self> {
        check_params(params)?;
        if labels.is_empty() {
            return Err(LearningError::InvalidData(
                "cannot fit on zero rows".to_string(),
            ));
        }
        if n_classes < 2 {
            return Err(LearningError::InvalidData(
                "classification needs at least two classes".to_string(),
            ));
        }

        // Laplace-smoothed so a class missing from this partition keeps a finite prior.
        let mut counts = vec![1.0_f64; n_classes];
        for &label in labels {
            if let Some(count) = counts.get_mut(label as usize) {
                *count += 1.0;
            }
        }
        let total: f64 = counts.iter().sum();
        let priors: Vec<f64> = counts.iter().map(|c| (c / total).ln()).collect();

        let mut scores: Vec<Vec<f64>> = vec![priors.clone(); labels.len()];
        let mut rounds = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let probabilities: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();
            let mut trees = Vec::with_capacity(n_classes);

            for class in 0..n_classes {
                let residuals: Vec<f64> = labels
                    .iter()
                    .zip(&probabilities)
                    .map(|(&label, p)| f64::from(u8::from(label as usize == class)) - p[class])
                    .collect();
                let tree = Tree::fit(x, &residuals, tree_parameters(params))?;
                let step = tree.predict(x)?;
                for (row, delta) in scores.iter_mut().zip(step) {
                    row[class] += params.learning_rate * delta;
                }
                trees.push(tree);
            }

            rounds.push(trees);
        }

        Ok(Self {
            priors,
            learning_rate: params.learning_rate,
            rounds,
        })
    }

    /// Class probabilities, one row per input row.
    pub fn predict_proba(&self, x: &DenseMatrix<f64>, n_rows: usize) -> Result<Vec<Vec<f64>>> {
        let mut scores = vec![self.priors.clone(); n_rows];
        for trees in &self.rounds {
            for (class, tree) in trees.iter().enumerate() {
                let step = tree
                    .predict(x)
                    .map_err(|e| LearningError::InferenceError(e.to_string()))?;
                for (row, delta) in scores.iter_mut().zip(step) {
                    row[class] += self.learning_rate * delta;
                }
            }
        }
        Ok(scores.iter().map(|s| softmax(s)).collect())
    }

    pub fn predict(&self, x: &DenseMatrix<f64>, n_rows: usize) -> Result<Vec<u32>> {
        Ok(self
            .predict_proba(x, n_rows)?
            .iter()
            .map(|p| argmax(p) as u32)
            .collect())
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[Vec<f64>]) -> DenseMatrix<f64> {
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        DenseMatrix::new(rows.len(), rows[0].len(), flat, false)
    }

    fn params(n_estimators: usize, learning_rate: f64) -> BoostingParams {
        BoostingParams {
            n_estimators,
            learning_rate,
            max_depth: 3,
        }
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }

    #[test]
    fn test_regressor_fits_step_function() {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { 5.0 }).collect();
        let x = matrix(&rows);

        let model = BoostedRegressor::fit(&x, &y, &params(50, 0.3)).unwrap();
        let predictions = model.predict(&x, rows.len()).unwrap();

        for (p, t) in predictions.iter().zip(&y) {
            assert!((p - t).abs() < 0.1, "prediction {p} far from {t}");
        }
    }

    #[test]
    fn test_classifier_separates_classes() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let labels: Vec<u32> = (0..60).map(|i| if i < 30 { 0 } else { 1 }).collect();
        let x = matrix(&rows);

        let model = BoostedClassifier::fit(&x, &labels, 2, &params(20, 0.3)).unwrap();
        assert_eq!(model.predict(&x, rows.len()).unwrap(), labels);

        let proba = model.predict_proba(&x, rows.len()).unwrap();
        assert!(proba.iter().all(|p| (p.iter().sum::<f64>() - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_classifier_rejects_single_class() {
        let x = matrix(&[vec![1.0], vec![2.0]]);
        let err = BoostedClassifier::fit(&x, &[0, 0], 1, &params(5, 0.1)).unwrap_err();
        assert!(err.to_string().contains("two classes"));
    }

    #[test]
    fn test_invalid_learning_rate() {
        let x = matrix(&[vec![1.0], vec![2.0]]);
        let err = BoostedRegressor::fit(&x, &[1.0, 2.0], &params(5, 0.0)).unwrap_err();
        assert!(matches!(err, LearningError::InvalidConfig(_)));
    }
}
