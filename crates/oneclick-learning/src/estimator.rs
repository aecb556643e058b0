//! A catalog model together with its fitted state.
//!
//! [`Estimator`] is what [`catalog::get_model`](crate::catalog::get_model)
//! hands out: hyperparameters plus, once [`fit`](Estimator::fit) succeeds,
//! the fitted `smartcore` (or boosted) model. Each estimator owns its state;
//! nothing is shared between instances.

use crate::boosting::{BoostedClassifier, BoostedRegressor};
use crate::catalog::{ForestParams, Hyperparameters, ModelKind};
use crate::error::{LearningError, Result};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{
    LinearRegression, LinearRegressionParameters, LinearRegressionSolverName,
};
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use std::fmt;

/// Training targets, already encoded.
#[derive(Debug, Clone, Copy)]
pub enum Targets<'a> {
    /// Dense class indices in `0..n_classes`.
    Classes { labels: &'a [u32], n_classes: usize },
    Values(&'a [f64]),
}

impl Targets<'_> {
    fn len(&self) -> usize {
        match self {
            Targets::Classes { labels, .. } => labels.len(),
            Targets::Values(values) => values.len(),
        }
    }
}

/// Raw estimator output.
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    /// Dense class indices.
    Classes(Vec<u32>),
    Values(Vec<f64>),
}

impl Predictions {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Predictions::Classes(c) => c.len(),
            Predictions::Values(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A row-major feature matrix ready for fitting or prediction.
pub struct FeatureMatrix {
    matrix: DenseMatrix<f64>,
    rows: usize,
    cols: usize,
}

impl FeatureMatrix {
    /// Build from row-major rows.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidData`] when there are no rows, no
    /// columns, or the rows have different lengths.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(LearningError::InvalidData("feature matrix has no rows".to_string()));
        };
        let cols = first.len();
        if cols == 0 {
            return Err(LearningError::InvalidData(
                "no usable feature columns".to_string(),
            ));
        }
        if rows.iter().any(|row| row.len() != cols) {
            return Err(LearningError::InvalidData(
                "feature rows have different lengths".to_string(),
            ));
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Ok(Self {
            matrix: DenseMatrix::new(rows.len(), cols, flat, false),
            rows: rows.len(),
            cols,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }
}

impl fmt::Debug for FeatureMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

/// Fitted model state, one variant per [`ModelKind`].
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub(crate) enum FittedModel {
    LogisticRegression(LogisticRegression<f64, u32, DenseMatrix<f64>, Vec<u32>>),
    RandomForestClassifier(RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>),
    XgboostClassifier(BoostedClassifier),
    LinearRegression(LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>),
    RandomForestRegressor(RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>),
    GradientBoostingRegressor(BoostedRegressor),
}

/// A catalog model: hyperparameters and, once fitted, the trained state.
#[derive(Serialize, Deserialize)]
pub struct Estimator {
    hyperparameters: Hyperparameters,
    fitted: Option<FittedModel>,
}

impl fmt::Debug for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimator")
            .field("kind", &self.kind())
            .field("hyperparameters", &self.hyperparameters)
            .field("fitted", &self.is_fitted())
            .finish()
    }
}

impl Estimator {
    /// An unfitted estimator. The kind follows from the hyperparameters.
    #[must_use]
    pub fn new(hyperparameters: Hyperparameters) -> Self {
        Self {
            hyperparameters,
            fitted: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.hyperparameters.kind()
    }

    #[must_use]
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Mutable access to the hyperparameters. Changing them does not
    /// invalidate an existing fit; call [`fit`](Self::fit) again.
    pub fn hyperparameters_mut(&mut self) -> &mut Hyperparameters {
        &mut self.hyperparameters
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit on `x` and `targets`, replacing any previous fit.
    ///
    /// `seed` drives the bootstrap sampling of the forests.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidData`] when the target kind does not match
    ///   the model or lengths disagree
    /// - [`LearningError::TrainingFailed`] when the underlying solver fails
    pub fn fit(&mut self, x: &FeatureMatrix, targets: Targets<'_>, seed: u64) -> Result<()> {
        if targets.len() != x.rows() {
            return Err(LearningError::InvalidData(format!(
                "{} feature rows but {} targets",
                x.rows(),
                targets.len()
            )));
        }

        let fitted = match (&self.hyperparameters, targets) {
            (Hyperparameters::LogisticRegression(p), Targets::Classes { labels, .. }) => {
                let y = labels.to_vec();
                let params = LogisticRegressionParameters::default().with_alpha(p.alpha);
                FittedModel::LogisticRegression(LogisticRegression::fit(&x.matrix, &y, params)?)
            }
            (Hyperparameters::RandomForestClassifier(p), Targets::Classes { labels, .. }) => {
                let y = labels.to_vec();
                FittedModel::RandomForestClassifier(RandomForestClassifier::fit(
                    &x.matrix,
                    &y,
                    forest_classifier_parameters(p, seed),
                )?)
            }
            (Hyperparameters::XgboostClassifier(p), Targets::Classes { labels, n_classes }) => {
                FittedModel::XgboostClassifier(BoostedClassifier::fit(
                    &x.matrix, labels, n_classes, p,
                )?)
            }
            (Hyperparameters::LinearRegression, Targets::Values(values)) => {
                let y = values.to_vec();
                let params = LinearRegressionParameters::default()
                    .with_solver(LinearRegressionSolverName::SVD);
                FittedModel::LinearRegression(LinearRegression::fit(&x.matrix, &y, params)?)
            }
            (Hyperparameters::RandomForestRegressor(p), Targets::Values(values)) => {
                let y = values.to_vec();
                FittedModel::RandomForestRegressor(RandomForestRegressor::fit(
                    &x.matrix,
                    &y,
                    forest_regressor_parameters(p, seed),
                )?)
            }
            (Hyperparameters::GradientBoostingRegressor(p), Targets::Values(values)) => {
                FittedModel::GradientBoostingRegressor(BoostedRegressor::fit(&x.matrix, values, p)?)
            }
            (hyperparameters, _) => {
                return Err(LearningError::InvalidData(format!(
                    "{} cannot be fitted to {} targets",
                    hyperparameters.kind(),
                    match targets {
                        Targets::Classes { .. } => "class",
                        Targets::Values(_) => "continuous",
                    }
                )));
            }
        };

        self.fitted = Some(fitted);
        Ok(())
    }

    /// Predict for every row of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InferenceError`] if the estimator has not been
    /// fitted or the underlying model fails.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Predictions> {
        let Some(fitted) = &self.fitted else {
            return Err(LearningError::InferenceError(format!(
                "{} has not been fitted",
                self.kind()
            )));
        };

        let inference = |e: smartcore::error::Failed| LearningError::InferenceError(e.to_string());
        let predictions = match fitted {
            FittedModel::LogisticRegression(m) => {
                Predictions::Classes(m.predict(&x.matrix).map_err(inference)?)
            }
            FittedModel::RandomForestClassifier(m) => {
                Predictions::Classes(m.predict(&x.matrix).map_err(inference)?)
            }
            FittedModel::XgboostClassifier(m) => {
                Predictions::Classes(m.predict(&x.matrix, x.rows())?)
            }
            FittedModel::LinearRegression(m) => {
                Predictions::Values(m.predict(&x.matrix).map_err(inference)?)
            }
            FittedModel::RandomForestRegressor(m) => {
                Predictions::Values(m.predict(&x.matrix).map_err(inference)?)
            }
            FittedModel::GradientBoostingRegressor(m) => {
                Predictions::Values(m.predict(&x.matrix, x.rows())?)
            }
        };

        Ok(predictions)
    }
}

fn forest_classifier_parameters(p: &ForestParams, seed: u64) -> RandomForestClassifierParameters {
    let mut params = RandomForestClassifierParameters::default()
        .with_n_trees(p.n_trees.try_into().unwrap_or(100))
        .with_min_samples_leaf(p.min_samples_leaf)
        .with_seed(seed);
    if let Some(depth) = p.max_depth {
        params = params.with_max_depth(depth);
    }
    params
}

fn forest_regressor_parameters(p: &ForestParams, seed: u64) -> RandomForestRegressorParameters {
    let mut params = RandomForestRegressorParameters::default()
        .with_n_trees(p.n_trees.try_into().unwrap_or(100))
        .with_min_samples_leaf(p.min_samples_leaf)
        .with_seed(seed);
    if let Some(depth) = p.max_depth {
        params = params.with_max_depth(depth);
    }
    params
}

static_assertions::assert_impl_all!(Estimator: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn separable_rows() -> (Vec<Vec<f64>>, Vec<u32>) {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![if i < 20 { -1.0 } else { 1.0 } + (i % 5) as f64 * 0.01])
            .collect();
        let labels = (0..40).map(|i| u32::from(i >= 20)).collect();
        (rows, labels)
    }

    #[test]
    fn test_feature_matrix_rejects_empty() {
        assert!(FeatureMatrix::from_rows(&[]).is_err());
        assert!(FeatureMatrix::from_rows(&[vec![]]).is_err());
        assert!(FeatureMatrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let estimator = catalog::get_model("linear_regression").unwrap();
        let x = FeatureMatrix::from_rows(&[vec![1.0]]).unwrap();
        let err = estimator.predict(&x).unwrap_err();
        assert!(matches!(err, LearningError::InferenceError(_)));
    }

    #[test]
    fn test_logistic_regression_fits_separable_data() {
        let (rows, labels) = separable_rows();
        let x = FeatureMatrix::from_rows(&rows).unwrap();
        let mut estimator = catalog::get_model("logistic_regression").unwrap();

        estimator
            .fit(&x, Targets::Classes { labels: &labels, n_classes: 2 }, 42)
            .unwrap();

        assert!(estimator.is_fitted());
        assert_eq!(estimator.predict(&x).unwrap(), Predictions::Classes(labels));
    }

    #[test]
    fn test_linear_regression_recovers_line() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 3.0 * i as f64 + 2.0).collect();
        let x = FeatureMatrix::from_rows(&rows).unwrap();
        let mut estimator = catalog::get_model("linear_regression").unwrap();

        estimator.fit(&x, Targets::Values(&y), 42).unwrap();

        let Predictions::Values(predicted) = estimator.predict(&x).unwrap() else {
            panic!("expected values");
        };
        for (p, t) in predicted.iter().zip(&y) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_regressor_rejects_class_targets() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        let mut estimator = catalog::get_model("random_forest_regressor").unwrap();
        let err = estimator
            .fit(&x, Targets::Classes { labels: &[0, 1], n_classes: 2 }, 42)
            .unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
        assert!(!estimator.is_fitted());
    }

    #[test]
    fn test_length_mismatch() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        let mut estimator = catalog::get_model("linear_regression").unwrap();
        assert!(estimator.fit(&x, Targets::Values(&[1.0]), 42).is_err());
    }

    #[test]
    fn test_fitted_estimator_survives_json() {
        let (rows, labels) = separable_rows();
        let x = FeatureMatrix::from_rows(&rows).unwrap();
        let mut estimator = catalog::get_model("xgboost_classifier").unwrap();
        if let Hyperparameters::XgboostClassifier(p) = estimator.hyperparameters_mut() {
            p.n_estimators = 5;
        }
        estimator
            .fit(&x, Targets::Classes { labels: &labels, n_classes: 2 }, 42)
            .unwrap();

        let json = serde_json::to_vec(&estimator).unwrap();
        let restored: Estimator = serde_json::from_slice(&json).unwrap();

        assert_eq!(restored.kind(), ModelKind::XgboostClassifier);
        assert_eq!(restored.predict(&x).unwrap(), estimator.predict(&x).unwrap());
    }
}
