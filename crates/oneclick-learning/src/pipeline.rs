//! The trainer: split, preprocess, fit, score, track and register.
//!
//! [`Trainer::train`] fits one catalog model; [`Trainer::train_best`] fits
//! every candidate for the task on the same split and registers the winner.
//!
//! # Example
//!
//! ```rust,ignore
//! use oneclick_data::TaskType;
//! use oneclick_learning::{Trainer, TrainerConfig};
//!
//! let trainer = Trainer::open("storage/mlruns", TrainerConfig::default())?;
//! let result = trainer.train(dataset.frame(), "label", TaskType::Classification, "logistic_regression")?;
//! println!("{} -> {:?}", result.model_uri, result.metrics);
//!
//! trainer.registry().promote(&result.model_name, result.model_version)?;
//! ```

use crate::catalog::{self, ModelKind};
use crate::config::TrainerConfig;
use crate::error::{LearningError, Result};
use crate::estimator::{Estimator, FeatureMatrix, Predictions, Targets};
use crate::labels::LabelEncoder;
use crate::metrics;
use crate::model::TrainedModel;
use crate::preprocess::{FittedPreprocessor, Preprocessor};
use crate::progress::{ProgressReporter, ProgressUpdate, TrainingStage};
use crate::tracking::{ExperimentTracker, ModelRegistry, RunStatus};
use crate::types::{BestOfResult, Metrics, ModelScore, TrainingResult};
use oneclick_data::utils::{get_dtype_category, is_float_dtype, to_f64_values};
use oneclick_data::{DtypeCategory, TaskType};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

// ============================================================================
// Prepared data
// ============================================================================

/// Encoded targets for both partitions.
enum SplitTargets {
    Classes {
        train: Vec<u32>,
        test: Vec<u32>,
        labels: LabelEncoder,
    },
    Values {
        train: Vec<f64>,
        test: Vec<f64>,
    },
}

/// One split of one frame, preprocessed and ready for any candidate.
struct PreparedData {
    task: TaskType,
    target: String,
    preprocessor: FittedPreprocessor,
    x_train: FeatureMatrix,
    x_test: FeatureMatrix,
    targets: SplitTargets,
}

impl PreparedData {
    fn new(frame: &DataFrame, target: &str, task: TaskType, config: &TrainerConfig) -> Result<Self> {
        let frame = drop_missing_targets(frame, target)?;
        let target_series = frame.column(target)?.as_materialized_series().clone();
        check_target_kind(&target_series, task)?;

        let (train_idx, test_idx) = split_indices(frame.height(), config.test_size, config.random_seed)?;

        let features = frame.drop(target)?;
        let train_frame = features.take(&index_array(&train_idx))?;
        let test_frame = features.take(&index_array(&test_idx))?;

        let preprocessor = Preprocessor::new().fit(&train_frame)?;
        let x_train = FeatureMatrix::from_rows(&preprocessor.transform(&train_frame)?)?;
        let x_test = FeatureMatrix::from_rows(&preprocessor.transform(&test_frame)?)?;

        let targets = match task {
            TaskType::Classification => {
                let (labels, codes) = LabelEncoder::fit_transform(&target_series)?;
                let train: Vec<u32> = train_idx.iter().map(|&i| codes[i]).collect();
                let test = test_idx.iter().map(|&i| codes[i]).collect();
                if train.iter().all(|c| *c == train[0]) {
                    return Err(LearningError::InvalidData(format!(
                        "the training split of '{target}' contains a single class; \
                         classification needs at least two"
                    )));
                }
                SplitTargets::Classes { train, test, labels }
            }
            TaskType::Regression => {
                let values: Vec<f64> = to_f64_values(&target_series)?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect();
                SplitTargets::Values {
                    train: train_idx.iter().map(|&i| values[i]).collect(),
                    test: test_idx.iter().map(|&i| values[i]).collect(),
                }
            }
        };

        Ok(Self {
            task,
            target: target.to_string(),
            preprocessor,
            x_train,
            x_test,
            targets,
        })
    }

    fn train_targets(&self) -> Targets<'_> {
        match &self.targets {
            SplitTargets::Classes { train, labels, .. } => Targets::Classes {
                labels: train,
                n_classes: labels.n_classes(),
            },
            SplitTargets::Values { train, .. } => Targets::Values(train),
        }
    }

    fn score(&self, predictions: &Predictions) -> Result<Metrics> {
        match (&self.targets, predictions) {
            (SplitTargets::Classes { test, .. }, Predictions::Classes(predicted)) => Ok(
                Metrics::classification(
                    metrics::accuracy(test, predicted),
                    metrics::weighted_f1(test, predicted),
                ),
            ),
            (SplitTargets::Values { test, .. }, Predictions::Values(predicted)) => Ok(
                Metrics::regression(
                    metrics::mean_squared_error(test, predicted),
                    metrics::r2_score(test, predicted),
                ),
            ),
            _ => Err(LearningError::TrainingFailed(
                "estimator output does not match the task".to_string(),
            )),
        }
    }

    fn labels(&self) -> Option<LabelEncoder> {
        match &self.targets {
            SplitTargets::Classes { labels, .. } => Some(labels.clone()),
            SplitTargets::Values { .. } => None,
        }
    }
}

/// Drop rows whose target is null (or NaN for float targets).
fn drop_missing_targets(frame: &DataFrame, target: &str) -> Result<DataFrame> {
    let series = frame
        .column(target)
        .map_err(|_| LearningError::TargetNotFound(target.to_string()))?
        .as_materialized_series();

    let mask: Vec<bool> = if is_float_dtype(series.dtype()) {
        to_f64_values(series)?
            .into_iter()
            .map(|v| v.is_some_and(|x| !x.is_nan()))
            .collect()
    } else {
        series.is_not_null().into_iter().map(|v| v.unwrap_or(false)).collect()
    };

    let kept = mask.iter().filter(|k| **k).count();
    if kept == 0 {
        return Err(LearningError::InvalidData(format!(
            "target '{target}' has no values"
        )));
    }
    if kept < mask.len() {
        warn!(column = target, dropped = mask.len() - kept, "dropping rows with a missing target");
    }

    Ok(frame.filter(&BooleanChunked::from_slice("mask".into(), &mask))?)
}

/// Reject targets the task cannot learn from.
///
/// A classifier needs discrete labels, so float targets with fractional
/// values are refused; a regressor needs a numeric target.
fn check_target_kind(target: &Series, task: TaskType) -> Result<()> {
    let category = get_dtype_category(target.dtype());
    match task {
        TaskType::Classification => {
            if is_float_dtype(target.dtype()) {
                let continuous = to_f64_values(target)?
                    .into_iter()
                    .flatten()
                    .any(|v| v.fract() != 0.0);
                if continuous {
                    return Err(LearningError::task_mismatch(
                        format!("target '{}' has continuous values", target.name()),
                        "Choose a regression model such as linear_regression.",
                    ));
                }
            }
            Ok(())
        }
        TaskType::Regression => match category {
            DtypeCategory::Numeric | DtypeCategory::Boolean => Ok(()),
            _ => Err(LearningError::task_mismatch(
                format!("target '{}' is not numeric", target.name()),
                "Choose a classification model such as logistic_regression.",
            )),
        },
    }
}

/// Reject a model built for the other task.
fn check_model_task(kind: ModelKind, task: TaskType) -> Result<()> {
    if kind.task() == task {
        return Ok(());
    }
    let alternatives: Vec<&str> = ModelKind::for_task(task).map(|k| k.id()).collect();
    Err(LearningError::task_mismatch(
        format!("{kind} is a {} model but this project is {task}", kind.task()),
        format!("Choose a {task} model: {}.", alternatives.join(", ")),
    ))
}

/// Seeded shuffle, then the first `ceil(n * test_size)` rows become the test
/// partition.
fn split_indices(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(LearningError::InvalidData(format!(
            "{n} rows cannot be split into non-empty train and test partitions"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

fn index_array(indices: &[usize]) -> IdxCa {
    IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    )
}

// ============================================================================
// Trainer
// ============================================================================

/// A fitted candidate before it is recorded.
struct Candidate {
    estimator: Estimator,
    metrics: Metrics,
    duration: f64,
}

/// Fits catalog models, records runs and registers the results.
#[derive(Debug)]
pub struct Trainer {
    config: TrainerConfig,
    tracker: ExperimentTracker,
    registry: ModelRegistry,
}

impl Trainer {
    pub fn new(config: TrainerConfig, tracker: ExperimentTracker, registry: ModelRegistry) -> Self {
        Self {
            config,
            tracker,
            registry,
        }
    }

    /// Open the tracker and registry under `tracking_dir`.
    pub fn open(tracking_dir: impl AsRef<Path>, config: TrainerConfig) -> Result<Self> {
        let dir = tracking_dir.as_ref();
        let tracker = ExperimentTracker::open(dir, &config.experiment_name)?;
        let registry = ModelRegistry::open(dir)?;
        Ok(Self::new(config, tracker, registry))
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    #[must_use]
    pub fn tracker(&self) -> &ExperimentTracker {
        &self.tracker
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    fn reporter(&self) -> ProgressReporter {
        ProgressReporter::new(self.config.progress.clone())
    }

    /// Fit `model_id` on `frame` and register it as a new version of
    /// `Model_<model_id>`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::UnsupportedModel`] for an unknown id
    /// - [`LearningError::TaskMismatch`] when the model or the target does
    ///   not fit `task`
    /// - [`LearningError::TargetNotFound`] / [`LearningError::InvalidData`]
    ///   for unusable data
    /// - [`LearningError::TrainingFailed`] when the estimator fails
    pub fn train(
        &self,
        frame: &DataFrame,
        target: &str,
        task: TaskType,
        model_id: &str,
    ) -> Result<TrainingResult> {
        info!(model_id, column = target, rows = frame.height(), "training");
        let reporter = self.reporter();
        reporter.report(TrainingStage::Initializing, 0.0, format!("Preparing {model_id}"));

        let result = catalog::get_model(model_id).and_then(|estimator| {
            check_model_task(estimator.kind(), task)?;
            let data = self.prepare(&reporter, frame, target, task)?;

            reporter.send(ProgressUpdate {
                stage: TrainingStage::Training,
                progress: 0.4,
                message: format!("Training {model_id}"),
                current_model: Some(model_id.to_string()),
                models_completed: Some((0, 1)),
            });
            let candidate = self.fit_candidate(&reporter, 0.7, &data, estimator)?;

            reporter.report(TrainingStage::Registering, 0.9, "Recording run");
            self.record(&data, candidate, None)
        });

        self.finish(&reporter, result)
    }

    /// Fit every candidate for `task` on one split and register the best by
    /// the task's primary metric (accuracy or R²). Ties keep the earlier
    /// candidate in catalog order.
    ///
    /// A candidate that fails to fit is logged and left off the leaderboard;
    /// the sweep fails only if every candidate fails.
    pub fn train_best(&self, frame: &DataFrame, target: &str, task: TaskType) -> Result<BestOfResult> {
        info!(task = %task, column = target, rows = frame.height(), "training all candidates");
        let reporter = self.reporter();
        reporter.report(TrainingStage::Initializing, 0.0, "Preparing candidates");

        let result = self.prepare(&reporter, frame, target, task).and_then(|data| {
            let kinds: Vec<ModelKind> = ModelKind::for_task(task).collect();
            let total = kinds.len() as u32;
            let mut leaderboard = Vec::with_capacity(kinds.len());
            let mut best: Option<(Candidate, f64)> = None;
            let mut last_error = None;

            for (done, kind) in kinds.into_iter().enumerate() {
                reporter.send(ProgressUpdate {
                    stage: TrainingStage::Training,
                    progress: 0.3 + 0.6 * done as f64 / f64::from(total),
                    message: format!("Training {kind}"),
                    current_model: Some(kind.id().to_string()),
                    models_completed: Some((done as u32, total)),
                });

                let evaluation = 0.3 + 0.6 * (done as f64 + 0.5) / f64::from(total);
                let estimator = Estimator::new(kind.default_hyperparameters());
                let candidate = match self.fit_candidate(&reporter, evaluation, &data, estimator) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        warn!(model_id = %kind, error = %e, "candidate failed");
                        last_error = Some(e);
                        continue;
                    }
                };

                leaderboard.push(ModelScore {
                    model_id: kind,
                    metrics: candidate.metrics,
                    duration: candidate.duration,
                });

                let score = candidate.metrics.primary(task).unwrap_or(f64::NEG_INFINITY);
                if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
                    best = Some((candidate, score));
                }
            }

            let Some((winner, best_score)) = best else {
                return Err(last_error.unwrap_or_else(|| {
                    LearningError::TrainingFailed("no candidate models for this task".to_string())
                }));
            };

            info!(model_id = %winner.estimator.kind(), best_score, "best candidate selected");
            reporter.report(TrainingStage::Registering, 0.9, "Recording best run");
            let best = self.record(&data, winner, Some(best_score))?;
            Ok(BestOfResult { best, leaderboard })
        });

        self.finish(&reporter, result)
    }

    fn prepare(
        &self,
        reporter: &ProgressReporter,
        frame: &DataFrame,
        target: &str,
        task: TaskType,
    ) -> Result<PreparedData> {
        reporter.report(TrainingStage::Splitting, 0.1, "Splitting train and test rows");
        reporter.report(TrainingStage::Preprocessing, 0.2, "Fitting preprocessing");
        PreparedData::new(frame, target, task, &self.config)
    }

    /// Fit on the training rows and score on the held-out rows. `evaluation`
    /// is the progress reported once fitting is done.
    fn fit_candidate(
        &self,
        reporter: &ProgressReporter,
        evaluation: f64,
        data: &PreparedData,
        mut estimator: Estimator,
    ) -> Result<Candidate> {
        let start = Instant::now();
        estimator.fit(&data.x_train, data.train_targets(), self.config.random_seed)?;

        reporter.send(ProgressUpdate {
            stage: TrainingStage::Evaluation,
            progress: evaluation,
            message: format!("Scoring {} on {} held-out rows", estimator.kind(), data.x_test.rows()),
            current_model: Some(estimator.kind().id().to_string()),
            ..Default::default()
        });
        let predictions = estimator.predict(&data.x_test)?;
        let metrics = data.score(&predictions)?;
        let duration = start.elapsed().as_secs_f64();

        info!(
            model_id = %estimator.kind(),
            duration,
            metrics = ?metrics.to_map(),
            "candidate fitted"
        );
        Ok(Candidate {
            estimator,
            metrics,
            duration,
        })
    }

    /// Track the run, serialize the fitted unit and register it.
    fn record(
        &self,
        data: &PreparedData,
        candidate: Candidate,
        best_score: Option<f64>,
    ) -> Result<TrainingResult> {
        let kind = candidate.estimator.kind();
        let run_id = self.tracker.start_run()?;

        let registered = (|| {
            let mut params = vec![
                ("model_id".to_string(), kind.id().to_string()),
                ("task_type".to_string(), data.task.to_string()),
                ("target".to_string(), data.target.clone()),
                ("test_size".to_string(), self.config.test_size.to_string()),
                ("random_seed".to_string(), self.config.random_seed.to_string()),
                ("n_train".to_string(), data.x_train.rows().to_string()),
                ("n_test".to_string(), data.x_test.rows().to_string()),
                ("n_features".to_string(), data.x_train.cols().to_string()),
            ];
            params.extend(candidate.estimator.hyperparameters().as_params());
            self.tracker.log_params(&run_id, params)?;

            let mut logged = candidate.metrics.to_map();
            logged.insert("duration".to_string(), candidate.duration);
            if let Some(score) = best_score {
                logged.insert("best_score".to_string(), score);
            }
            self.tracker
                .log_metrics(&run_id, logged.iter().map(|(k, v)| (k.as_str(), *v)))?;

            let model = TrainedModel::new(
                data.task,
                &data.target,
                data.preprocessor.clone(),
                candidate.estimator,
                data.labels(),
            );
            self.registry
                .register(&kind.registry_name(), &run_id, &model.to_bytes()?)
        })();

        match registered {
            Ok(version) => {
                self.tracker.finish_run(&run_id, RunStatus::Finished)?;
                Ok(TrainingResult {
                    run_id,
                    model_id: kind,
                    task_type: data.task,
                    metrics: candidate.metrics,
                    duration: candidate.duration,
                    model_uri: version.uri(),
                    model_name: version.name,
                    model_version: version.version,
                })
            }
            Err(e) => {
                if let Err(finish_error) = self.tracker.finish_run(&run_id, RunStatus::Failed) {
                    warn!(run_id = %run_id, error = %finish_error, "could not mark run failed");
                }
                Err(e)
            }
        }
    }

    fn finish<T>(&self, reporter: &ProgressReporter, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => reporter.report(TrainingStage::Complete, 1.0, "Training complete"),
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "training failed");
                reporter.report(TrainingStage::Failed, 1.0, e.to_string());
            }
        }
        result
    }
}

static_assertions::assert_impl_all!(Trainer: Send, Sync);
