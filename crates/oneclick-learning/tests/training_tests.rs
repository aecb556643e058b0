//! End-to-end tests: train, register, promote, predict.

use oneclick_data::TaskType;
use oneclick_learning::{
    LearningError, ModelKind, Predictor, Stage, Trainer, TrainerConfig, catalog,
};
use polars::prelude::*;
use serde_json::json;

// ============================================================================
// Helper Functions
// ============================================================================

/// 100 rows, binary `label` driven mostly by `score`, with a categorical
/// column and a few missing values.
fn binary_frame() -> DataFrame {
    let score: Vec<Option<f64>> = (0..100)
        .map(|i| if i % 17 == 0 { None } else { Some(i as f64 / 10.0) })
        .collect();
    let plan: Vec<Option<&str>> = (0..100)
        .map(|i| match i % 3 {
            0 => Some("basic"),
            1 => Some("pro"),
            _ if i % 7 == 0 => None,
            _ => Some("team"),
        })
        .collect();
    let label: Vec<i64> = (0..100).map(|i| i64::from(i >= 50)).collect();

    df! { "score" => score, "plan" => plan, "label" => label }.unwrap()
}

fn housing_frame() -> DataFrame {
    let sqft: Vec<f64> = (0..80).map(|i| 500.0 + 25.0 * i as f64).collect();
    let rooms: Vec<i64> = (0..80).map(|i| 1 + i % 5).collect();
    let price: Vec<f64> = sqft
        .iter()
        .zip(&rooms)
        .map(|(s, r)| 100.0 * s + 5000.0 * *r as f64)
        .collect();
    df! { "sqft" => sqft, "rooms" => rooms, "price" => price }.unwrap()
}

fn trainer(dir: &std::path::Path) -> Trainer {
    Trainer::open(dir, TrainerConfig::default()).unwrap()
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn test_logistic_regression_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());

    let result = trainer
        .train(&binary_frame(), "label", TaskType::Classification, "logistic_regression")
        .unwrap();

    let metrics = result.metrics.to_map();
    assert_eq!(metrics.keys().collect::<Vec<_>>(), ["accuracy", "f1"]);
    for value in metrics.values() {
        assert!((0.0..=1.0).contains(value), "metric out of range: {value}");
    }
    assert_eq!(result.task_type, TaskType::Classification);
    assert!(result.duration >= 0.0);
}

#[test]
fn test_every_classifier_trains() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());

    for kind in ModelKind::for_task(TaskType::Classification) {
        let result = trainer
            .train(&binary_frame(), "label", TaskType::Classification, kind.id())
            .unwrap();
        assert_eq!(result.model_id, kind);
        assert!(result.metrics.accuracy.unwrap() >= 0.5, "{kind} scored too low");
    }
}

#[test]
fn test_every_regressor_trains() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());

    for kind in ModelKind::for_task(TaskType::Regression) {
        let result = trainer
            .train(&housing_frame(), "price", TaskType::Regression, kind.id())
            .unwrap();
        assert!(result.metrics.mse.unwrap() >= 0.0);
        assert!(result.metrics.r2.unwrap() > 0.5, "{kind} scored too low");
    }
}

#[test]
fn test_task_mismatch_is_distinct_from_training_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = trainer(dir.path())
        .train(&housing_frame(), "price", TaskType::Classification, "linear_regression")
        .unwrap_err();

    let LearningError::TaskMismatch { ref hint, .. } = err else {
        panic!("expected task mismatch, got {err:?}");
    };
    assert!(hint.contains("logistic_regression"));
    assert!(err.is_recoverable());
}

// ============================================================================
// Registry and Prediction
// ============================================================================

#[test]
fn test_prediction_requires_promotion() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());

    let result = trainer
        .train(&binary_frame(), "label", TaskType::Classification, "random_forest_classifier")
        .unwrap();

    let err = Predictor::for_model(trainer.registry(), "random_forest_classifier").unwrap_err();
    assert!(matches!(err, LearningError::NoProductionModel { .. }));

    trainer
        .registry()
        .promote(&result.model_name, result.model_version)
        .unwrap();
    let predictor = Predictor::for_model(trainer.registry(), "random_forest_classifier").unwrap();
    assert_eq!(predictor.version().stage, Stage::Production);

    let record = json!({ "score": 9.5, "plan": "pro" });
    let prediction = predictor.predict_record(record.as_object().unwrap()).unwrap();
    assert!(prediction == json!(0) || prediction == json!(1), "got {prediction}");

    // Missing keys and unseen categories are tolerated.
    let sparse = json!({ "plan": "enterprise" });
    assert!(predictor.predict_record(sparse.as_object().unwrap()).is_ok());
}

#[test]
fn test_promotion_switches_production_version() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());
    let frame = housing_frame();

    let first = trainer
        .train(&frame, "price", TaskType::Regression, "linear_regression")
        .unwrap();
    let second = trainer
        .train(&frame, "price", TaskType::Regression, "linear_regression")
        .unwrap();
    assert_eq!((first.model_version, second.model_version), (1, 2));

    let registry = trainer.registry();
    registry.promote(&first.model_name, 1).unwrap();
    registry.promote(&second.model_name, 2).unwrap();

    let versions = registry.list_versions("Model_linear_regression").unwrap();
    assert_eq!(versions[0].stage, Stage::Archived);
    assert_eq!(versions[1].stage, Stage::Production);

    let predictor = Predictor::for_model(registry, "linear_regression").unwrap();
    assert_eq!(predictor.version().version, 2);

    let predictions = predictor.predict_frame(&frame.drop("price").unwrap()).unwrap();
    assert_eq!(predictions.len(), frame.height());
    let first_price = predictions[0].as_f64().unwrap();
    assert!((first_price - 55_000.0).abs() < 1.0, "got {first_price}");
}

#[test]
fn test_train_best_registers_only_the_winner() {
    let dir = tempfile::tempdir().unwrap();
    let trainer = trainer(dir.path());

    let result = trainer
        .train_best(&binary_frame(), "label", TaskType::Classification)
        .unwrap();

    assert_eq!(result.leaderboard.len(), 3);
    let ids: Vec<&str> = result.leaderboard.iter().map(|s| s.model_id.id()).collect();
    assert_eq!(
        ids,
        catalog::suggest(TaskType::Classification)
            .iter()
            .map(|s| s.id)
            .collect::<Vec<_>>()
    );

    let registered: usize = ModelKind::for_task(TaskType::Classification)
        .map(|k| trainer.registry().list_versions(&k.registry_name()).unwrap().len())
        .sum();
    assert_eq!(registered, 1);

    let best = result.best.metrics.accuracy.unwrap();
    assert!(result.leaderboard.iter().all(|s| s.metrics.accuracy.unwrap() <= best));
}
