//! Behaviour tests for the trainer: warehouse history in, model artifact out.

use ibov_forecast::{AutoArima, ForecastError, ModelArtifact, MODEL_KEY};
use ibov_tests::*;
use tempfile::tempdir;

fn five_day_records() -> Vec<ObservationRecord> {
    [100.0, 101.0, 99.0, 102.0, 103.0]
        .iter()
        .enumerate()
        .map(|(index, close)| ObservationRecord::close_only(format!("2024-01-0{}", index + 1), *close))
        .collect()
}

#[test]
fn five_closes_give_a_single_bounded_one_step_forecast() {
    // Given: Closes [100, 101, 99, 102, 103] for 2024-01-01..2024-01-05
    let temp = tempdir().expect("tempdir");
    let warehouse = seed_warehouse(temp.path(), &five_day_records());
    let trainer = Trainer::new(
        warehouse,
        ArtifactStore::new(temp.path().join("artifacts")),
        TrainerConfig::default(),
    );

    // When: A model is trained and asked for one step
    let report = trainer.run().expect("train");
    let artifact = trainer.store().load().expect("load artifact");
    let forecast = artifact.model.forecast(1, 0.95).expect("forecast");

    // Then: Exactly one value with finite bounds around it
    assert_eq!(report.rows, 5);
    assert_eq!(forecast.len(), 1);
    let point = forecast[0];
    assert!(point.mean.is_finite());
    assert!(point.lower.is_finite() && point.upper.is_finite());
    assert!(point.lower <= point.mean && point.mean <= point.upper);
}

#[test]
fn training_twice_on_the_same_history_gives_identical_predictions() {
    // Given: One warehouse history and two independent artifact roots
    let temp = tempdir().expect("tempdir");
    let warehouse = seed_warehouse(temp.path(), &synthetic_records("2023-06-01", 120, 42));
    let first = Trainer::new(
        warehouse.clone(),
        ArtifactStore::new(temp.path().join("run-a")),
        TrainerConfig::default(),
    );
    let second = Trainer::new(
        warehouse,
        ArtifactStore::new(temp.path().join("run-b")),
        TrainerConfig::default(),
    );

    // When: Both train
    let report_a = first.run().expect("first training");
    let report_b = second.run().expect("second training");

    // Then: Same order and AIC, and the saved models predict the same values
    assert_eq!(report_a.order, report_b.order);
    assert_eq!(report_a.aic, report_b.aic);
    let model_a = first.store().load().expect("artifact a").model;
    let model_b = second.store().load().expect("artifact b").model;
    assert_eq!(
        model_a.forecast(20, 0.95).expect("forecast a"),
        model_b.forecast(20, 0.95).expect("forecast b")
    );
}

#[test]
fn artifact_is_versioned_json_at_the_fixed_key() {
    // Given: A trained model
    let temp = tempdir().expect("tempdir");
    let root = temp.path().join("artifacts");
    let trainer = Trainer::new(
        seed_warehouse(temp.path(), &synthetic_records("2024-01-01", 60, 3)),
        ArtifactStore::new(&root),
        TrainerConfig::default(),
    );

    // When: The report is produced
    let report = trainer.run().expect("train");

    // Then: The artifact sits at <root>/models/arima_model.json and records provenance
    assert_eq!(report.artifact_path, root.join(MODEL_KEY));
    let body = std::fs::read_to_string(&report.artifact_path).expect("read artifact");
    let artifact: ModelArtifact = serde_json::from_str(&body).expect("parse artifact");
    assert_eq!(artifact.format_version, 1);
    assert_eq!(artifact.training_rows, 60);
    assert_eq!(artifact.first_date, TradingDate::parse("2024-01-01").ok());
    assert_eq!(artifact.model.order(), report.order);
}

#[test]
fn empty_history_fails_without_writing_an_artifact() {
    // Given: An empty warehouse
    let temp = tempdir().expect("tempdir");
    let trainer = Trainer::new(
        seed_warehouse(temp.path(), &[]),
        ArtifactStore::new(temp.path().join("artifacts")),
        TrainerConfig::default(),
    );

    // When: Training is requested
    let error = trainer.run().expect_err("nothing to train on");

    // Then: The error says so and no artifact appears
    assert!(matches!(error, ForecastError::EmptyHistory));
    assert!(!trainer.store().exists());
}

#[test]
fn auto_arima_selection_is_deterministic_for_a_fixed_series() {
    // Given: A fixed series
    let closes = random_walk(90, 5);

    // When: Order selection runs twice
    let a = AutoArima::default().fit(&closes).expect("fit a");
    let b = AutoArima::default().fit(&closes).expect("fit b");

    // Then: The same candidates are visited and the same model wins
    assert_eq!(a.candidates, b.candidates);
    assert_eq!(a.model, b.model);
}
