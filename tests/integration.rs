//! Integration tests for ChurnForge

use churnforge::pipeline::{run_clustering, run_preprocess, run_training};
use churnforge::{
    load_csv, read_csv_bytes, ArtifactPaths, ClusteringConfig, CoreError, PredictionRequest,
    ServingContext,
};
use std::io::Write;
use tempfile::TempDir;

const DEPARTMENTS: [&str; 3] = ["sales", "technical", "support"];
const SALARIES: [&str; 3] = ["low", "medium", "high"];

/// Write a raw HR dataset where low satisfaction goes with leaving
fn create_project() -> (TempDir, ArtifactPaths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::under(dir.path());
    std::fs::create_dir_all(paths.original.parent().unwrap()).unwrap();

    let mut file = std::fs::File::create(&paths.original).unwrap();
    writeln!(
        file,
        "EmployeeNumber,satisfaction_level,last_evaluation,number_project,average_montly_hours,\
time_spend_company,Work_accident,promotion_last_5years,Department,salary,left"
    )
    .unwrap();

    for i in 0..40 {
        let leaver = i % 4 == 0;
        let satisfaction = if leaver {
            0.09 + (i % 7) as f64 * 0.02
        } else {
            0.55 + (i % 9) as f64 * 0.04
        };
        let evaluation = 0.5 + (i % 5) as f64 * 0.1;
        let projects = if leaver { 6 + i % 2 } else { 3 + i % 2 };
        let hours = if leaver { 260 + i } else { 160 + i };
        writeln!(
            file,
            "{},{:.2},{:.2},{},{},{},{},{},{},{},{}",
            1000 + i,
            satisfaction,
            evaluation,
            projects,
            hours,
            2 + i % 6,
            u8::from(i % 7 == 0),
            u8::from(i % 13 == 0),
            DEPARTMENTS[i % 3],
            SALARIES[i % 3],
            u8::from(leaver)
        )
        .unwrap();
    }

    (dir, paths)
}

fn small_clustering() -> ClusteringConfig {
    ClusteringConfig {
        k_max: 5,
        ..ClusteringConfig::default()
    }
}

#[test]
fn test_end_to_end_pipeline() {
    let (_dir, paths) = create_project();

    let report = run_preprocess(&paths).unwrap();
    assert!(report.dropped.contains(&"EmployeeNumber".to_string()));

    let preprocessed = load_csv(&paths.preprocessed).unwrap();
    assert_eq!(preprocessed.height(), 40);
    assert!(preprocessed.column("EmployeeNumber").is_err());

    let training = run_training(&paths, 200, 42).unwrap();
    assert_eq!(training.train_rows + training.test_rows, 40);
    assert!(paths.model.exists());
    assert!(paths.model_metrics.exists());
    assert!(paths.classification_report.exists());
    // low satisfaction separates leavers cleanly, so the held-out rows are all right
    assert!(training.metrics.accuracy > 0.9);
    assert!(training.metrics.recall > 0.9);

    let clustering = run_clustering(&paths, &small_clustering()).unwrap();
    assert!((2..=5).contains(&clustering.selection.optimal_k));
    assert_eq!(clustering.assignments.len(), 40);
    assert!(paths.cluster_assignments.exists());

    // Verify cluster sizes sum to total employees
    let profiles = clustering.profiles.unwrap();
    assert_eq!(profiles.iter().map(|p| p.size).sum::<usize>(), 40);
    let total_pct: f64 = profiles.iter().map(|p| p.percentage).sum();
    assert!((total_pct - 100.0).abs() < 0.01);

    let context = ServingContext::load(&paths);
    assert!(context.health().models_loaded);

    let insights = context.cluster_insights().unwrap();
    assert_eq!(insights.len(), profiles.len());
    assert!(insights.iter().all(|i| !i.description.is_empty()));

    let evaluation = context.model_metrics().unwrap();
    assert!(evaluation.metrics.accuracy > 0.9);
    let report = evaluation.classification_report.unwrap();
    assert_eq!(report.row("1").unwrap().support, 2);
    assert_eq!(report.row("weighted avg").unwrap().support, 8);

    let overview = context.dataset_overview().unwrap();
    assert_eq!(overview.total_employees, 40);
    assert_eq!(overview.turnover_rate, Some(25.0));
}

#[test]
fn test_sample_prediction() {
    let (_dir, paths) = create_project();
    run_preprocess(&paths).unwrap();
    run_training(&paths, 200, 42).unwrap();

    let context = ServingContext::load(&paths);
    let batch = context.predict(&PredictionRequest::Sample).unwrap();

    assert_eq!(batch.summary.total, 5);
    assert!(batch.rows.column("left").is_err());
    // rows 0 and 4 of the fixture are leavers
    assert_eq!(batch.labels().unwrap(), vec![1, 0, 0, 0, 1]);
    assert_eq!(batch.summary.positive_rate_percent, 40.0);
    for p in batch.probabilities().unwrap() {
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn test_uploaded_prediction_with_extra_column() {
    let (_dir, paths) = create_project();
    run_preprocess(&paths).unwrap();
    run_training(&paths, 200, 42).unwrap();

    let context = ServingContext::load(&paths);
    let schema = context.reference_schema().unwrap();

    // Build an upload from the preprocessed rows plus an unrelated column, reversed column order
    let mut header: Vec<String> = schema.names().iter().rev().map(|s| s.to_string()).collect();
    header.push("manager_notes".to_string());
    let mut csv = header.join(",");
    csv.push('\n');
    for row in 0..3 {
        let values: Vec<String> = schema
            .names()
            .iter()
            .rev()
            .map(|_| format!("{:.1}", row as f64 * 0.5 - 0.5))
            .chain(std::iter::once(format!("note{row}")))
            .collect();
        csv.push_str(&values.join(","));
        csv.push('\n');
    }
    let upload = read_csv_bytes(csv.into_bytes()).unwrap();

    let batch = context
        .predict(&PredictionRequest::Upload(upload))
        .unwrap();

    assert_eq!(batch.summary.total, 3);
    assert!(batch.rows.column("manager_notes").is_ok());
    let json = batch.to_json().unwrap();
    assert_eq!(json["predictions"].as_array().unwrap().len(), 3);
}

#[test]
fn test_upload_missing_columns_rejected() {
    let (_dir, paths) = create_project();
    run_preprocess(&paths).unwrap();
    run_training(&paths, 200, 42).unwrap();

    let context = ServingContext::load(&paths);
    let upload = read_csv_bytes(b"satisfaction_level\n0.4\n".to_vec()).unwrap();

    match context.predict(&PredictionRequest::Upload(upload)) {
        Err(CoreError::Schema { missing }) => {
            assert!(missing.contains(&"number_project".to_string()));
            assert!(!missing.contains(&"satisfaction_level".to_string()));
        }
        other => panic!("expected schema error, got {:?}", other.map(|b| b.summary)),
    }
}

#[test]
fn test_prediction_without_model() {
    let (_dir, paths) = create_project();
    run_preprocess(&paths).unwrap();

    let context = ServingContext::load(&paths);
    let err = context.predict(&PredictionRequest::Sample).unwrap_err();

    assert!(matches!(err, CoreError::ModelUnavailable));
    assert!(!err.is_client_error());
}

#[test]
fn test_clustering_is_deterministic() {
    let (_dir, paths) = create_project();
    run_preprocess(&paths).unwrap();

    let first = run_clustering(&paths, &small_clustering()).unwrap();
    let second = run_clustering(&paths, &small_clustering()).unwrap();

    assert_eq!(first.selection.optimal_k, second.selection.optimal_k);
    assert_eq!(first.assignments, second.assignments);
}
