//! Session lifecycle: train, persist, reload, evaluate, score

use grade_affinity::model::{ModelType, Pipeline, Regressor};
use grade_affinity::session::{artifact_path, EvaluateOptions, Session, SessionState, TrainOptions};
use grade_affinity::table::Table;
use ndarray::{array, Array1, Array2};
use std::fs;

fn identity_session() -> Session {
    let mut session = Session::new(ModelType::LinearRegression, "pK", "basic");
    session.set_data_tag("general");
    session.set_training_data(array![[1.0], [2.0], [3.0], [4.0]], array![1.0, 2.0, 3.0, 4.0]);
    session.set_testing_data(array![[5.0], [6.0]], array![5.0, 6.0]);
    session
}

#[test]
fn test_identity_regression() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = identity_session();

    let path = session.train(&TrainOptions::new(dir.path())).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "linearRegression_pK_general_basic.sav"
    );
    assert_eq!(session.state(), SessionState::Trained);

    let predicted = session.evaluate(&EvaluateOptions::new(dir.path())).unwrap().clone();
    assert!((predicted[0] - 5.0).abs() < 1e-9);
    assert!((predicted[1] - 6.0).abs() < 1e-9);

    let evaluation = session.evaluation().unwrap();
    assert!(evaluation.mae < 1e-9);
    assert!(evaluation.mse < 1e-12);
    assert_eq!(evaluation.r, 1.0);
    assert_eq!(evaluation.r2, 1.0);
    assert_eq!(session.state(), SessionState::Evaluated);
}

#[test]
fn test_reloaded_pipeline_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(ModelType::LinearRegression, "pK", "basic");
    session.set_data_tag("refined");

    let x = Array2::from_shape_fn((12, 3), |(i, j)| {
        let (i, j) = (f64::from(u32::try_from(i).unwrap()), f64::from(u32::try_from(j).unwrap()));
        (i * 0.37 + j * 1.3).sin() * 10.0 + j
    });
    let y: Array1<f64> = x.rows().into_iter().map(|r| 0.3 * r[0] - 1.7 * r[1] + 0.1 * r[2] + 2.0).collect();
    session.set_training_data(x.clone(), y);
    session.set_testing_data(x.clone(), Array1::zeros(12));

    let path = session.train(&TrainOptions::new(dir.path())).unwrap();
    let in_memory = session.pipeline().unwrap().predict(x.view()).unwrap();
    let reloaded = Pipeline::load(&path).unwrap().predict(x.view()).unwrap();

    let bits = |a: &Array1<f64>| a.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&in_memory), bits(&reloaded));
}

#[test]
fn test_same_key_overwrites_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = identity_session();
    let first = session.train(&TrainOptions::new(dir.path())).unwrap();
    let second = session.train(&TrainOptions::new(dir.path())).unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(first, artifact_path(dir.path(), &session.key().unwrap(), ""));
}

#[test]
fn test_operations_before_prerequisites_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(ModelType::Ridge, "pK", "basic");
    session.set_training_data(array![[1.0], [2.0]], array![1.0, 2.0]);
    // No data tag yet
    assert!(session.key().is_err());
    assert!(session.train(&TrainOptions::new(dir.path())).is_err());

    session.set_data_tag("all");
    assert!(session.stats(true).is_err());
    assert!(session.render_plot(dir.path(), None).is_err());
    // Nothing persisted under this key
    assert!(session.evaluate(&EvaluateOptions::new(dir.path())).is_err());
}

#[test]
fn test_score_unlabeled_uses_persisted_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(ModelType::LinearRegression, "pK", "unknown-tag");
    session.set_data_tag("all");
    session.set_training_data(array![[1.0], [2.0], [3.0], [4.0]], array![2.0, 4.0, 6.0, 8.0]);
    session.train(&TrainOptions::new(dir.path())).unwrap();

    let csv = "PDB code,a\nx1,10\nx2,0.5\n";
    let reader = csv::Reader::from_reader(csv.as_bytes());
    let table = Table::from_csv_reader(reader, "PDB code", &[], "inline").unwrap();

    let (ids, predicted) = session.score_unlabeled(table, dir.path()).unwrap();
    assert_eq!(ids, vec!["x1".to_string(), "x2".to_string()]);
    assert!((predicted[0] - 20.0).abs() < 1e-9);
    assert!((predicted[1] - 1.0).abs() < 1e-9);
    // Scoring does not touch stored metrics
    assert!(session.evaluation().is_none());
}

#[test]
fn test_plot_written_after_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = identity_session();
    session.train(&TrainOptions::new(dir.path())).unwrap();
    session.evaluate(&EvaluateOptions::new(dir.path())).unwrap();

    let path = session.render_plot(dir.path(), Some("identity")).unwrap();
    assert!(path.ends_with("identity.svg"));
    assert!(fs::read_to_string(&path).unwrap().contains("<svg"));
    assert_eq!(session.state(), SessionState::Plotted);

    let stats = session.stats(false).unwrap();
    assert_eq!(stats.model_type, ModelType::LinearRegression);
    assert_eq!(stats.spearman, None);
    assert_eq!(stats.ablation, "basic");
}
