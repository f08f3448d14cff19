//! Identity regression walkthrough
//!
//! Trains ordinary least squares on y = x, persists it, reloads it and
//! evaluates on two held-out points.
//!
//! Run with: cargo run --example identity_regression

use grade_affinity::model::ModelType;
use grade_affinity::session::{EvaluateOptions, Session, TrainOptions};
use ndarray::array;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let dir = tempfile::tempdir()?;
    let mut session = Session::new(ModelType::LinearRegression, "pK", "basic");
    session.set_data_tag("identity");
    session.set_training_data(array![[1.0], [2.0], [3.0], [4.0]], array![1.0, 2.0, 3.0, 4.0]);
    session.set_testing_data(array![[5.0], [6.0]], array![5.0, 6.0]);

    let artifact = session.train(&TrainOptions::new(dir.path()))?;
    println!("Model written to {}", artifact.display());

    let predicted = session.evaluate(&EvaluateOptions::new(dir.path()))?.clone();
    println!("Predictions: {predicted}");

    let stats = session.stats(true)?;
    println!("MAE: {:.3}", stats.mae);
    println!("MSE: {:.3}", stats.mse);
    println!("Pearson r: {} {}", stats.r, stats.confidence_interval);
    println!("R²: {}", stats.r2);

    let plot = session.render_plot(dir.path(), None)?;
    println!("Plot: {}", plot.display());
    Ok(())
}
