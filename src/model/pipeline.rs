//! Scaler + estimator pipeline and its on-disk form

use super::{Estimator, ModelParams, ModelType, Regressor, StandardScaler};
use crate::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Standardizer followed by one estimator.
///
/// Persisted as JSON; floats round-trip exactly, so a reloaded pipeline
/// predicts bit-identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    params: ModelParams,
    scaler: Option<StandardScaler>,
    estimator: Estimator,
}

/// Unfitted pipeline for the given hyperparameters
#[must_use]
pub fn build_pipeline(params: ModelParams) -> Pipeline {
    Pipeline {
        estimator: params.build(),
        params,
        scaler: None,
    }
}

impl Pipeline {
    /// Model type of the estimator
    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        self.estimator.model_type()
    }

    /// Hyperparameters the estimator was built with
    #[must_use]
    pub const fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Fitted standardizer
    #[must_use]
    pub const fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    /// Estimator (fitted after [`Pipeline::fit`])
    #[must_use]
    pub const fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Whether [`Pipeline::fit`] has succeeded
    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    /// Write as JSON, replacing any existing file
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        debug!(path = %path.display(), model = %self.model_type(), "pipeline saved");
        Ok(())
    }

    /// Read a pipeline written by [`Pipeline::save`]
    ///
    /// # Errors
    /// Returns error if the file is missing or not a pipeline
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot open model artifact {}: {e}", path.display()),
            ))
        })?;
        let pipeline: Self = serde_json::from_reader(BufReader::new(file))?;
        if pipeline.params.model_type() != pipeline.estimator.model_type() {
            return Err(Error::Model(format!(
                "artifact {} mixes {} parameters with a {} estimator",
                path.display(),
                pipeline.params.model_type(),
                pipeline.estimator.model_type()
            )));
        }
        Ok(pipeline)
    }
}

impl Regressor for Pipeline {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        let scaler = StandardScaler::fit_view(x);
        let scaled = scaler.transform(x);
        self.estimator = self.params.build();
        self.estimator.fit(scaled.view(), y)?;
        self.scaler = Some(scaler);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| Error::InvalidState("pipeline is not fitted".into()))?;
        if x.ncols() != scaler.n_features() {
            return Err(Error::InvalidInput(format!(
                "pipeline was fitted on {} features, got {}",
                scaler.n_features(),
                x.ncols()
            )));
        }
        self.estimator.predict(scaler.transform(x).view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pipeline_fit_predict() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut pipeline = build_pipeline(ModelParams::default_for(ModelType::LinearRegression));
        assert!(!pipeline.is_fitted());
        pipeline.fit(x.view(), y.view()).unwrap();
        let predicted = pipeline.predict(array![[5.0], [6.0]].view()).unwrap();
        assert!((predicted[0] - 5.0).abs() < 1e-9);
        assert!((predicted[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_load_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.sav");
        let x = array![[0.3, 1.7], [1.1, -0.4], [2.9, 0.25], [4.2, 3.3], [5.05, -1.0]];
        let y = array![0.1, 1.3, 2.2, 4.9, 5.5];

        let mut pipeline = build_pipeline(ModelParams::default_for(ModelType::LinearRegression));
        pipeline.fit(x.view(), y.view()).unwrap();
        pipeline.save(&path).unwrap();
        let loaded = Pipeline::load(&path).unwrap();

        assert_eq!(loaded, pipeline);
        let a = pipeline.predict(x.view()).unwrap();
        let b = loaded.predict(x.view()).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert_eq!(p.to_bits(), q.to_bits());
        }
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::load(dir.path().join("absent.sav")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_predict_unfitted() {
        let pipeline = build_pipeline(ModelParams::default_for(ModelType::Ridge));
        assert!(pipeline.predict(array![[1.0]].view()).is_err());
    }
}
