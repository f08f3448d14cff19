//! Data preparation: align descriptor and label tables into train/test arrays
//!
//! Four CSV files (train/test features, train/test labels) are joined on the
//! identifier column, the test identifiers are removed from the training
//! split, the ablation policy drops descriptor channels and the target
//! column becomes `y`.
//!
//! # Example
//!
//! ```rust,no_run
//! use grade_affinity::prepare::{prepare, PrepareOptions, PrepareRequest};
//!
//! let request = PrepareRequest::new(
//!     "pK",
//!     "data/GRADE_train.csv",
//!     "data/GRADE_test.csv",
//!     "data/labels_train.csv",
//!     "data/labels_test.csv",
//!     "basic",
//! );
//! let (x_train, x_test, y_train, y_test) =
//!     prepare(&request, &PrepareOptions::default())?.into_parts();
//! # Ok::<(), grade_affinity::Error>(())
//! ```

mod ablation;

pub use ablation::AblationPolicy;

use crate::model::StandardScaler;
use crate::table::{DataColumns, Table};
use crate::{Error, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Inputs of one preparation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareRequest {
    /// Target column in both label tables
    pub score_name: String,
    /// Training descriptor CSV
    pub train_features: PathBuf,
    /// Test descriptor CSV
    pub test_features: PathBuf,
    /// Training label CSV
    pub train_labels: PathBuf,
    /// Test label CSV
    pub test_labels: PathBuf,
    /// Ablation tag, resolved with [`AblationPolicy::from_tag`]
    pub ablation: String,
    /// Identifier and label-type column names
    pub columns: DataColumns,
}

impl PrepareRequest {
    /// Request with default column names
    pub fn new(
        score_name: impl Into<String>,
        train_features: impl Into<PathBuf>,
        test_features: impl Into<PathBuf>,
        train_labels: impl Into<PathBuf>,
        test_labels: impl Into<PathBuf>,
        ablation: impl Into<String>,
    ) -> Self {
        Self {
            score_name: score_name.into(),
            train_features: train_features.into(),
            test_features: test_features.into(),
            train_labels: train_labels.into(),
            test_labels: test_labels.into(),
            ablation: ablation.into(),
            columns: DataColumns::default(),
        }
    }

    /// Override the identifier / label-type column names
    #[must_use]
    pub fn with_columns(mut self, columns: DataColumns) -> Self {
        self.columns = columns;
        self
    }
}

/// Preparation switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PrepareOptions {
    /// Shuffle each split independently after preparation
    pub shuffle: bool,
    /// Append elementwise squares of every feature
    pub polynomial: bool,
    /// Shuffle seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            shuffle: true,
            polynomial: false,
            seed: None,
        }
    }
}

/// Output of [`prepare`]
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Training features
    pub x_train: Array2<f64>,
    /// Test features
    pub x_test: Array2<f64>,
    /// Training targets
    pub y_train: Array1<f64>,
    /// Test targets
    pub y_test: Array1<f64>,
    /// Training identifiers, in row order
    pub train_ids: Vec<String>,
    /// Test identifiers, in row order
    pub test_ids: Vec<String>,
    /// Feature names after ablation (squared features get a `^2` suffix)
    pub feature_names: Vec<String>,
    /// Scaler fitted on the training features; not applied to the arrays
    pub reference_scaler: StandardScaler,
}

impl PreparedData {
    /// `(x_train, x_test, y_train, y_test)`
    #[must_use]
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>) {
        (self.x_train, self.x_test, self.y_train, self.y_test)
    }

    /// Training split size
    #[must_use]
    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    /// Test split size
    #[must_use]
    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }
}

/// Replace spaces in a path with underscores
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace(' ', "_"))
}

/// Features and labels of one split after the join
struct Split {
    features: Table,
    labels: Table,
}

/// Load and align one (features, labels) pair.
///
/// Labels are sorted by identifier, features restricted to the label
/// identifiers, then labels restricted to the surviving feature identifiers.
fn load_split(features: &Path, labels: &Path, columns: &DataColumns) -> Result<Split> {
    let features = Table::from_csv_path(normalize_path(features), &columns.identifier, &[])?;
    let labels = Table::from_csv_path(
        normalize_path(labels),
        &columns.identifier,
        &[columns.label_type.as_str()],
    )?
    .sorted_by_id()?;

    let features = features.restricted_to(&labels)?;
    let labels = labels.restricted_to(&features)?;
    Ok(Split { features, labels })
}

/// Append elementwise squares as extra columns
pub fn square_features(x: &Array2<f64>) -> Array2<f64> {
    let squared = x.mapv(|v| v * v);
    // Both views share the row count, so the concatenation cannot fail
    concatenate(Axis(1), &[x.view(), squared.view()]).unwrap_or_else(|_| x.clone())
}

/// Apply one permutation to rows of `x`, entries of `y` and `ids`
pub(crate) fn permute(
    x: &Array2<f64>,
    y: &Array1<f64>,
    ids: &[String],
    order: &[usize],
) -> (Array2<f64>, Array1<f64>, Vec<String>) {
    (
        x.select(Axis(0), order),
        y.select(Axis(0), order),
        order.iter().map(|&i| ids[i].clone()).collect(),
    )
}

pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Build train/test arrays from descriptor and label files.
///
/// # Errors
/// - [`Error::DataMismatch`] if test features and test labels disagree on identifiers
/// - [`Error::MissingColumn`] if the target or an ablated column is absent
/// - IO / parse errors from the CSV files
pub fn prepare(request: &PrepareRequest, options: &PrepareOptions) -> Result<PreparedData> {
    let columns = &request.columns;
    let test = load_split(&request.test_features, &request.test_labels, columns)?;
    if test.features.ids() != test.labels.ids() {
        return Err(Error::DataMismatch(format!(
            "test features ({} rows) and test labels ({} rows) do not share the same identifiers",
            test.features.num_rows(),
            test.labels.num_rows()
        )));
    }

    let train = load_split(&request.train_features, &request.train_labels, columns)?;
    let test_ids: HashSet<&str> = test.labels.ids().iter().map(String::as_str).collect();
    let train = Split {
        features: train.features.without_ids(&test_ids)?,
        labels: train.labels.without_ids(&test_ids)?,
    };
    if train.features.ids() != train.labels.ids() {
        return Err(Error::DataMismatch(format!(
            "training features ({} rows) and training labels ({} rows) do not share the same identifiers",
            train.features.num_rows(),
            train.labels.num_rows()
        )));
    }

    let y_train = Array1::from(train.labels.numeric_column(&request.score_name)?);
    let y_test = Array1::from(test.labels.numeric_column(&request.score_name)?);

    let policy = AblationPolicy::from_tag(&request.ablation);
    if !policy.is_named() {
        info!(
            ablation = %request.ablation,
            "no ablation policy for tag, dropping identifier only"
        );
    }
    let drop = policy.drop_list(&columns.identifier);
    let train_features = train.features.drop_columns(&drop)?;
    let test_features = test.features.drop_columns(&drop)?;

    let mut feature_names = train_features.column_names();
    let mut x_train = train_features.to_matrix()?;
    let mut x_test = test_features.to_matrix()?;
    if x_train.ncols() != x_test.ncols() {
        return Err(Error::InvalidInput(format!(
            "training features have {} columns, test features {}",
            x_train.ncols(),
            x_test.ncols()
        )));
    }

    if options.polynomial {
        x_train = square_features(&x_train);
        x_test = square_features(&x_test);
        let squared: Vec<String> = feature_names.iter().map(|n| format!("{n}^2")).collect();
        feature_names.extend(squared);
    }

    let reference_scaler = StandardScaler::fit(&x_train);

    let mut train_ids = train_features.ids().to_vec();
    let mut test_ids = test_features.ids().to_vec();
    let (mut y_train, mut y_test) = (y_train, y_test);

    if options.shuffle {
        let mut rng = rng_from(options.seed);
        let mut order: Vec<usize> = (0..x_train.nrows()).collect();
        order.shuffle(&mut rng);
        (x_train, y_train, train_ids) = permute(&x_train, &y_train, &train_ids, &order);

        let mut order: Vec<usize> = (0..x_test.nrows()).collect();
        order.shuffle(&mut rng);
        (x_test, y_test, test_ids) = permute(&x_test, &y_test, &test_ids, &order);
    }

    debug!(
        train = x_train.nrows(),
        test = x_test.nrows(),
        features = x_train.ncols(),
        "prepared data"
    );

    Ok(PreparedData {
        x_train,
        x_test,
        y_train,
        y_test,
        train_ids,
        test_ids,
        feature_names,
        reference_scaler,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    const FEATURES: &str = "PDB code,a,b\n\
        p1,1,10\np2,2,20\np3,3,30\np4,4,40\np5,5,50\np6,6,60\n";
    const LABELS: &str = "PDB code,Affinity Data Type,pK\n\
        p4,Kd,4.0\np2,Ki,2.0\np1,Kd,1.0\np3,Kd,3.0\np9,Kd,9.0\n";
    const TEST_FEATURES: &str = "PDB code,a,b\np5,5,50\np3,3,30\n";
    const TEST_LABELS: &str = "PDB code,Affinity Data Type,pK\np3,Kd,3.0\np5,Kd,5.0\n";

    fn request(dir: &Path) -> PrepareRequest {
        PrepareRequest::new(
            "pK",
            write(dir, "train.csv", FEATURES),
            write(dir, "test.csv", TEST_FEATURES),
            write(dir, "train_labels.csv", LABELS),
            write(dir, "test_labels.csv", TEST_LABELS),
            "GRADE",
        )
    }

    fn no_shuffle() -> PrepareOptions {
        PrepareOptions {
            shuffle: false,
            ..PrepareOptions::default()
        }
    }

    #[test]
    fn test_prepare_joins_and_removes_test_ids() {
        let dir = tempfile::tempdir().unwrap();
        let data = prepare(&request(dir.path()), &no_shuffle()).unwrap();

        assert_eq!(data.train_ids, vec!["p1", "p2", "p4"]);
        assert_eq!(data.test_ids, vec!["p3", "p5"]);
        assert_eq!(data.y_train.to_vec(), vec![1.0, 2.0, 4.0]);
        assert_eq!(data.y_test.to_vec(), vec![3.0, 5.0]);
        assert_eq!(data.x_train.shape(), &[3, 2]);
        assert_eq!(data.feature_names, vec!["a", "b"]);
    }

    #[test]
    fn test_prepare_polynomial_doubles_columns() {
        let dir = tempfile::tempdir().unwrap();
        let options = PrepareOptions {
            polynomial: true,
            ..no_shuffle()
        };
        let data = prepare(&request(dir.path()), &options).unwrap();
        assert_eq!(data.x_train.shape(), &[3, 4]);
        assert!((data.x_train[[2, 3]] - 1600.0).abs() < f64::EPSILON);
        assert_eq!(data.feature_names[3], "b^2");
    }

    #[test]
    fn test_prepare_does_not_apply_reference_scaler() {
        let dir = tempfile::tempdir().unwrap();
        let data = prepare(&request(dir.path()), &no_shuffle()).unwrap();
        assert!((data.x_train[[0, 0]] - 1.0).abs() < f64::EPSILON);
        assert!((data.reference_scaler.mean()[0] - 7.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_prepare_test_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        // duplicated feature row survives the join, labels do not
        req.test_features = write(
            dir.path(),
            "test3.csv",
            "PDB code,a,b\np5,5,50\np5,5,50\np3,3,30\n",
        );
        let err = prepare(&req, &no_shuffle()).unwrap_err();
        assert!(matches!(err, Error::DataMismatch(_)));
    }

    #[test]
    fn test_prepare_missing_ablation_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path());
        req.ablation = "basic".into();
        let err = prepare(&req, &no_shuffle()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn test_prepare_seeded_shuffle_keeps_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let options = PrepareOptions {
            shuffle: true,
            polynomial: false,
            seed: Some(7),
        };
        let a = prepare(&request(dir.path()), &options).unwrap();
        let b = prepare(&request(dir.path()), &options).unwrap();
        assert_eq!(a.train_ids, b.train_ids);
        for (row, y) in a.y_train.iter().enumerate() {
            assert!((a.x_train[[row, 0]] - y).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_normalize_path_replaces_spaces() {
        assert_eq!(
            normalize_path(Path::new("data/my set/file 1.csv")),
            PathBuf::from("data/my_set/file_1.csv")
        );
    }
}
