//! # grade-affinity: protein–ligand binding affinity benchmarks
//!
//! Interaction descriptors for protein–ligand complexes and a regression
//! benchmark built on top of them.
//!
//! ## Pipeline
//!
//! - [`descriptor`]: receptor (PDB) + ligands (SDF) → one descriptor row per ligand
//! - [`prepare`]: join descriptor and label tables into train/test arrays
//! - [`session`]: train, persist, reload and evaluate one regressor
//! - [`experiment`]: plan-driven sweeps over datasets, models and ablations
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use grade_affinity::model::ModelType;
//! use grade_affinity::prepare::{prepare, PrepareOptions, PrepareRequest};
//! use grade_affinity::session::{EvaluateOptions, Session, TrainOptions};
//!
//! let request = PrepareRequest::new(
//!     "pK",
//!     "data/GRADE_train.csv",
//!     "data/GRADE_test.csv",
//!     "data/labels_train.csv",
//!     "data/labels_test.csv",
//!     "basic",
//! );
//! let data = prepare(&request, &PrepareOptions::default())?;
//!
//! let mut session = Session::new(ModelType::Ridge, "pK", "basic");
//! session.set_data_tag("general");
//! session.set_prepared(data);
//! session.train(&TrainOptions::new("models/"))?;
//! session.evaluate(&EvaluateOptions::new("models/"))?;
//! println!("{:?}", session.evaluation());
//! # Ok::<(), grade_affinity::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod descriptor;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod model;
pub mod prepare;
pub mod session;
pub mod table;

pub use error::{Error, Result};
