//! Artifact and plot naming
//!
//! Every name is a pure function of an [`ArtifactKey`].

use crate::model::ModelType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extension of persisted pipelines
pub const ARTIFACT_EXTENSION: &str = "sav";

/// File extension of rendered plots
pub const PLOT_EXTENSION: &str = "svg";

/// Composite key addressing one trained pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    /// Regressor
    pub model_type: ModelType,
    /// Target score column, e.g. `pK` or `-logKd/Ki`
    pub score: String,
    /// Data subset tag, e.g. `general`
    pub data_tag: String,
    /// Ablation tag, e.g. `basic`
    pub ablation: String,
}

impl ArtifactKey {
    /// Build a key
    pub fn new(
        model_type: ModelType,
        score: impl Into<String>,
        data_tag: impl Into<String>,
        ablation: impl Into<String>,
    ) -> Self {
        Self {
            model_type,
            score: score.into(),
            data_tag: data_tag.into(),
            ablation: ablation.into(),
        }
    }

    /// `{model}_{score}_{data}_{ablation}{marker}.sav` with `/` in the score
    /// replaced by `div`
    #[must_use]
    pub fn file_name(&self, marker: &str) -> String {
        format!(
            "{}_{}_{}_{}{marker}.{ARTIFACT_EXTENSION}",
            self.model_type,
            self.score.replace('/', "div"),
            self.data_tag,
            self.ablation
        )
    }

    /// Default plot stem: `{data}_{score}_{model}_{ablation}`, spaces become
    /// `_` and `/` in the score becomes `div`
    #[must_use]
    pub fn plot_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.data_tag.replace(' ', "_"),
            self.score.replace(' ', "_").replace('/', "div"),
            self.model_type.as_str().replace(' ', "_"),
            self.ablation.replace(' ', "_")
        )
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.model_type, self.score, self.data_tag, self.ablation
        )
    }
}

/// Path of the pipeline addressed by `key` inside `dir`
#[must_use]
pub fn artifact_path(dir: &Path, key: &ArtifactKey, marker: &str) -> PathBuf {
    dir.join(key.file_name(marker))
}

/// Path of a plot inside `dir`; `name` overrides the default stem
#[must_use]
pub fn plot_path(dir: &Path, key: &ArtifactKey, name: Option<&str>) -> PathBuf {
    let stem = name.map_or_else(|| key.plot_stem(), str::to_string);
    dir.join(format!("{stem}.{PLOT_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_replaces_slash() {
        let key = ArtifactKey::new(ModelType::Ridge, "-logKd/Ki", "refined", "basic");
        let path = artifact_path(Path::new("models"), &key, "");
        assert_eq!(path, PathBuf::from("models/Ridge_-logKddivKi_refined_basic.sav"));
    }

    #[test]
    fn test_artifact_path_marker() {
        let key = ArtifactKey::new(ModelType::XgBoost, "pK", "general", "-w-el");
        assert_eq!(key.file_name("_run2"), "XGBoost_pK_general_-w-el_run2.sav");
    }

    #[test]
    fn test_plot_name() {
        let key = ArtifactKey::new(ModelType::Svr, "binding score/x", "core set", "basic el");
        assert_eq!(key.plot_stem(), "core_set_binding_scoredivx_SVR_basic_el");
        let custom = plot_path(Path::new("plots"), &key, Some("fig1"));
        assert_eq!(custom, PathBuf::from("plots/fig1.svg"));
    }
}
