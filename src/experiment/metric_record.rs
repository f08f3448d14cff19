//! Per-repeat evaluation statistics of a combination run

use crate::session::StatsRow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistic recorded for every evaluation repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Mean absolute error
    Mae,
    /// Mean squared error
    Mse,
    /// Standard deviation of the predictions
    Sd,
    /// Pearson r
    R,
    /// Squared r of the least-squares line
    R2,
    /// Spearman r
    Spearman,
    /// Wall-clock seconds spent reloading and predicting
    Time,
}

impl Statistic {
    /// Every statistic, in results-table order
    pub const ALL: [Self; 7] = [
        Self::Mae,
        Self::Mse,
        Self::Sd,
        Self::R,
        Self::R2,
        Self::Spearman,
        Self::Time,
    ];

    /// Lower-case name used in the records JSON
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mae => "mae",
            Self::Mse => "mse",
            Self::Sd => "sd",
            Self::R => "r",
            Self::R2 => "r2",
            Self::Spearman => "spearman",
            Self::Time => "time",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One statistic of one evaluation repeat of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    statistic: Statistic,
    repeat: usize,
    value: f64,
}

impl MetricRecord {
    /// Create a metric record
    #[must_use]
    pub fn new(run_id: impl Into<String>, statistic: Statistic, repeat: usize, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            statistic,
            repeat,
            value,
        }
    }

    /// Records for every statistic of one evaluation repeat.
    ///
    /// Spearman is only recorded when the session computed it.
    #[must_use]
    pub fn from_stats(run_id: &str, repeat: usize, stats: &StatsRow, seconds: f64) -> Vec<Self> {
        Statistic::ALL
            .iter()
            .filter_map(|&statistic| {
                let value = match statistic {
                    Statistic::Mae => stats.mae,
                    Statistic::Mse => stats.mse,
                    Statistic::Sd => stats.sd,
                    Statistic::R => stats.r,
                    Statistic::R2 => stats.r2,
                    Statistic::Spearman => stats.spearman?,
                    Statistic::Time => seconds,
                };
                Some(Self::new(run_id, statistic, repeat, value))
            })
            .collect()
    }

    /// Parent run ID
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Recorded statistic
    #[must_use]
    pub const fn statistic(&self) -> Statistic {
        self.statistic
    }

    /// Zero-based evaluation repeat
    #[must_use]
    pub const fn repeat(&self) -> usize {
        self.repeat
    }

    /// Measured value
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelType;

    fn stats(spearman: Option<f64>) -> StatsRow {
        StatsRow {
            model_type: ModelType::Ridge,
            score: "pK".into(),
            data_tag: "all".into(),
            mae: 1.5,
            mse: 2.25,
            sd: 0.8,
            r: 0.7,
            confidence_interval: "[0.5 ~ 0.8]".into(),
            r2: 0.49,
            spearman,
            ablation: "basic".into(),
        }
    }

    #[test]
    fn test_from_stats_covers_every_statistic() {
        let records = MetricRecord::from_stats("run-0001", 2, &stats(Some(0.65)), 0.125);
        let recorded: Vec<Statistic> = records.iter().map(MetricRecord::statistic).collect();
        assert_eq!(recorded, Statistic::ALL.to_vec());
        assert!(records.iter().all(|m| m.repeat() == 2 && m.run_id() == "run-0001"));
        assert_eq!(records[3].value(), 0.7);
        assert_eq!(records[6].value(), 0.125);
    }

    #[test]
    fn test_from_stats_skips_missing_spearman() {
        let records = MetricRecord::from_stats("run-0001", 0, &stats(None), 0.0);
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|m| m.statistic() != Statistic::Spearman));
    }

    #[test]
    fn test_statistic_serializes_lowercase() {
        let record = MetricRecord::new("run-0001", Statistic::R2, 0, 0.49);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"statistic\":\"r2\""));
    }
}
