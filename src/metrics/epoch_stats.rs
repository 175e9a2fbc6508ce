use serde::{Deserialize, Serialize};

/// Finalized statistics of one split (train or validation) for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SplitStats {
    /// Mean loss per sub-window.
    pub loss: f64,
    /// Fraction of sub-windows whose predicted head matched, in [0, 1].
    pub accuracy: f64,
    /// Mean absolute error of the direction output.
    pub mae: f64,
    pub batches: usize,
    /// Sub-windows that contributed to `accuracy`.
    pub samples: usize,
}

/// Per-epoch statistics, one entry per completed epoch.
///
/// The training loop also sends these over its optional progress channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    pub total_epochs: usize,
    pub train: SplitStats,
    pub valid: SplitStats,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Flat row written to `history.csv`.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct EpochRow {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub train_mae: f64,
    pub valid_loss: f64,
    pub valid_accuracy: f64,
    pub valid_mae: f64,
    pub elapsed_ms: u64,
}

impl From<&EpochStats> for EpochRow {
    fn from(stats: &EpochStats) -> Self {
        EpochRow {
            epoch: stats.epoch,
            train_loss: stats.train.loss,
            train_accuracy: stats.train.accuracy,
            train_mae: stats.train.mae,
            valid_loss: stats.valid.loss,
            valid_accuracy: stats.valid.accuracy,
            valid_mae: stats.valid.mae,
            elapsed_ms: stats.elapsed_ms,
        }
    }
}

/// The four numbers a run reports back to the trade-off sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub train_accuracy: f64,
    pub train_mae: f64,
    pub valid_accuracy: f64,
    pub valid_mae: f64,
}
