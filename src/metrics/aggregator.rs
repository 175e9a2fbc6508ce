use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MagnifierError, Result};
use crate::label::WindowSize;
use crate::metrics::epoch_stats::{EpochRow, EpochStats, RunResult, SplitStats};
use crate::store;

/// Which stream a metric update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
}

/// When a predicted head counts as correct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyRule {
    /// Maximum Euclidean pixel distance; 0 requires an exact match.
    pub tolerance: f64,
}

impl AccuracyRule {
    pub fn exact() -> Self {
        AccuracyRule { tolerance: 0.0 }
    }

    pub fn matches(&self, truth: Option<(u32, u32)>, pred: Option<(u32, u32)>) -> bool {
        match (truth, pred) {
            (None, None) => true,
            (Some((tx, ty)), Some((px, py))) => {
                let dx = tx as f64 - px as f64;
                let dy = ty as f64 - py as f64;
                (dx * dx + dy * dy).sqrt() <= self.tolerance
            }
            _ => false,
        }
    }
}

impl Default for AccuracyRule {
    fn default() -> Self {
        AccuracyRule::exact()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    loss_sum: f64,
    loss_count: usize,
    correct: usize,
    acc_count: usize,
    abs_error_sum: f64,
    mae_count: usize,
    batches: usize,
}

impl Accumulator {
    fn finalize(&self) -> SplitStats {
        SplitStats {
            loss: ratio(self.loss_sum, self.loss_count),
            accuracy: ratio(self.correct as f64, self.acc_count),
            mae: ratio(self.abs_error_sum, self.mae_count),
            batches: self.batches,
            samples: self.acc_count,
        }
    }
}

fn same_len(what: &str, truth: usize, pred: usize) -> Result<()> {
    if truth != pred {
        return Err(MagnifierError::DataShape(format!(
            "{} targets but {} {} predictions",
            truth, pred, what
        )));
    }
    Ok(())
}

fn ratio(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Streaming loss / accuracy / MAE statistics for the train and validation
/// splits, rolled up once per epoch.
///
/// All ratios are count-weighted: an undersized last batch or a varying
/// number of sub-windows per lane weighs exactly as many samples as it holds.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    window: WindowSize,
    nb_epochs: usize,
    batch_size: usize,
    rule: AccuracyRule,
    train: Accumulator,
    valid: Accumulator,
    history: Vec<EpochStats>,
    epoch_start: Instant,
}

impl MetricsAggregator {
    pub fn new(window: WindowSize, nb_epochs: usize, batch_size: usize, rule: AccuracyRule) -> Self {
        MetricsAggregator {
            window,
            nb_epochs,
            batch_size,
            rule,
            train: Accumulator::default(),
            valid: Accumulator::default(),
            history: Vec::new(),
            epoch_start: Instant::now(),
        }
    }

    fn acc_mut(&mut self, split: Split) -> &mut Accumulator {
        match split {
            Split::Train => &mut self.train,
            Split::Valid => &mut self.valid,
        }
    }

    /// `value` is the summed loss of `count` sub-windows.
    pub fn update_loss(&mut self, value: f64, count: usize, split: Split) {
        let acc = self.acc_mut(split);
        acc.loss_sum += value;
        acc.loss_count += count;
    }

    /// Fails with `DataShape` unless every sub-window has one prediction.
    pub fn update_acc(
        &mut self,
        truth: &[Option<(u32, u32)>],
        pred: &[Option<(u32, u32)>],
        split: Split,
    ) -> Result<()> {
        same_len("accuracy", truth.len(), pred.len())?;
        let rule = self.rule;
        let correct = truth
            .iter()
            .zip(pred.iter())
            .filter(|(t, p)| rule.matches(**t, **p))
            .count();
        let acc = self.acc_mut(split);
        acc.correct += correct;
        acc.acc_count += truth.len();
        Ok(())
    }

    pub fn update_mae(&mut self, truth: &[f64], pred: &[f64], split: Split) -> Result<()> {
        same_len("direction", truth.len(), pred.len())?;
        let abs_error: f64 = truth.iter().zip(pred.iter()).map(|(t, p)| (t - p).abs()).sum();
        let acc = self.acc_mut(split);
        acc.abs_error_sum += abs_error;
        acc.mae_count += truth.len();
        Ok(())
    }

    pub fn update_nb_batches(&mut self, split: Split) {
        self.acc_mut(split).batches += 1;
    }

    /// Finalizes the running accumulators into a new history entry and
    /// resets them for the next epoch.
    pub fn on_epoch_end(&mut self) -> EpochStats {
        let stats = EpochStats {
            epoch: self.history.len() + 1,
            total_epochs: self.nb_epochs,
            train: self.train.finalize(),
            valid: self.valid.finalize(),
            elapsed_ms: self.epoch_start.elapsed().as_millis() as u64,
        };
        self.history.push(stats);
        self.train = Accumulator::default();
        self.valid = Accumulator::default();
        self.epoch_start = Instant::now();
        stats
    }

    pub fn history(&self) -> &[EpochStats] {
        &self.history
    }

    /// Accuracy and MAE of the last finished epoch, if any.
    pub fn get_final_result(&self) -> Option<RunResult> {
        self.history.last().map(|last| RunResult {
            train_accuracy: last.train.accuracy,
            train_mae: last.train.mae,
            valid_accuracy: last.valid.accuracy,
            valid_mae: last.valid.mae,
        })
    }

    /// Directory name of a run's report.
    pub fn report_name(&self, run_id: usize, trade_off_label: &str) -> String {
        format!(
            "window_{}_epoch_{}_batch_{}_{}{}",
            self.window.tag(), self.nb_epochs, self.batch_size, trade_off_label, run_id
        )
    }

    /// Writes `history.json` and `history.csv` into a new directory under
    /// `root`. Fails with `PathConflict` if the report already exists.
    pub fn save(&self, root: &Path, run_id: usize, trade_off_label: &str) -> Result<PathBuf> {
        let dir = store::create_new_dir(&root.join(self.report_name(run_id, trade_off_label)))?;
        store::write_new_json(&dir.join("history.json"), &self.history)?;
        let rows: Vec<EpochRow> = self.history.iter().map(EpochRow::from).collect();
        store::write_new_csv(&dir.join("history.csv"), &rows)?;
        info!(path = %dir.display(), epochs = self.history.len(), "saved metrics report");
        Ok(dir)
    }
}
