//! Trade-off sweep: one full training run per trade-off value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MagnifierError, Result};
use crate::label::WindowSize;
use crate::metrics::RunResult;
use crate::store;

/// Sweep values are rounded to `1 / VALUES_PER_UNIT`.
const VALUES_PER_UNIT: f64 = 1e9;
const RESOLUTION: f64 = 1.0 / VALUES_PER_UNIT;

/// Whether the sweep's upper bound is itself swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    Inclusive,
    Exclusive,
}

/// Linear schedule `start, start + step, ...` up to `bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSchedule {
    pub start: f64,
    pub step: f64,
    pub bound: f64,
    pub bound_kind: BoundKind,
}

impl SweepSchedule {
    pub fn inclusive(start: f64, step: f64, bound: f64) -> Self {
        SweepSchedule { start, step, bound, bound_kind: BoundKind::Inclusive }
    }

    pub fn exclusive(start: f64, step: f64, bound: f64) -> Self {
        SweepSchedule { start, step, bound, bound_kind: BoundKind::Exclusive }
    }

    fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) || !self.start.is_finite() || !self.bound.is_finite() {
            return Err(MagnifierError::InvalidParameter(format!(
                "sweep needs a positive step and finite bounds, got {:?}",
                self
            )));
        }
        if self.step < RESOLUTION {
            return Err(MagnifierError::InvalidParameter(format!(
                "sweep step {} is below the {} resolution of its values",
                self.step, RESOLUTION
            )));
        }
        Ok(())
    }

    /// The `k`-th value, rounded to 1e-9 so `0.1 * 3` reads as `0.3`.
    fn value(&self, k: usize) -> f64 {
        ((self.start + k as f64 * self.step) * VALUES_PER_UNIT).round() / VALUES_PER_UNIT
    }

    fn len(&self) -> usize {
        let eps = RESOLUTION * self.step;
        // Tested on the yielded, rounded values.
        let keep = |k: usize| {
            let v = self.value(k);
            match self.bound_kind {
                BoundKind::Inclusive => v <= self.bound + eps,
                BoundKind::Exclusive => v < self.bound - eps,
            }
        };
        if !keep(0) {
            return 0;
        }
        let mut k = ((self.bound - self.start) / self.step).floor().max(0.0) as usize;
        // Floor can land one step off either way on inexact steps.
        while keep(k + 1) {
            k += 1;
        }
        while k > 0 && !keep(k) {
            k -= 1;
        }
        k + 1
    }
}

/// Lazy iterator over a schedule's values. Cheap to clone and restart.
#[derive(Debug, Clone)]
pub struct SweepValues {
    schedule: SweepSchedule,
    next: usize,
    len: usize,
}

impl Iterator for SweepValues {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next >= self.len {
            return None;
        }
        let value = self.schedule.value(self.next);
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SweepValues {}

/// One line of the sweep table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub trade_off: f64,
    pub train_accuracy: f64,
    pub train_mae: f64,
    pub valid_accuracy: f64,
    pub valid_mae: f64,
}

#[derive(Serialize)]
struct SweepReport<'a> {
    window: WindowSize,
    nb_epochs: usize,
    batch_size: usize,
    schedule: SweepSchedule,
    rows: &'a [SweepRow],
}

/// Drives a trade-off sweep and records one [`RunResult`] per value.
#[derive(Debug, Clone)]
pub struct TradeOffSweep {
    schedule: SweepSchedule,
    window: WindowSize,
    nb_epochs: usize,
    batch_size: usize,
    rows: Vec<SweepRow>,
}

impl TradeOffSweep {
    pub fn new(schedule: SweepSchedule, window: WindowSize, nb_epochs: usize, batch_size: usize) -> Result<Self> {
        schedule.validate()?;
        Ok(TradeOffSweep {
            schedule,
            window,
            nb_epochs,
            batch_size,
            rows: Vec::new(),
        })
    }

    /// A fresh pass over the trade-off values, always in the same order.
    pub fn values(&self) -> SweepValues {
        SweepValues {
            schedule: self.schedule,
            next: 0,
            len: self.schedule.len(),
        }
    }

    /// Value the next [`add`](Self::add) must report, if any remain.
    pub fn expected_next(&self) -> Option<f64> {
        self.values().nth(self.rows.len())
    }

    /// Records the outcome of the run for `trade_off`, which must be the
    /// next value of the sequence.
    pub fn add(&mut self, trade_off: f64, result: RunResult) -> Result<()> {
        let expected = self.expected_next();
        if expected != Some(trade_off) {
            return Err(MagnifierError::SweepOrder { expected, got: trade_off });
        }
        self.rows.push(SweepRow {
            trade_off,
            train_accuracy: result.train_accuracy,
            train_mae: result.train_mae,
            valid_accuracy: result.valid_accuracy,
            valid_mae: result.valid_mae,
        });
        Ok(())
    }

    pub fn rows(&self) -> &[SweepRow] {
        &self.rows
    }

    /// Row with the best validation accuracy; ties go to the lower MAE.
    pub fn best(&self) -> Option<&SweepRow> {
        self.rows.iter().max_by(|a, b| {
            a.valid_accuracy
                .total_cmp(&b.valid_accuracy)
                .then(b.valid_mae.total_cmp(&a.valid_mae))
        })
    }

    pub fn file_stem(&self) -> String {
        format!(
            "window_{}_epoch_{}_batch_{}",
            self.window.tag(),
            self.nb_epochs,
            self.batch_size
        )
    }

    /// Writes `<stem>.json` and `<stem>.csv` under `root`. Existing files are
    /// a `PathConflict`; sweep tables are never overwritten.
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let json_path = root.join(format!("{}.json", self.file_stem()));
        let csv_path = root.join(format!("{}.csv", self.file_stem()));
        if csv_path.exists() {
            return Err(MagnifierError::PathConflict { path: csv_path });
        }
        store::write_new_json(
            &json_path,
            &SweepReport {
                window: self.window,
                nb_epochs: self.nb_epochs,
                batch_size: self.batch_size,
                schedule: self.schedule,
                rows: &self.rows,
            },
        )?;
        store::write_new_csv(&csv_path, &self.rows)?;
        info!(path = %json_path.display(), runs = self.rows.len(), "saved trade-off sweep");
        Ok(json_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(schedule: SweepSchedule) -> Vec<f64> {
        TradeOffSweep::new(schedule, WindowSize::square(50), 2, 3).unwrap().values().collect()
    }

    #[test]
    fn inexact_steps_do_not_drop_the_bound() {
        let v = values(SweepSchedule::inclusive(0.0, 0.1, 1.0));
        assert_eq!(v.len(), 11);
        assert_eq!(v[10], 1.0);
        assert_eq!(values(SweepSchedule::exclusive(0.0, 0.1, 1.0)).len(), 10);
        assert!(values(SweepSchedule::inclusive(0.5, 0.1, 0.2)).is_empty());
    }

    #[test]
    fn rejects_non_positive_step() {
        let sched = SweepSchedule::inclusive(0.0, 0.0, 1.0);
        assert!(TradeOffSweep::new(sched, WindowSize::square(50), 2, 3).is_err());
    }

    #[test]
    fn steps_below_the_resolution_are_rejected() {
        let sched = SweepSchedule::inclusive(0.0, 4e-10, 1e-9);
        assert!(matches!(
            TradeOffSweep::new(sched, WindowSize::square(50), 2, 3),
            Err(MagnifierError::InvalidParameter(_))
        ));

        // At the resolution every value is distinct and inside the bound.
        let v = values(SweepSchedule::exclusive(0.0, 1e-9, 3e-9));
        assert_eq!(v.len(), 3);
        assert!(v.windows(2).all(|w| w[0] < w[1]));
        assert!(v.iter().all(|&x| x < 3e-9));
    }
}
