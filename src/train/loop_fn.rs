use std::sync::mpsc;

use image::RgbImage;
use rand::RngCore;
use tracing::{debug, info};

use crate::data::BatchProvider;
use crate::error::Result;
use crate::label::{FrameLabel, WindowLabel};
use crate::loss::{evaluate_loss, get_loss, ZoomPrediction};
use crate::metrics::{EpochStats, MetricsAggregator, Split};
use crate::model::{Model, TrainableGuard};
use crate::optim::Optimizer;
use crate::sample::{lane_to_input, sample_lanes, SamplingParams};

/// Progress is logged every this many training batches.
const LOG_EVERY: usize = 100;

/// Per-run knobs of [`train_loop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopParams {
    pub nb_epochs: usize,
    pub sampling: SamplingParams,
    pub trade_off: f64,
    /// Standardize every sub-window before the forward pass.
    pub standardize: bool,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `model` for `params.nb_epochs` epochs.
///
/// Each epoch reshuffles the training set, runs every training batch through
/// sampling, [`get_loss`] and one optimizer step, then scores the validation
/// set with [`evaluate_loss`].
///
/// # Arguments
/// - `model`: trained in place; held trainable while training batches run
/// - `optimizer`: applies the summed batch gradients
/// - `train_set`: reshuffled with `rng` at the top of every epoch
/// - `valid_set`: read in order, never reshuffled
/// - `params`: epochs, sampling, trade-off and standardization
/// - `metrics`: receives every batch update and closes each epoch
/// - `rng`: drives reshuffling and sub-window placement
/// - `progress`: optional channel receiving one [`EpochStats`] per epoch
///
/// # Early termination
/// The loop breaks after the current epoch if the `progress` receiver has
/// been dropped. Metrics recorded so far are kept.
///
/// # Errors
/// The first error from a batch provider, the sampler, the loss, the
/// optimizer or a metric update aborts the loop and is returned as is.
#[allow(clippy::too_many_arguments)]
pub fn train_loop<M, O, T, V>(
    model: &mut M,
    optimizer: &mut O,
    train_set: &mut T,
    valid_set: &mut V,
    params: &LoopParams,
    metrics: &mut MetricsAggregator,
    rng: &mut dyn RngCore,
    progress: Option<&mpsc::Sender<EpochStats>>,
) -> Result<()>
where
    M: Model + ?Sized,
    O: Optimizer + ?Sized,
    T: BatchProvider + ?Sized,
    V: BatchProvider + ?Sized,
{
    for epoch in 1..=params.nb_epochs {
        train_set.reshuffle(rng);

        info!(epoch, total = params.nb_epochs, "training");
        {
            let mut model = TrainableGuard::new(&mut *model, true);
            let nb_batches = train_set.len();
            for idx in 0..nb_batches {
                if idx % LOG_EVERY == 0 {
                    info!("{}% of the training done", 100 * idx / nb_batches);
                }
                let batch = train_set.get(idx)?;
                let (inputs, labels) = sub_windows(&batch.lanes, &batch.labels, params, rng)?;
                let out = get_loss(&mut *model, &inputs, &labels, params.trade_off)?;
                optimizer.step(model.parameters_mut(), &out.gradients)?;

                debug!(batch = idx, loss = out.loss, windows = labels.len(), "train batch");
                record(metrics, &labels, &out.predictions, out.loss, Split::Train)?;
            }
        }

        info!(epoch, total = params.nb_epochs, "validation");
        for idx in 0..valid_set.len() {
            let batch = valid_set.get(idx)?;
            let (inputs, labels) = sub_windows(&batch.lanes, &batch.labels, params, rng)?;
            let out = evaluate_loss(&mut *model, &inputs, &labels, params.trade_off)?;
            record(metrics, &labels, &out.predictions, out.loss, Split::Valid)?;
        }

        let stats = metrics.on_epoch_end();
        info!(
            epoch,
            train_loss = stats.train.loss,
            train_accuracy = stats.train.accuracy,
            valid_loss = stats.valid.loss,
            valid_accuracy = stats.valid.accuracy,
            elapsed_ms = stats.elapsed_ms,
            "epoch done"
        );

        if let Some(tx) = progress {
            if tx.send(stats).is_err() {
                info!(epoch, "progress receiver dropped, stopping");
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch helpers
// ---------------------------------------------------------------------------

fn sub_windows(
    lanes: &[RgbImage],
    labels: &[FrameLabel],
    params: &LoopParams,
    rng: &mut dyn RngCore,
) -> Result<(Vec<Vec<f64>>, Vec<WindowLabel>)> {
    let (subs, sub_labels) = sample_lanes(lanes, labels, &params.sampling, rng)?;
    let inputs = subs.iter().map(|s| lane_to_input(s, params.standardize)).collect();
    Ok((inputs, sub_labels))
}

fn record(
    metrics: &mut MetricsAggregator,
    labels: &[WindowLabel],
    predictions: &[ZoomPrediction],
    loss: f64,
    split: Split,
) -> Result<()> {
    let truth: Vec<_> = labels.iter().map(|l| l.head).collect();
    let heads: Vec<_> = predictions.iter().map(ZoomPrediction::head).collect();
    let directions: Vec<f64> = labels.iter().map(WindowLabel::direction_value).collect();
    let predicted: Vec<f64> = predictions.iter().map(|p| p.direction).collect();

    metrics.update_loss(loss, labels.len(), split);
    metrics.update_acc(&truth, &heads, split)?;
    metrics.update_mae(&directions, &predicted, split)?;
    metrics.update_nb_batches(split);
    Ok(())
}
