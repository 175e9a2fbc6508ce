//! Composite loss of the zoom model.
//!
//! For every sub-window `i` the model emits `width + 1` x-logits,
//! `height + 1` y-logits (the last class of each block meaning "no head in
//! this window") and one direction scalar. With
//! `ce_i = CE(x) + CE(y)` the batch loss is
//!
//! ```text
//! Σ ce_i²  +  trade_off · Σ (direction_i - target_i)²
//! ```
//!
//! The classification part is the squared norm of the per-window
//! cross-entropy vector, so both terms scale with the batch size.

use serde::{Deserialize, Serialize};

use crate::error::{MagnifierError, Result};
use crate::label::{WindowLabel, WindowSize};
use crate::loss::cross_entropy::{argmax, softmax, CrossEntropyLoss};
use crate::loss::squared_error::SquaredErrorLoss;
use crate::model::{Gradients, Mode, Model, TrainableGuard};

/// Decoded output of the zoom model for one sub-window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomPrediction {
    pub x_probs: Vec<f64>,
    pub y_probs: Vec<f64>,
    pub direction: f64,
}

impl ZoomPrediction {
    pub fn decode(output: &[f64], window: WindowSize) -> Result<ZoomPrediction> {
        let nx = window.width as usize + 1;
        let ny = window.height as usize + 1;
        if output.len() != window.output_len() {
            return Err(MagnifierError::DataShape(format!(
                "model produced {} outputs, window {}x{} needs {}",
                output.len(),
                window.width,
                window.height,
                window.output_len()
            )));
        }
        Ok(ZoomPrediction {
            x_probs: softmax(&output[..nx]),
            y_probs: softmax(&output[nx..nx + ny]),
            direction: output[nx + ny],
        })
    }

    /// Most likely head pixel, `None` when either axis picks "absent".
    pub fn head(&self) -> Option<(u32, u32)> {
        let x = argmax(&self.x_probs);
        let y = argmax(&self.y_probs);
        if x + 1 == self.x_probs.len() || y + 1 == self.y_probs.len() {
            None
        } else {
            Some((x as u32, y as u32))
        }
    }
}

/// Result of [`get_loss`].
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: f64,
    pub classification: f64,
    /// `None` when the trade-off is zero and the term was never evaluated.
    pub regression: Option<f64>,
    /// Summed over the batch, aligned with `Model::parameters_mut`.
    pub gradients: Gradients,
    pub predictions: Vec<ZoomPrediction>,
}

/// Result of [`evaluate_loss`].
#[derive(Debug, Clone)]
pub struct EvalOutput {
    pub loss: f64,
    pub classification: f64,
    pub regression: Option<f64>,
    pub predictions: Vec<ZoomPrediction>,
}

// ---------------------------------------------------------------------------
// Per-window terms
// ---------------------------------------------------------------------------

struct WindowTerms {
    classification: f64,
    regression: Option<f64>,
    output_grad: Vec<f64>,
    prediction: ZoomPrediction,
}

fn window_terms(output: &[f64], label: &WindowLabel, trade_off: f64) -> Result<WindowTerms> {
    let prediction = ZoomPrediction::decode(output, label.window)?;
    let (cx, cy) = label.classes();

    let ce = CrossEntropyLoss::loss(&prediction.x_probs, cx) + CrossEntropyLoss::loss(&prediction.y_probs, cy);
    // ∂(ce²)/∂z = 2·ce·(p - onehot)
    let mut output_grad: Vec<f64> = CrossEntropyLoss::derivative(&prediction.x_probs, cx)
        .into_iter()
        .chain(CrossEntropyLoss::derivative(&prediction.y_probs, cy))
        .map(|g| 2.0 * ce * g)
        .collect();

    let target = label.direction_value();
    let regression = if trade_off != 0.0 {
        output_grad.push(trade_off * SquaredErrorLoss::derivative(prediction.direction, target));
        Some(SquaredErrorLoss::loss(prediction.direction, target))
    } else {
        output_grad.push(0.0);
        None
    };

    Ok(WindowTerms {
        classification: ce * ce,
        regression,
        output_grad,
        prediction,
    })
}

fn check_batch(inputs: &[Vec<f64>], labels: &[WindowLabel]) -> Result<()> {
    if inputs.len() != labels.len() {
        return Err(MagnifierError::DataShape(format!(
            "{} inputs but {} labels",
            inputs.len(),
            labels.len()
        )));
    }
    Ok(())
}

fn total(classification: f64, regression: Option<f64>, trade_off: f64) -> f64 {
    classification + regression.map_or(0.0, |r| trade_off * r)
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Training loss: forwards every sub-window in `Mode::Train`, back-propagates
/// and sums the gradients. The caller's optimizer applies them.
///
/// # Arguments
/// - `model`: must be trainable, since every window is back-propagated
/// - `inputs`: flattened sub-windows, one per label
/// - `labels`: window-space targets; each label's window fixes the output layout
/// - `trade_off`: weight of the direction term; at `0.0` the term is skipped
///   and the direction output gets a zero gradient
///
/// # Errors
/// `DataShape` if `inputs` and `labels` differ in length or an output does
/// not match its label's window. Model errors propagate.
pub fn get_loss<M: Model + ?Sized>(
    model: &mut M,
    inputs: &[Vec<f64>],
    labels: &[WindowLabel],
    trade_off: f64,
) -> Result<LossOutput> {
    check_batch(inputs, labels)?;

    let mut classification = 0.0;
    let mut regression: Option<f64> = None;
    let mut gradients = Gradients::default();
    let mut predictions = Vec::with_capacity(inputs.len());

    for (input, label) in inputs.iter().zip(labels.iter()) {
        let output = model.forward(input, Mode::Train)?;
        let terms = window_terms(&output, label, trade_off)?;
        gradients.accumulate(model.backward(&terms.output_grad)?)?;

        classification += terms.classification;
        if let Some(r) = terms.regression {
            *regression.get_or_insert(0.0) += r;
        }
        predictions.push(terms.prediction);
    }

    Ok(LossOutput {
        loss: total(classification, regression, trade_off),
        classification,
        regression,
        gradients,
        predictions,
    })
}

/// Evaluation loss: same formula as [`get_loss`], no gradients.
///
/// # Side effects
/// None on the model's parameters. The model is frozen for the duration of
/// the call and its trainable flag restored afterwards, also when the
/// computation fails.
///
/// # Errors
/// Same as [`get_loss`].
pub fn evaluate_loss<M: Model + ?Sized>(
    model: &mut M,
    inputs: &[Vec<f64>],
    labels: &[WindowLabel],
    trade_off: f64,
) -> Result<EvalOutput> {
    check_batch(inputs, labels)?;
    let mut model = TrainableGuard::frozen(model);

    let mut classification = 0.0;
    let mut regression: Option<f64> = None;
    let mut predictions = Vec::with_capacity(inputs.len());

    for (input, label) in inputs.iter().zip(labels.iter()) {
        let output = model.forward(input, Mode::Eval)?;
        let terms = window_terms(&output, label, trade_off)?;
        classification += terms.classification;
        if let Some(r) = terms.regression {
            *regression.get_or_insert(0.0) += r;
        }
        predictions.push(terms.prediction);
    }

    Ok(EvalOutput {
        loss: total(classification, regression, trade_off),
        classification,
        regression,
        predictions,
    })
}
