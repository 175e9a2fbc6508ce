/// Categorical cross-entropy over a softmax block of logits.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// `-log(probs[class] + eps)`, i.e. the cross-entropy against a one-hot target.
    pub fn loss(probs: &[f64], class: usize) -> f64 {
        -(probs[class] + EPS).ln()
    }

    /// Gradient of softmax + cross-entropy w.r.t. the logits:
    ///   ∂L/∂z_i = probs[i] - onehot(class)[i]
    pub fn derivative(probs: &[f64], class: usize) -> Vec<f64> {
        probs
            .iter()
            .enumerate()
            .map(|(i, p)| if i == class { p - 1.0 } else { *p })
            .collect()
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
