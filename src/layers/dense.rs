use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::error::{MagnifierError, Result};
use crate::math::Matrix;
use crate::model::Mode;

/// Values kept from a `Mode::Train` forward pass for back-propagation.
#[derive(Debug, Clone)]
struct LayerCache {
    input: Matrix,
    pre_activation: Matrix,
}

/// Fully connected layer: `a = σ(x·W + b)` with `W` of shape (input, size).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
    #[serde(skip)]
    cache: Option<LayerCache>,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        let weights = match activation {
            ActivationFunction::ReLU => Matrix::he(input_size, size, rng),
            ActivationFunction::Identity => Matrix::xavier(input_size, size, rng),
        };
        Layer {
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation,
            cache: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn size(&self) -> usize {
        self.weights.cols
    }

    pub fn forward(&mut self, input: Matrix, mode: Mode) -> Matrix {
        let z = &(&input * &self.weights) + &self.biases;
        let a = z.map(|x| self.activator.function(x));
        self.cache = match mode {
            Mode::Train => Some(LayerCache { input, pre_activation: z }),
            Mode::Eval => None,
        };
        a
    }

    /// Returns `(weights_grad, biases_grad, input_delta)` for `delta = ∂L/∂a`.
    pub fn backward(&self, delta: &Matrix) -> Result<(Matrix, Matrix, Matrix)> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            MagnifierError::Model("backward called without a training forward pass".into())
        })?;
        // δ = ∂L/∂a ⊙ σ'(z)
        let layer_delta = delta.hadamard(&cache.pre_activation.map(|x| self.activator.derivative(x)));
        let weights_grad = &cache.input.transpose() * &layer_delta;
        let input_delta = &layer_delta * &self.weights.transpose();
        Ok((weights_grad, layer_delta, input_delta))
    }

    pub fn clear_cache(&mut self) {
        self.cache = None;
    }
}
