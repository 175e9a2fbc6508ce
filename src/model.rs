//! The boundary between the training core and a trainable zoom model.
//!
//! The core never looks inside a model: it forwards flattened sub-windows,
//! hands back `∂L/∂output`, and passes the returned [`Gradients`] together
//! with [`Model::parameters_mut`] to an optimizer.

use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::error::{MagnifierError, Result};
use crate::math::Matrix;

/// How a forward pass is run. `Eval` keeps no state for back-propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// One gradient per trainable parameter, in `parameters_mut()` order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gradients(pub Vec<Matrix>);

impl Gradients {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sums `other` into `self`; an empty `self` adopts `other`.
    pub fn accumulate(&mut self, other: Gradients) -> Result<()> {
        if self.0.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.0.len() != other.0.len()
            || self.0.iter().zip(other.0.iter()).any(|(a, b)| !a.same_shape(b))
        {
            return Err(MagnifierError::DataShape(
                "gradient shapes differ between samples".into(),
            ));
        }
        for (acc, grad) in self.0.iter_mut().zip(other.0.iter()) {
            acc.add_assign(grad);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matrix> {
        self.0.iter()
    }
}

/// An opaque trainable model.
pub trait Model {
    /// Runs one flattened sub-window through the model.
    fn forward(&mut self, input: &[f64], mode: Mode) -> Result<Vec<f64>>;

    /// Back-propagates `output_grad` through the last `Mode::Train` forward.
    fn backward(&mut self, output_grad: &[f64]) -> Result<Gradients>;

    fn trainable(&self) -> bool;

    fn set_trainable(&mut self, trainable: bool);

    fn parameters_mut(&mut self) -> Vec<&mut Matrix>;

    fn save_weights(&self, path: &Path) -> Result<()>;

    fn load_weights(&mut self, path: &Path) -> Result<()>;
}

/// Holds a model with its trainable flag forced to a value, restoring the
/// previous flag when dropped (also on early returns and unwinding).
pub struct TrainableGuard<'a, M: Model + ?Sized> {
    model: &'a mut M,
    previous: bool,
}

impl<'a, M: Model + ?Sized> TrainableGuard<'a, M> {
    pub fn new(model: &'a mut M, trainable: bool) -> Self {
        let previous = model.trainable();
        model.set_trainable(trainable);
        TrainableGuard { model, previous }
    }

    pub fn frozen(model: &'a mut M) -> Self {
        TrainableGuard::new(model, false)
    }
}

impl<M: Model + ?Sized> Deref for TrainableGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: Model + ?Sized> DerefMut for TrainableGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.model
    }
}

impl<M: Model + ?Sized> Drop for TrainableGuard<'_, M> {
    fn drop(&mut self) {
        self.model.set_trainable(self.previous);
    }
}
