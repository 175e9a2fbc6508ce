pub mod adam;
pub mod sgd;

use serde::{Deserialize, Serialize};

use crate::error::{MagnifierError, Result};
use crate::math::Matrix;
use crate::model::Gradients;

pub use adam::Adam;
pub use sgd::Sgd;

/// Consumes `(gradients, trainable parameters)` pairs and updates the
/// parameters in place. An empty gradient set is a no-op.
pub trait Optimizer {
    fn step(&mut self, params: Vec<&mut Matrix>, grads: &Gradients) -> Result<()>;
}

/// Optimizer selection as stored in the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd { learning_rate: f64 },
    Adam { learning_rate: f64 },
}

impl OptimizerKind {
    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::Sgd { learning_rate } => Box::new(Sgd::new(learning_rate)),
            OptimizerKind::Adam { learning_rate } => Box::new(Adam::new(learning_rate)),
        }
    }
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Adam { learning_rate: 1e-3 }
    }
}

fn check_alignment(params: &[&mut Matrix], grads: &Gradients) -> Result<()> {
    let aligned = params.len() == grads.len()
        && params.iter().zip(grads.iter()).all(|(p, g)| p.same_shape(g));
    if aligned {
        Ok(())
    } else {
        Err(MagnifierError::DataShape(format!(
            "{} gradients do not line up with {} parameters",
            grads.len(),
            params.len()
        )))
    }
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn step(&mut self, params: Vec<&mut Matrix>, grads: &Gradients) -> Result<()> {
        (**self).step(params, grads)
    }
}
