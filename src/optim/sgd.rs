use crate::error::Result;
use crate::math::Matrix;
use crate::model::Gradients;
use crate::optim::{check_alignment, Optimizer};

/// Plain gradient descent: `p -= lr · g`.
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<&mut Matrix>, grads: &Gradients) -> Result<()> {
        if grads.is_empty() {
            return Ok(());
        }
        check_alignment(&params, grads)?;
        for (param, grad) in params.into_iter().zip(grads.iter()) {
            for (p, g) in param.iter_mut().zip(grad.iter()) {
                *p -= self.learning_rate * g;
            }
        }
        Ok(())
    }
}
