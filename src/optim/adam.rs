use crate::error::Result;
use crate::math::Matrix;
use crate::model::Gradients;
use crate::optim::{check_alignment, Optimizer};

/// Adam with bias-corrected first and second moments kept per parameter.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    step: i32,
    first: Vec<Matrix>,
    second: Vec<Matrix>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            first: Vec::new(),
            second: Vec::new(),
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Adam::new(1e-3)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<&mut Matrix>, grads: &Gradients) -> Result<()> {
        if grads.is_empty() {
            return Ok(());
        }
        check_alignment(&params, grads)?;
        if self.first.len() != grads.len() {
            self.first = grads.iter().map(|g| Matrix::zeros(g.rows, g.cols)).collect();
            self.second = self.first.clone();
            self.step = 0;
        }

        self.step += 1;
        let correction1 = 1.0 - self.beta1.powi(self.step);
        let correction2 = 1.0 - self.beta2.powi(self.step);

        for (((param, grad), m), v) in params
            .into_iter()
            .zip(grads.iter())
            .zip(self.first.iter_mut())
            .zip(self.second.iter_mut())
        {
            for (((p, g), m), v) in param
                .iter_mut()
                .zip(grad.iter())
                .zip(m.iter_mut())
                .zip(v.iter_mut())
            {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / correction1;
                let v_hat = *v / correction2;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
        Ok(())
    }
}
