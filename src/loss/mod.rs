pub mod cross_entropy;
pub mod squared_error;
pub mod zoom;

pub use cross_entropy::CrossEntropyLoss;
pub use squared_error::SquaredErrorLoss;
pub use zoom::{evaluate_loss, get_loss, EvalOutput, LossOutput, ZoomPrediction};
