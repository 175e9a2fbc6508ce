/// Squared error on a single regression output.
pub struct SquaredErrorLoss;

impl SquaredErrorLoss {
    /// (predicted - expected)²
    pub fn loss(predicted: f64, expected: f64) -> f64 {
        (predicted - expected).powi(2)
    }

    /// 2 · (predicted - expected)
    pub fn derivative(predicted: f64, expected: f64) -> f64 {
        2.0 * (predicted - expected)
    }
}
