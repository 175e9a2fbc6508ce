use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;

/// The two zoom model variants, differing only in depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    Simple,
    Deep,
}

impl ModelVariant {
    /// Directory tag used to namespace weights and reports.
    pub fn tag(self) -> &'static str {
        match self {
            ModelVariant::Simple => "simple_model",
            ModelVariant::Deep => "deep_model",
        }
    }

    pub fn spec(self) -> ZoomNetworkSpec {
        let hidden = match self {
            ModelVariant::Simple => vec![32],
            ModelVariant::Deep => vec![64, 32, 32],
        };
        ZoomNetworkSpec {
            variant: self,
            hidden,
            activation: ActivationFunction::ReLU,
        }
    }
}

/// Hidden layout of a zoom network. Input and output sizes come from the
/// window the network is built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomNetworkSpec {
    pub variant: ModelVariant,
    /// Hidden layer sizes, input side first.
    pub hidden: Vec<usize>,
    pub activation: ActivationFunction,
}

impl ZoomNetworkSpec {
    /// `(input_size, size, activation)` for every layer, output layer last.
    pub fn layer_shapes(&self, input_len: usize, output_len: usize) -> Vec<(usize, usize, ActivationFunction)> {
        let mut shapes = Vec::with_capacity(self.hidden.len() + 1);
        let mut fan_in = input_len;
        for &size in &self.hidden {
            shapes.push((fan_in, size, self.activation));
            fan_in = size;
        }
        shapes.push((fan_in, output_len, ActivationFunction::Identity));
        shapes
    }
}
