use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MagnifierError, Result};
use crate::label::WindowSize;
use crate::layers::Layer;
use crate::math::Matrix;
use crate::model::{Gradients, Mode, Model};
use crate::network::metadata::ModelMetadata;
use crate::network::spec::ZoomNetworkSpec;
use crate::store;

/// Dense zoom model: flattened RGB window in, `[x logits | y logits | direction]` out.
#[derive(Debug, Clone)]
pub struct ZoomNetwork {
    layers: Vec<Layer>,
    metadata: ModelMetadata,
    trainable: bool,
}

#[derive(Serialize)]
struct WeightsRef<'a> {
    metadata: &'a ModelMetadata,
    layers: &'a [Layer],
}

#[derive(Deserialize)]
struct WeightsFile {
    metadata: ModelMetadata,
    layers: Vec<Layer>,
}

impl ZoomNetwork {
    /// Builds a freshly initialised network for `window`.
    pub fn new<R: Rng + ?Sized>(spec: &ZoomNetworkSpec, window: WindowSize, rng: &mut R) -> ZoomNetwork {
        let layers = spec
            .layer_shapes(window.input_len(), window.output_len())
            .into_iter()
            .map(|(input_size, size, activation)| Layer::new(input_size, size, activation, rng))
            .collect();
        ZoomNetwork {
            layers,
            metadata: ModelMetadata {
                variant: spec.variant,
                window,
                description: None,
            },
            trainable: true,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn input_len(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    fn output_len(&self) -> usize {
        self.layers.last().map_or(0, Layer::size)
    }
}

impl Model for ZoomNetwork {
    fn forward(&mut self, input: &[f64], mode: Mode) -> Result<Vec<f64>> {
        if input.len() != self.input_len() {
            return Err(MagnifierError::DataShape(format!(
                "network expects {} inputs, got {}",
                self.input_len(),
                input.len()
            )));
        }
        let mut current = Matrix::row(input.to_vec());
        for layer in &mut self.layers {
            current = layer.forward(current, mode);
        }
        Ok(current.data.into_iter().next().unwrap_or_default())
    }

    fn backward(&mut self, output_grad: &[f64]) -> Result<Gradients> {
        if !self.trainable {
            return Err(MagnifierError::Model("backward called on a frozen model".into()));
        }
        if output_grad.len() != self.output_len() {
            return Err(MagnifierError::DataShape(format!(
                "output gradient has {} values, network outputs {}",
                output_grad.len(),
                self.output_len()
            )));
        }

        let mut grads = vec![Matrix::default(); self.layers.len() * 2];
        let mut delta = Matrix::row(output_grad.to_vec());
        for (i, layer) in self.layers.iter().enumerate().rev() {
            let (w_grad, b_grad, input_delta) = layer.backward(&delta)?;
            grads[2 * i] = w_grad;
            grads[2 * i + 1] = b_grad;
            delta = input_delta;
        }
        Ok(Gradients(grads))
    }

    fn trainable(&self) -> bool {
        self.trainable
    }

    fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
        if !trainable {
            self.layers.iter_mut().for_each(Layer::clear_cache);
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Matrix> {
        self.layers
            .iter_mut()
            .flat_map(|layer| [&mut layer.weights, &mut layer.biases])
            .collect()
    }

    /// Writes the weights as JSON. An existing file is never replaced.
    fn save_weights(&self, path: &Path) -> Result<()> {
        store::write_new_json(
            path,
            &WeightsRef {
                metadata: &self.metadata,
                layers: &self.layers,
            },
        )?;
        info!(path = %path.display(), "saved zoom network weights");
        Ok(())
    }

    /// Loads weights previously written by `save_weights` for the same
    /// window and layer layout.
    fn load_weights(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(MagnifierError::MissingInput { path: path.to_path_buf() });
        }
        let file = File::open(path).map_err(|e| MagnifierError::io(path, e))?;
        let loaded: WeightsFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MagnifierError::json(path, e))?;

        if loaded.metadata.window != self.metadata.window {
            return Err(MagnifierError::DataShape(format!(
                "weights in {} were trained for window {:?}, network uses {:?}",
                path.display(),
                loaded.metadata.window,
                self.metadata.window
            )));
        }
        let same_layout = loaded.layers.len() == self.layers.len()
            && loaded.layers.iter().zip(self.layers.iter()).all(|(a, b)| {
                a.weights.same_shape(&b.weights) && a.biases.same_shape(&b.biases)
            });
        if !same_layout {
            return Err(MagnifierError::DataShape(format!(
                "layer layout in {} does not match the network",
                path.display()
            )));
        }

        self.layers = loaded.layers;
        self.metadata = loaded.metadata;
        info!(path = %path.display(), "loaded zoom network weights");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::ModelVariant;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny() -> ZoomNetwork {
        ZoomNetwork::new(
            &ModelVariant::Simple.spec(),
            WindowSize::new(4, 3),
            &mut StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn output_matches_window_layout() {
        let mut net = tiny();
        let out = net.forward(&vec![0.5; 4 * 3 * 3], Mode::Eval).unwrap();
        assert_eq!(out.len(), 5 + 4 + 1);
        assert!(net.forward(&[0.0; 3], Mode::Eval).is_err());
    }

    #[test]
    fn gradients_align_with_parameters() {
        let mut net = tiny();
        net.forward(&vec![0.5; 36], Mode::Train).unwrap();
        let grads = net.backward(&vec![1.0; 10]).unwrap();
        let params = net.parameters_mut();
        assert_eq!(grads.len(), params.len());
        for (g, p) in grads.iter().zip(params.iter()) {
            assert!(g.same_shape(p));
        }
    }

    #[test]
    fn weights_round_trip_and_refuse_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights/run_1.json");
        let net = tiny();
        net.save_weights(&path).unwrap();
        assert!(matches!(
            net.save_weights(&path),
            Err(MagnifierError::PathConflict { .. })
        ));

        let mut other = ZoomNetwork::new(
            &ModelVariant::Simple.spec(),
            WindowSize::new(4, 3),
            &mut StdRng::seed_from_u64(99),
        );
        other.load_weights(&path).unwrap();
        for (a, b) in other.layers()[0].weights.iter().zip(net.layers()[0].weights.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        let mut wrong = ZoomNetwork::new(
            &ModelVariant::Simple.spec(),
            WindowSize::new(5, 3),
            &mut StdRng::seed_from_u64(1),
        );
        assert!(matches!(wrong.load_weights(&path), Err(MagnifierError::DataShape(_))));
        assert!(matches!(
            wrong.load_weights(&dir.path().join("missing.json")),
            Err(MagnifierError::MissingInput { .. })
        ));
    }
}
