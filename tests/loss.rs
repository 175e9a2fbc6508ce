use std::path::Path;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use swim_magnifier::{
    evaluate_loss, get_loss, Direction, Gradients, MagnifierError, Matrix, Mode, Model, ModelVariant,
    WindowLabel, WindowSize, ZoomNetwork,
};

const WINDOW: WindowSize = WindowSize { width: 4, height: 3 };

fn batch(rng: &mut StdRng) -> (Vec<Vec<f64>>, Vec<WindowLabel>) {
    let inputs = (0..5)
        .map(|_| (0..WINDOW.input_len()).map(|_| rng.gen::<f64>()).collect())
        .collect();
    let heads = [Some((0, 0)), Some((3, 2)), None, Some((1, 1)), Some((2, 0))];
    let labels = heads
        .iter()
        .enumerate()
        .map(|(i, &head)| WindowLabel {
            head,
            direction: if i % 2 == 0 { Some(Direction::Right) } else { Some(Direction::Left) },
            window: WINDOW,
            origin: (0, 0),
        })
        .collect();
    (inputs, labels)
}

fn network(rng: &mut StdRng) -> ZoomNetwork {
    ZoomNetwork::new(&ModelVariant::Simple.spec(), WINDOW, rng)
}

#[test]
fn zero_trade_off_is_pure_classification() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut model = network(&mut rng);
    let (inputs, labels) = batch(&mut rng);

    let out = get_loss(&mut model, &inputs, &labels, 0.0).unwrap();
    assert_eq!(out.regression, None);
    assert_relative_eq!(out.loss, out.classification, epsilon = 1e-12);

    // Parameters feeding only the direction output get no gradient.
    let direction = WINDOW.output_len() - 1;
    let grads = &out.gradients.0;
    assert_eq!(grads.len(), 4);
    assert!(grads[2].data.iter().all(|row| row[direction] == 0.0));
    assert_eq!(grads[3].data[0][direction], 0.0);
    // The classification path still learns.
    assert!(grads[2].iter().any(|&g| g != 0.0));
}

#[test]
fn positive_trade_off_adds_the_weighted_regression() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut model = network(&mut rng);
    let (inputs, labels) = batch(&mut rng);

    let out = get_loss(&mut model, &inputs, &labels, 0.7).unwrap();
    let regression = out.regression.unwrap();
    assert!(regression > 0.0);
    assert_relative_eq!(out.loss, out.classification + 0.7 * regression, epsilon = 1e-9);

    let direction = WINDOW.output_len() - 1;
    assert!(out.gradients.0[3].data[0][direction] != 0.0);
    assert_eq!(out.predictions.len(), 5);
}

#[test]
fn evaluation_matches_training_loss_and_leaves_the_model_alone() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut model = network(&mut rng);
    let (inputs, labels) = batch(&mut rng);
    let before = model.clone();

    let eval = evaluate_loss(&mut model, &inputs, &labels, 0.5).unwrap();
    assert!(model.trainable());
    for (after, before) in model.layers().iter().zip(before.layers()) {
        assert_eq!(after.weights, before.weights);
        assert_eq!(after.biases, before.biases);
    }

    let train = get_loss(&mut model, &inputs, &labels, 0.5).unwrap();
    assert_relative_eq!(eval.loss, train.loss, epsilon = 1e-9);
    assert_eq!(eval.predictions, train.predictions);

    // A frozen model stays frozen.
    model.set_trainable(false);
    evaluate_loss(&mut model, &inputs, &labels, 0.5).unwrap();
    assert!(!model.trainable());
}

#[test]
fn mismatched_batch_is_rejected() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut model = network(&mut rng);
    let (inputs, labels) = batch(&mut rng);
    assert!(matches!(
        get_loss(&mut model, &inputs[..2], &labels, 0.0),
        Err(MagnifierError::DataShape(_))
    ));
}

/// Fails every evaluation-mode forward pass.
struct FailingModel {
    trainable: bool,
    seen_frozen: bool,
}

impl Model for FailingModel {
    fn forward(&mut self, _input: &[f64], mode: Mode) -> swim_magnifier::Result<Vec<f64>> {
        self.seen_frozen |= !self.trainable;
        match mode {
            Mode::Eval => Err(MagnifierError::Model("forward failed".into())),
            Mode::Train => Ok(vec![0.0; WINDOW.output_len()]),
        }
    }

    fn backward(&mut self, _output_grad: &[f64]) -> swim_magnifier::Result<Gradients> {
        Ok(Gradients::default())
    }

    fn trainable(&self) -> bool {
        self.trainable
    }

    fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    fn parameters_mut(&mut self) -> Vec<&mut Matrix> {
        Vec::new()
    }

    fn save_weights(&self, _path: &Path) -> swim_magnifier::Result<()> {
        Ok(())
    }

    fn load_weights(&mut self, _path: &Path) -> swim_magnifier::Result<()> {
        Ok(())
    }
}

#[test]
fn trainable_flag_is_restored_when_evaluation_fails() {
    let mut rng = StdRng::seed_from_u64(7);
    let (inputs, labels) = batch(&mut rng);
    let mut model = FailingModel { trainable: true, seen_frozen: false };

    let result = evaluate_loss(&mut model, &inputs, &labels, 1.0);
    assert!(matches!(result, Err(MagnifierError::Model(_))));
    assert!(model.seen_frozen);
    assert!(model.trainable);
}
