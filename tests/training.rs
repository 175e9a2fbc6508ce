use std::fs;
use std::path::Path;
use std::sync::mpsc;

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use swim_magnifier::data::{image_name, Batch};
use swim_magnifier::sweep::BoundKind;
use swim_magnifier::train::weight_path;
use swim_magnifier::{
    train_loop, train_magnifier, tune_trade_off, AccuracyRule, BatchProvider, Direction, FrameLabel,
    HeadPosition, LoopParams, MagnifierConfig, MagnifierError, MetricsAggregator, ModelVariant, OptimizerKind,
    SamplingParams, SweepSchedule, WindowSize, ZoomNetwork,
};

/// Lanes held in memory, served in fixed-size batches.
struct MemoryBatches {
    lanes: Vec<RgbImage>,
    labels: Vec<FrameLabel>,
    batch_size: usize,
    reshuffles: usize,
}

impl MemoryBatches {
    fn new(n: usize, batch_size: usize) -> Self {
        let lanes = (0..n)
            .map(|i| {
                let mut lane = RgbImage::new(24, 12);
                lane.put_pixel(4 + i as u32, 6, Rgb([255, 255, 255]));
                lane
            })
            .collect();
        let labels = (0..n)
            .map(|i| FrameLabel::new(Some(HeadPosition::new(4.0 + i as f64, 6.0)), Some(Direction::Right)))
            .collect();
        MemoryBatches { lanes, labels, batch_size, reshuffles: 0 }
    }
}

impl BatchProvider for MemoryBatches {
    fn len(&self) -> usize {
        (self.lanes.len() + self.batch_size - 1) / self.batch_size
    }

    fn get(&mut self, index: usize) -> swim_magnifier::Result<Batch> {
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.lanes.len());
        Ok(Batch {
            lanes: self.lanes[start..end].to_vec(),
            labels: self.labels[start..end].to_vec(),
        })
    }

    fn reshuffle(&mut self, _rng: &mut dyn RngCore) {
        self.reshuffles += 1;
    }
}

fn loop_params(nb_epochs: usize) -> LoopParams {
    LoopParams {
        nb_epochs,
        sampling: SamplingParams {
            window: WindowSize::square(8),
            nb_samples: 2,
            distribution: 0.5,
            margin: 1,
            close_to_head: true,
        },
        trade_off: 0.3,
        standardize: true,
    }
}

#[test]
fn loop_runs_every_epoch_and_reports_progress() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut model = ZoomNetwork::new(&ModelVariant::Simple.spec(), WindowSize::square(8), &mut rng);
    let before = model.layers()[0].weights.clone();
    let mut optimizer = OptimizerKind::Adam { learning_rate: 1e-2 }.build();
    let mut train_set = MemoryBatches::new(5, 2);
    let mut valid_set = MemoryBatches::new(3, 2);
    let mut metrics = MetricsAggregator::new(WindowSize::square(8), 3, 2, AccuracyRule::exact());
    let (tx, rx) = mpsc::channel();

    train_loop(
        &mut model,
        &mut optimizer,
        &mut train_set,
        &mut valid_set,
        &loop_params(3),
        &mut metrics,
        &mut rng,
        Some(&tx),
    )
    .unwrap();

    let sent: Vec<_> = rx.try_iter().collect();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent.last().unwrap().epoch, 3);
    assert_eq!(train_set.reshuffles, 3);
    assert_eq!(valid_set.reshuffles, 0);

    let last = metrics.history().last().unwrap();
    assert_eq!(last.train.batches, 3);
    assert_eq!(last.train.samples, 10);
    assert_eq!(last.valid.samples, 6);
    assert!(last.train.loss > 0.0);
    assert!((0.0..=1.0).contains(&last.valid.accuracy));
    assert_ne!(model.layers()[0].weights, before);
}

#[test]
fn dropped_receiver_stops_the_loop() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut model = ZoomNetwork::new(&ModelVariant::Simple.spec(), WindowSize::square(8), &mut rng);
    let mut optimizer = OptimizerKind::Sgd { learning_rate: 1e-3 }.build();
    let mut train_set = MemoryBatches::new(2, 2);
    let mut valid_set = MemoryBatches::new(2, 2);
    let mut metrics = MetricsAggregator::new(WindowSize::square(8), 5, 2, AccuracyRule::exact());
    let (tx, rx) = mpsc::channel();
    drop(rx);

    train_loop(
        &mut model,
        &mut optimizer,
        &mut train_set,
        &mut valid_set,
        &loop_params(5),
        &mut metrics,
        &mut rng,
        Some(&tx),
    )
    .unwrap();
    assert_eq!(metrics.history().len(), 1);
}

/// Writes a tiny project (two videos, a few frames each) under `root`.
fn write_project(root: &Path) {
    let labels = root.join("data/3_processed_positions");
    let lanes = root.join("data/2_intermediate_top_down_lanes/lanes");
    let calibration = root.join("data/2_intermediate_top_down_lanes/calibration");
    fs::create_dir_all(&labels).unwrap();
    fs::create_dir_all(&calibration).unwrap();

    for (video, way) in [("vid0", 1), ("vid1", -1)] {
        fs::create_dir_all(lanes.join(video)).unwrap();
        fs::write(calibration.join(format!("{}.txt", video)), "0,0,3,0\n").unwrap();
        let mut csv = String::from("lane,frame,x_head,y_head,swimming_way\n");
        for frame in 0..3u32 {
            let x = 10 + 8 * frame;
            csv.push_str(&format!("1,{},{},6,{}\n", frame, x, way));
            let mut lane = RgbImage::from_pixel(60, 12, Rgb([0, 40, 90]));
            lane.put_pixel(x, 6, Rgb([250, 250, 250]));
            lane.save(lanes.join(video).join(image_name(1, frame))).unwrap();
        }
        fs::write(labels.join(format!("{}.csv", video)), csv).unwrap();
    }
}

fn project_config(root: &Path) -> MagnifierConfig {
    let mut config = MagnifierConfig::default();
    config.paths.root = root.to_path_buf();
    config.loading.scale = 10.0;
    config.loading.dimensions = [12, 40];
    config.loading.augmentation = true;
    config.training.nb_epochs = 2;
    config.training.batch_size = 2;
    config.training.sampling = SamplingParams {
        window: WindowSize::square(8),
        nb_samples: 2,
        distribution: 0.3,
        margin: 1,
        close_to_head: true,
    };
    config
}

#[test]
fn train_magnifier_writes_weights_and_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let config = project_config(dir.path());

    let result = train_magnifier(&config).unwrap();
    assert!((0.0..=1.0).contains(&result.train_accuracy));
    assert!(result.valid_mae >= 0.0);
    assert!(weight_path(&config, 1).exists());
    assert!(dir
        .path()
        .join("reports/figures_results/zoom_model/simple_model/window_8_epoch_2_batch_2_1/history.json")
        .exists());

    assert!(matches!(
        train_magnifier(&config),
        Err(MagnifierError::PathConflict { .. })
    ));

    // Run 2 warm-starts from run 1.
    let mut second = config.clone();
    second.data.number_training = 2;
    train_magnifier(&second).unwrap();

    // Run 4 has no run 3 to start from.
    let mut orphan = config;
    orphan.data.number_training = 4;
    assert!(matches!(
        train_magnifier(&orphan),
        Err(MagnifierError::MissingInput { .. })
    ));
}

#[test]
fn trade_off_sweep_trains_once_per_value() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let mut config = project_config(dir.path());
    config.training.nb_epochs = 1;
    config.sweep.schedule = SweepSchedule {
        start: 0.0,
        step: 0.5,
        bound: 1.0,
        bound_kind: BoundKind::Exclusive,
    };

    let table = tune_trade_off(&config).unwrap();
    assert_eq!(
        table,
        dir.path().join("reports/trade_off_results/simple_model/window_8_epoch_1_batch_2.json")
    );
    let weights = dir.path().join("data/4_models_weights/magnifier/simple_model");
    assert!(weights.join("window_8_epoch_1_batch_2_1.json").exists());
    assert!(weights.join("window_8_epoch_1_batch_2_trade_off_0.5_1.json").exists());

    assert!(matches!(tune_trade_off(&config), Err(MagnifierError::PathConflict { .. })));
}
