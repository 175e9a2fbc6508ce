use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::data::{generate_records, LaneLoader, LoadingParams};
use crate::error::{MagnifierError, Result};
use crate::label::WindowSize;
use crate::metrics::{MetricsAggregator, RunResult};
use crate::model::Model;
use crate::network::ZoomNetwork;
use crate::sweep::TradeOffSweep;
use crate::train::loop_fn::{train_loop, LoopParams};
use crate::train::train_config::MagnifierConfig;

/// Fragment naming a non-zero trade-off in artifact names.
pub fn trade_off_label(trade_off: f64) -> String {
    if trade_off == 0.0 {
        String::new()
    } else {
        format!("trade_off_{}_", trade_off)
    }
}

fn weight_file_name(config: &MagnifierConfig, run: usize) -> String {
    let training = &config.training;
    format!(
        "window_{}_epoch_{}_batch_{}_{}{}.json",
        training.sampling.window.tag(),
        training.nb_epochs,
        training.batch_size,
        trade_off_label(training.trade_off),
        run
    )
}

/// Path of the weights written by run `run` of this configuration.
pub fn weight_path(config: &MagnifierConfig, run: usize) -> PathBuf {
    config
        .paths
        .weights_dir(config.model.variant)
        .join(weight_file_name(config, run))
}

/// Window the model actually sees once lanes are padded to `loading`.
fn effective_window(window: WindowSize, loading: &LoadingParams) -> WindowSize {
    let (width, height) = loading.lane_size();
    window.clamped_to(width, height)
}

/// Trains one zoom model end to end and returns the accuracy / MAE of its
/// last epoch.
///
/// The weights of run `n` must not exist yet; run `n > 1` starts from the
/// weights of run `n - 1`.
pub fn train_magnifier(config: &MagnifierConfig) -> Result<RunResult> {
    config.validate()?;
    let run = config.data.number_training;
    let training = &config.training;
    let paths = &config.paths;

    let new_weights = weight_path(config, run);
    if new_weights.exists() {
        return Err(MagnifierError::PathConflict { path: new_weights });
    }

    let label_paths = |videos: &[String]| videos.iter().map(|v| paths.label_file(v)).collect::<Vec<_>>();
    let train_records = generate_records(
        &label_paths(&config.data.videos_train),
        &paths.lanes_root(),
        &paths.calibration_root(),
        config.data.take_all,
        None,
    )?;
    let valid_records = generate_records(
        &label_paths(&config.data.videos_valid),
        &paths.lanes_root(),
        &paths.calibration_root(),
        config.data.take_all,
        config.data.valid_lane_number,
    )?;
    info!(train = train_records.len(), valid = valid_records.len(), "loaded frame records");

    let mut train_set = LaneLoader::new(train_records, training.batch_size, config.loading, training.seed)?;
    let valid_loading = LoadingParams { augmentation: false, ..config.loading };
    let mut valid_set = LaneLoader::new(valid_records, training.batch_size, valid_loading, training.seed)?;

    let mut rng = StdRng::seed_from_u64(training.seed);
    let window = effective_window(training.sampling.window, &config.loading);
    let mut model = ZoomNetwork::new(&config.model.variant.spec(), window, &mut rng);
    if run > 1 {
        let previous = weight_path(config, run - 1);
        info!(path = %previous.display(), "warm start");
        model.load_weights(&previous)?;
    }

    let mut optimizer = training.optimizer.build();
    let mut metrics = MetricsAggregator::new(
        training.sampling.window,
        training.nb_epochs,
        training.batch_size,
        training.accuracy,
    );
    let params = LoopParams {
        nb_epochs: training.nb_epochs,
        sampling: training.sampling,
        trade_off: training.trade_off,
        standardize: config.loading.standardize,
    };

    train_loop(
        &mut model,
        &mut optimizer,
        &mut train_set,
        &mut valid_set,
        &params,
        &mut metrics,
        &mut rng,
        None,
    )?;

    model.save_weights(&new_weights)?;
    metrics.save(
        &paths.report_dir(config.model.variant),
        run,
        &trade_off_label(training.trade_off),
    )?;

    metrics
        .get_final_result()
        .ok_or_else(|| MagnifierError::InvalidParameter("no epoch was completed".into()))
}

/// Runs [`train_magnifier`] once per value of the configured sweep and saves
/// the resulting table. Returns the path of the saved JSON table.
pub fn tune_trade_off(config: &MagnifierConfig) -> Result<PathBuf> {
    let training = &config.training;
    let mut sweep = TradeOffSweep::new(
        config.sweep.schedule,
        training.sampling.window,
        training.nb_epochs,
        training.batch_size,
    )?;
    let root = config.paths.sweep_dir(config.model.variant);
    let table = root.join(format!("{}.json", sweep.file_stem()));
    if table.exists() {
        return Err(MagnifierError::PathConflict { path: table });
    }

    for trade_off in sweep.values() {
        info!(trade_off, "sweep run");
        let mut run_config = config.clone();
        run_config.training.trade_off = trade_off;
        let result = train_magnifier(&run_config)?;
        sweep.add(trade_off, result)?;
    }

    if let Some(best) = sweep.best() {
        info!(
            trade_off = best.trade_off,
            valid_accuracy = best.valid_accuracy,
            valid_mae = best.valid_mae,
            "best trade-off"
        );
    }
    sweep.save(&root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_carry_the_trade_off() {
        assert_eq!(trade_off_label(0.0), "");
        assert_eq!(trade_off_label(0.5), "trade_off_0.5_");

        let mut config = MagnifierConfig::default();
        assert_eq!(
            weight_path(&config, 2),
            PathBuf::from("./data/4_models_weights/magnifier/simple_model/window_150_epoch_15_batch_12_2.json")
        );
        config.training.trade_off = 0.2;
        assert!(weight_path(&config, 1)
            .ends_with("window_150_epoch_15_batch_12_trade_off_0.2_1.json"));
    }

    #[test]
    fn default_window_is_clamped_to_the_lane_height() {
        let config = MagnifierConfig::default();
        let window = effective_window(config.training.sampling.window, &config.loading);
        assert_eq!(window, WindowSize::new(150, 108));
    }
}
