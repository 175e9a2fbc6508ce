use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::LoadingParams;
use crate::error::{MagnifierError, Result};
use crate::metrics::AccuracyRule;
use crate::network::ModelVariant;
use crate::optim::OptimizerKind;
use crate::sample::SamplingParams;
use crate::sweep::SweepSchedule;

/// Which videos feed the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub videos_train: Vec<String>,
    pub videos_valid: Vec<String>,
    /// 1-based index of this run; run `n > 1` warm-starts from run `n - 1`.
    pub number_training: usize,
    /// Restrict validation to one lane.
    pub valid_lane_number: Option<u32>,
    /// Keep frames without a head label.
    pub take_all: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            videos_train: vec!["vid0".to_string()],
            videos_valid: vec!["vid1".to_string()],
            number_training: 1,
            valid_lane_number: None,
            take_all: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub nb_epochs: usize,
    pub batch_size: usize,
    pub sampling: SamplingParams,
    pub trade_off: f64,
    pub accuracy: AccuracyRule,
    pub optimizer: OptimizerKind,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            nb_epochs: 15,
            batch_size: 12,
            sampling: SamplingParams::default(),
            trade_off: 0.0,
            accuracy: AccuracyRule::exact(),
            optimizer: OptimizerKind::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub variant: ModelVariant,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig { variant: ModelVariant::Simple }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub schedule: SweepSchedule,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig { schedule: SweepSchedule::inclusive(0.0, 0.1, 1.0) }
    }
}

/// Where inputs are read and artifacts written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Project root holding `data/` and `reports/`.
    pub root: PathBuf,
    /// Route everything through the `tries` sub-directories used for trial runs.
    pub tries: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig { root: PathBuf::from("."), tries: false }
    }
}

impl PathsConfig {
    /// `root/<base>`, or `root/<base>/tries` for trial runs.
    pub fn resolve(&self, base: &str) -> PathBuf {
        let path = self.root.join(base);
        if self.tries {
            path.join("tries")
        } else {
            path
        }
    }

    pub fn label_file(&self, video: &str) -> PathBuf {
        self.resolve("data/3_processed_positions").join(format!("{}.csv", video))
    }

    pub fn lanes_root(&self) -> PathBuf {
        self.resolve("data/2_intermediate_top_down_lanes/lanes")
    }

    pub fn calibration_root(&self) -> PathBuf {
        self.resolve("data/2_intermediate_top_down_lanes/calibration")
    }

    pub fn weights_dir(&self, variant: ModelVariant) -> PathBuf {
        self.resolve("data/4_models_weights").join("magnifier").join(variant.tag())
    }

    pub fn report_dir(&self, variant: ModelVariant) -> PathBuf {
        self.resolve("reports/figures_results/zoom_model").join(variant.tag())
    }

    pub fn sweep_dir(&self, variant: ModelVariant) -> PathBuf {
        self.resolve("reports/trade_off_results").join(variant.tag())
    }
}

/// Everything a training run or a trade-off sweep needs.
///
/// Every section falls back to its defaults when absent from the JSON file,
/// so a config only has to name what it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnifierConfig {
    pub data: DataConfig,
    pub loading: LoadingParams,
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub sweep: SweepConfig,
    pub paths: PathsConfig,
}

impl MagnifierConfig {
    pub fn load_json(path: &Path) -> Result<MagnifierConfig> {
        if !path.exists() {
            return Err(MagnifierError::MissingInput { path: path.to_path_buf() });
        }
        let text = fs::read_to_string(path).map_err(|e| MagnifierError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| MagnifierError::json(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.training.nb_epochs == 0 {
            return Err(MagnifierError::InvalidParameter("nb_epochs must be at least 1".into()));
        }
        if self.training.batch_size == 0 {
            return Err(MagnifierError::InvalidParameter("batch_size must be at least 1".into()));
        }
        if self.data.number_training == 0 {
            return Err(MagnifierError::InvalidParameter("number_training is 1-based".into()));
        }
        self.training.sampling.validate()
    }
}
