pub mod loop_fn;
pub mod run;
pub mod train_config;

pub use loop_fn::{train_loop, LoopParams};
pub use run::{trade_off_label, train_magnifier, tune_trade_off, weight_path};
pub use train_config::{DataConfig, MagnifierConfig, ModelConfig, PathsConfig, SweepConfig, TrainingConfig};
