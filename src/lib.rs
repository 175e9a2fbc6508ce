pub mod activation;
pub mod data;
pub mod error;
pub mod label;
pub mod layers;
pub mod loss;
pub mod math;
pub mod metrics;
pub mod model;
pub mod network;
pub mod optim;
pub mod sample;
pub mod sweep;
pub mod train;

mod store;

// Convenience re-exports
pub use data::{generate_records, BatchProvider, LaneLoader, LoadingParams};
pub use error::{MagnifierError, Result};
pub use label::{Direction, FrameLabel, FrameRecord, HeadPosition, WindowLabel, WindowSize};
pub use loss::{evaluate_loss, get_loss};
pub use math::Matrix;
pub use metrics::{AccuracyRule, MetricsAggregator, RunResult, Split};
pub use model::{Gradients, Mode, Model, TrainableGuard};
pub use network::{ModelVariant, ZoomNetwork};
pub use optim::{Adam, Optimizer, OptimizerKind, Sgd};
pub use sample::{sample_lanes, SamplingParams};
pub use sweep::{SweepSchedule, TradeOffSweep};
pub use train::{train_loop, train_magnifier, tune_trade_off, LoopParams, MagnifierConfig};
