pub mod aggregator;
pub mod epoch_stats;

pub use aggregator::{AccuracyRule, MetricsAggregator, Split};
pub use epoch_stats::{EpochStats, RunResult, SplitStats};
