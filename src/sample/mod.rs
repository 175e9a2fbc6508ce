pub mod input;
pub mod sampler;

pub use input::lane_to_input;
pub use sampler::{sample_lanes, SamplingParams};
