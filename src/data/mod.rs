pub mod loader;
pub mod records;
pub mod transform;

pub use loader::{Batch, BatchProvider, LaneLoader};
pub use records::{generate_records, image_name, read_video_length};
pub use transform::{transform_lane, LoadingParams};
