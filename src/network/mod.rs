pub mod metadata;
pub mod network;
pub mod spec;

pub use metadata::ModelMetadata;
pub use network::ZoomNetwork;
pub use spec::{ModelVariant, ZoomNetworkSpec};
