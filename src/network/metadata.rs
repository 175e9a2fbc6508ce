use serde::{Deserialize, Serialize};

use crate::label::WindowSize;
use crate::network::spec::ModelVariant;

/// Header stored next to the layers in a weight file; checked on load so a
/// warm start cannot silently pick up weights built for another window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub variant: ModelVariant,
    pub window: WindowSize,
    #[serde(default)]
    pub description: Option<String>,
}
