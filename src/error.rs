use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MagnifierError>;

/// Every failure the pipeline can surface to the run / sweep entry points.
#[derive(Debug, Error)]
pub enum MagnifierError {
    /// A weight file, report directory or sweep table is already on disk.
    #[error("{path} already exists")]
    PathConflict { path: PathBuf },
    /// A label file, image directory or calibration file is absent.
    #[error("path not found: {path}")]
    MissingInput { path: PathBuf },
    #[error("data shape error: {0}")]
    DataShape(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("trade-off results added out of order: expected {expected:?}, got {got}")]
    SweepOrder { expected: Option<f64>, got: f64 },
    #[error("model error: {0}")]
    Model(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl MagnifierError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MagnifierError::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        MagnifierError::Json { path: path.into(), source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        MagnifierError::Csv { path: path.into(), source }
    }
}
