use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the counter before or while it runs.
///
/// Empty frames and weak proposals are never reported here; they flow
/// through the pipeline as empty collections.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("failed to read {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("required file missing: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("could not open input source: {0}")]
    SourceUnavailable(String),
    #[cfg(feature = "video")]
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

pub type Result<T> = std::result::Result<T, CounterError>;
