use thiserror::Error;

/// Errors surfaced at the boundary of the core filter: parameter validation,
/// and the I/O-adjacent failures of the loader/config/CLI layer.
///
/// Never constructed inside the pipeline stages (`measurement`, `predict`,
/// `assign`, `occupancy`, `normalize`, `birth`, `moments`, `resample`); those
/// resolve numerical pathologies inline and never fail.
#[derive(Debug, Error)]
pub enum DogmError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("no frames found in input")]
    NoFrames,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DogmError>;
