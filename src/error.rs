//! Error taxonomy for the recoverable failure paths.

/// Convenience result type used across the crate.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors reported through return values.
///
/// Rasterization itself never fails; these cover construction of inputs
/// (images, geometries, executors) and decoding of the vector container.
#[derive(thiserror::Error, Debug)]
pub enum RasterError {
    /// Destination dimensions or stride are unusable.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Tag and point sequences of a path disagree.
    #[error("malformed path: {0}")]
    MalformedPath(String),

    /// The vector container is corrupt or of an unsupported version.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Executor settings are out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be started.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl RasterError {
    /// Build a [`RasterError::InvalidImage`] value.
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Build a [`RasterError::MalformedPath`] value.
    pub fn malformed_path(msg: impl Into<String>) -> Self {
        Self::MalformedPath(msg.into())
    }

    /// Build a [`RasterError::InvalidData`] value.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Build a [`RasterError::InvalidConfig`] value.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
