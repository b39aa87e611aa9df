//! Error types for membership-inference experiments.

/// Errors that can occur while loading data, training models or scoring an attack.
#[derive(Debug, thiserror::Error)]
pub enum MiaError {
    /// The dataset could not be found, read or decoded.
    #[error("dataset unavailable: {msg}")]
    DatasetUnavailable {
        /// Human-readable error description.
        msg: String,
    },

    /// Configuration rejected before any compute-intensive step.
    #[error("invalid configuration: {msg}")]
    InvalidConfig {
        /// Human-readable error description.
        msg: String,
    },

    /// Model fitting or prediction failed.
    #[error("training failed: {msg}")]
    Training {
        /// Human-readable error description.
        msg: String,
    },

    /// Features and labels (or predictions and ground truth) disagree in shape.
    #[error("shape mismatch: {msg}")]
    ShapeMismatch {
        /// Human-readable error description.
        msg: String,
    },

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for membership-inference operations.
pub type Result<T> = std::result::Result<T, MiaError>;

impl MiaError {
    /// Create a dataset-unavailable error.
    pub fn dataset<S: Into<String>>(msg: S) -> Self {
        Self::DatasetUnavailable { msg: msg.into() }
    }

    /// Create an invalid-configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig { msg: msg.into() }
    }

    /// Create a training error.
    pub fn training<S: Into<String>>(msg: S) -> Self {
        Self::Training { msg: msg.into() }
    }

    /// Create a shape-mismatch error.
    pub fn shape<S: Into<String>>(msg: S) -> Self {
        Self::ShapeMismatch { msg: msg.into() }
    }
}
