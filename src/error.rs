//! Error types for the vectrace library

use thiserror::Error;

/// Main error type for tracing and posterization operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Invalid level range {min}...{max}")]
    InvalidRange { min: u8, max: u8 },

    #[error("No image loaded")]
    NotLoaded,

    #[error("Image decoding failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Load superseded by a newer image")]
    Superseded,
}

impl Error {
    /// Create a new invalid-parameter error
    pub fn invalid_parameter(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
