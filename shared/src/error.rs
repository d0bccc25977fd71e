//! Error types for the sunset card Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or serving a sunset card.
#[derive(Error, Debug)]
pub enum Error {
    /// Client input defect. The message is safe to echo back to the caller.
    #[error("{0}")]
    Validation(String),

    /// Image generation failed after every provider and candidate was tried
    #[error("Image provider error: {0}")]
    Provider(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image decoding, compositing or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Upstream weather or air-quality API error
    #[error("Weather error: {0}")]
    Weather(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Error category reported to API callers.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            _ => "InternalError",
        }
    }

    /// Message that may be shown to API callers.
    ///
    /// Only validation messages describe the caller's own input; everything
    /// else collapses to a static message so upstream diagnostics never leak.
    pub fn public_message(&self) -> String {
        match self {
            Error::Validation(message) => message.clone(),
            _ => "Image generation failed".to_string(),
        }
    }
}
