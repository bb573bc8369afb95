//! Error types for proof-analyzer.
//!
//! The analysis pipeline itself never surfaces these to callers: stage and
//! detector failures are folded into `AnalysisResult::errors`. The variants
//! below are returned by the input check, configuration loading, and the
//! collaborator layers (export, rendering).

use thiserror::Error;

/// Result type alias using proof-analyzer's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur around proof analysis.
#[derive(Error, Debug)]
pub enum Error {
    /// Input was empty or whitespace-only
    #[error("Please enter a LaTeX proof.")]
    EmptyInput,

    /// Input exceeded the configured size limit
    #[error("Input is {len} bytes, exceeding the limit of {max} bytes")]
    InputTooLarge { len: usize, max: usize },

    /// A pipeline stage could not complete
    #[error("{stage} stage failed: {message}")]
    Stage { stage: String, message: String },

    /// A gap detector could not evaluate its inputs
    #[error("detector '{detector}' failed: {message}")]
    Detector { detector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Graph renderer binary could not be located
    #[error("Graph renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// Graph renderer ran but failed
    #[error("Graph renderer exited with {status}: {stderr}")]
    RenderFailed { status: String, stderr: String },
}

impl Error {
    /// Create a stage failure error.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a detector failure error.
    pub fn detector(detector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detector {
            detector: detector.into(),
            message: message.into(),
        }
    }

    /// Create an input-too-large error.
    pub fn input_too_large(len: usize, max: usize) -> Self {
        Self::InputTooLarge { len, max }
    }

    /// Whether this error belongs to the caller-facing input check rather
    /// than to analysis or a collaborator.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::InputTooLarge { .. })
    }
}

/// Reject empty or whitespace-only input before running the pipeline.
///
/// The pipeline tolerates such input (it produces an empty result); this is
/// for callers that want to show a "please provide a proof" message instead.
pub fn validate_input(text: &str) -> Result<&str> {
    if text.trim().is_empty() {
        Err(Error::EmptyInput)
    } else {
        Ok(text)
    }
}
