//! # Error Module
//!
//! Error taxonomy for the analysis engine. Configuration problems are
//! reported when an engine is built; contract violations (wrong frame
//! length, empty training data) are reported by the operation that hit them.
//! An unvoiced frame is never an error.

use thiserror::Error;

/// Errors produced by the analysis engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A frame handed to a per-frame operation has the wrong length.
    #[error("expected frame of length {expected}, got {got}")]
    FrameLengthMismatch {
        /// Frame length the engine was configured for.
        expected: usize,
        /// Length of the frame actually received.
        got: usize,
    },

    /// A reference waveform is too short to yield a single frame.
    #[error("class '{label}' has insufficient data: {samples} samples cannot fill one frame of {frame_size}")]
    InsufficientData {
        /// Class label of the offending reference.
        label: String,
        /// Number of samples provided.
        samples: usize,
        /// Frame length required.
        frame_size: usize,
    },

    /// Training was requested without any reference classes.
    #[error("no training data: at least one reference class is required")]
    NoTrainingData,

    /// Classification was requested before any model was trained or loaded.
    #[error("no class models available")]
    NoModels,

    /// Model shapes do not agree with each other or with the engine.
    #[error("model mismatch: {0}")]
    ModelMismatch(String),

    /// A NaN or infinite value reached a transform that cannot accept it.
    #[error("non-finite value at index {index} in {context}")]
    NonFiniteInput {
        /// Which input was being processed.
        context: &'static str,
        /// Position of the first offending value.
        index: usize,
    },

    /// The consumer of streaming results went away.
    #[error("analysis sink disconnected")]
    SinkDisconnected,

    /// Failed to parse or produce JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Create an invalid configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::InvalidConfig(reason.into())
    }

    /// Create a model mismatch error.
    pub fn model_mismatch(reason: impl Into<String>) -> Self {
        EngineError::ModelMismatch(reason.into())
    }

    /// Returns an error unless `got == expected`.
    pub fn check_frame_len(expected: usize, got: usize) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(EngineError::FrameLengthMismatch { expected, got })
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_names_the_class() {
        let err = EngineError::InsufficientData {
            label: "a".to_string(),
            samples: 10,
            frame_size: 400,
        };
        let msg = err.to_string();
        assert!(msg.contains("'a'"), "got: {msg}");
        assert!(msg.contains("400"), "got: {msg}");
    }

    #[test]
    fn frame_length_check() {
        assert!(EngineError::check_frame_len(800, 800).is_ok());
        let err = EngineError::check_frame_len(800, 799).unwrap_err();
        assert!(matches!(err, EngineError::FrameLengthMismatch { expected: 800, got: 799 }));
        assert_eq!(err.to_string(), "expected frame of length 800, got 799");
    }

    #[test]
    fn config_factory() {
        let err = EngineError::config("hop must be positive");
        assert!(matches!(err, EngineError::InvalidConfig(ref r) if r == "hop must be positive"));
    }
}
