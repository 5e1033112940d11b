//! Error types raised while running stages.

use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by stages and compiled pipelines.
///
/// Any error aborts the run it occurred in; nothing downstream executes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummatError {
    /// A stage needed the current value but the slot was empty.
    #[error("Stage '{stage}' requires a current value but none is present")]
    MissingCurrentValue {
        /// The stage that observed the empty slot.
        stage: String,
    },

    /// `Foldl1` was asked to fold an empty sequence.
    #[error("Stage '{stage}' cannot fold an empty sequence")]
    EmptySequence {
        /// The folding stage.
        stage: String,
    },

    /// An index fell outside the sequence.
    #[error("Index {index} out of range for sequence of length {len}")]
    IndexOutOfRange {
        /// The requested index (negative counts from the end).
        index: i64,
        /// The sequence length.
        len: usize,
    },

    /// A stage or user function failed while running.
    #[error("Stage '{stage}' failed: {message}")]
    Execution {
        /// The failing stage.
        stage: String,
        /// The underlying failure.
        message: String,
    },

    /// A pipeline was built without any stages.
    #[error("Pipeline '{name}' has no stages")]
    EmptyPipeline {
        /// The pipeline name.
        name: String,
    },
}

impl SummatError {
    /// Creates a missing current value error.
    #[must_use]
    pub fn missing_current(stage: impl Into<String>) -> Self {
        Self::MissingCurrentValue {
            stage: stage.into(),
        }
    }

    /// Creates an empty sequence error.
    #[must_use]
    pub fn empty_sequence(stage: impl Into<String>) -> Self {
        Self::EmptySequence {
            stage: stage.into(),
        }
    }

    /// Creates an execution error.
    #[must_use]
    pub fn execution(stage: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Execution {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Stable error code used in failure responses.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCurrentValue { .. } => "SUMMAT-MISSING-CURRENT",
            Self::EmptySequence { .. } => "SUMMAT-EMPTY-SEQUENCE",
            Self::IndexOutOfRange { .. } => "SUMMAT-INDEX-RANGE",
            Self::Execution { .. } => "SUMMAT-EXECUTION",
            Self::EmptyPipeline { .. } => "SUMMAT-EMPTY-PIPELINE",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::MissingCurrentValue { stage }
            | Self::EmptySequence { stage }
            | Self::Execution { stage, .. } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
            }
            Self::IndexOutOfRange { index, len } => {
                map.insert("index".to_string(), serde_json::json!(index));
                map.insert("len".to_string(), serde_json::json!(len));
            }
            Self::EmptyPipeline { name } => {
                map.insert("pipeline".to_string(), serde_json::json!(name));
            }
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_current_message() {
        let err = SummatError::missing_current("lift");
        assert!(err.to_string().contains("'lift'"));
        assert_eq!(err.code(), "SUMMAT-MISSING-CURRENT");
    }

    #[test]
    fn test_index_error_to_dict() {
        let err = SummatError::IndexOutOfRange { index: -4, len: 3 };
        let dict = err.to_dict();

        assert_eq!(dict.get("code").unwrap(), "SUMMAT-INDEX-RANGE");
        assert_eq!(dict.get("index").unwrap(), -4);
        assert_eq!(dict.get("len").unwrap(), 3);
    }

    #[test]
    fn test_execution_wraps_display() {
        let err = SummatError::execution("map", "invalid type: string, expected i64");
        assert_eq!(
            err.to_string(),
            "Stage 'map' failed: invalid type: string, expected i64"
        );
    }
}
