//! Error types for dispatching calls.

use std::collections::HashMap;
use summat::SummatError;
use thiserror::Error;

/// The main error type for owt operations.
#[derive(Debug, Clone, Error)]
pub enum OwtError {
    /// The inbound payload could not be decoded.
    #[error("Invalid request payload: {0}")]
    Decode(String),

    /// The code loader could not produce a handler.
    #[error("Code load error: {0}")]
    CodeLoad(String),

    /// The handler pipeline failed while running.
    #[error("Execution error: {0}")]
    Pipeline(#[from] SummatError),

    /// The final value could not be turned into a response.
    #[error("Response error: {0}")]
    Coerce(String),

    /// The runner could not complete the handler.
    #[error("Runner error: {0}")]
    Runner(String),

    /// Credentials were missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// Configuration could not be read.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OwtError {
    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl std::fmt::Display) -> Self {
        Self::Decode(message.to_string())
    }

    /// Creates a code load error.
    #[must_use]
    pub fn code_load(message: impl std::fmt::Display) -> Self {
        Self::CodeLoad(message.to_string())
    }

    /// The HTTP-style status a failure response should carry.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Decode(_) => 400,
            Self::Unauthorized => 401,
            Self::CodeLoad(_)
            | Self::Pipeline(_)
            | Self::Coerce(_)
            | Self::Runner(_)
            | Self::Config(_) => 500,
        }
    }

    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "OWT-DECODE",
            Self::CodeLoad(_) => "OWT-CODE-LOAD",
            Self::Pipeline(inner) => inner.code(),
            Self::Coerce(_) => "OWT-COERCE",
            Self::Runner(_) => "OWT-RUNNER",
            Self::Unauthorized => "OWT-UNAUTHORIZED",
            Self::Config(_) => "OWT-CONFIG",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = match self {
            Self::Pipeline(inner) => inner.to_dict(),
            _ => HashMap::new(),
        };
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map.insert("status".to_string(), serde_json::json!(self.status()));
        map
    }
}
