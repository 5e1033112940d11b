//! Resolving handler code into stages.
//!
//! Handler text is never interpreted here. A [`CodeLoader`] maps program
//! text and an entry point to a stage that was built ahead of time.

use crate::auth::sha256_hex;
use crate::errors::OwtError;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use summat::Stage;

/// Produces the stage to run for a piece of handler code.
pub trait CodeLoader: Send + Sync + Debug {
    /// Resolves `entry_point` in `code`.
    fn load(&self, code: &str, entry_point: &str) -> Result<Arc<dyn Stage>, OwtError>;
}

/// A loader backed by stages registered at startup.
///
/// Lookups try the exact `(code, entry_point)` pair first, by the SHA-256 of
/// the code, then fall back to a stage registered for the entry point alone.
#[derive(Debug, Default, Clone)]
pub struct RegistryLoader {
    by_code: HashMap<(String, String), Arc<dyn Stage>>,
    by_entry_point: HashMap<String, Arc<dyn Stage>>,
}

impl RegistryLoader {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage for an entry point in any code.
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl Into<String>, stage: Arc<dyn Stage>) -> Self {
        self.by_entry_point.insert(entry_point.into(), stage);
        self
    }

    /// Registers a stage for an entry point in one specific program.
    #[must_use]
    pub fn with_code(
        mut self,
        code: &str,
        entry_point: impl Into<String>,
        stage: Arc<dyn Stage>,
    ) -> Self {
        self.by_code
            .insert((sha256_hex(code), entry_point.into()), stage);
        self
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len() + self.by_entry_point.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CodeLoader for RegistryLoader {
    fn load(&self, code: &str, entry_point: &str) -> Result<Arc<dyn Stage>, OwtError> {
        let fingerprint = sha256_hex(code);
        if let Some(stage) = self
            .by_code
            .get(&(fingerprint.clone(), entry_point.to_string()))
        {
            tracing::debug!(entry_point, stage = stage.name(), "Resolved handler by code");
            return Ok(stage.clone());
        }
        if let Some(stage) = self.by_entry_point.get(entry_point) {
            tracing::debug!(entry_point, stage = stage.name(), "Resolved handler by entry point");
            return Ok(stage.clone());
        }

        Err(OwtError::code_load(format!(
            "No '{entry_point}' handler defined for code {}",
            &fingerprint[..12]
        )))
    }
}
