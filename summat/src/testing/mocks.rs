//! Mock stages for testing.

use parking_lot::Mutex;

use crate::environment::Environment;
use crate::errors::SummatError;
use crate::signal::Signal;
use crate::stages::Stage;

/// A stage that records every environment it sees and returns a fixed signal.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    signal: Mutex<Signal>,
    environments: Mutex<Vec<Environment>>,
}

impl RecordingStage {
    /// Creates a recording stage returning `signal` on every call.
    #[must_use]
    pub fn new(name: impl Into<String>, signal: Signal) -> Self {
        Self {
            name: name.into(),
            signal: Mutex::new(signal),
            environments: Mutex::new(Vec::new()),
        }
    }

    /// Creates a recording stage that passes its input through.
    #[must_use]
    pub fn passthrough(name: impl Into<String>) -> Self {
        Self::new(name, Signal::Passthrough(None))
    }

    /// Sets the signal to return.
    pub fn set_signal(&self, signal: Signal) {
        *self.signal.lock() = signal;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.environments.lock().len()
    }

    /// Returns the environments from each call.
    #[must_use]
    pub fn recorded_environments(&self) -> Vec<Environment> {
        self.environments.lock().clone()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.environments.lock().clear();
    }
}

impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        self.environments.lock().push(env.clone());
        Ok(self.signal.lock().clone())
    }
}

/// A stage that always fails with an execution error.
#[derive(Debug, Clone)]
pub struct FailingStage {
    name: String,
    message: String,
}

impl FailingStage {
    /// Creates a failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _env: &Environment) -> Result<Signal, SummatError> {
        Err(SummatError::execution(&self.name, &self.message))
    }
}
