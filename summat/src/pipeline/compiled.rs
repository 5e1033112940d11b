//! Compiled pipelines.

use crate::environment::{Bindings, Environment};
use crate::errors::SummatError;
use crate::signal::Signal;
use crate::stages::{evaluate, Stage};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// An immutable, reusable pipeline compiled from a builder.
///
/// `K` is the declared keyword shape and `U` the declared type of the final
/// current value. A pipeline is itself a [`Stage`], so it can be nested as a
/// branch of [`Cond`](crate::combinators::Cond) or
/// [`Fork`](crate::combinators::Fork).
pub struct Pipeline<K = Bindings, U = serde_json::Value> {
    name: String,
    root: Arc<dyn Stage>,
    stage_count: usize,
    _shape: PhantomData<fn() -> (K, U)>,
}

impl<K, U> Pipeline<K, U> {
    pub(crate) fn new(name: String, root: Arc<dyn Stage>, stage_count: usize) -> Self {
        Self {
            name,
            root,
            stage_count,
            _shape: PhantomData,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages the pipeline was built from.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Returns the composed root stage.
    #[must_use]
    pub fn root(&self) -> Arc<dyn Stage> {
        self.root.clone()
    }

    /// Runs the pipeline to completion and returns the final value.
    ///
    /// # Errors
    ///
    /// Propagates the first stage failure, or `MissingCurrentValue` if the
    /// run ends without a value.
    pub fn run(&self, env: Environment) -> Result<serde_json::Value, SummatError> {
        evaluate(self, env)
    }

    /// Runs the pipeline from flat call-time bindings.
    pub fn call_with(&self, bindings: Bindings) -> Result<serde_json::Value, SummatError> {
        self.run(Environment::from_bindings(bindings))
    }

    /// Runs the pipeline and decodes the final value into `U`.
    pub fn run_typed(&self, env: Environment) -> Result<U, SummatError>
    where
        U: DeserializeOwned,
    {
        let value = self.run(env)?;
        serde_json::from_value(value).map_err(|e| SummatError::execution(&self.name, e))
    }
}

impl<K, U> Clone for Pipeline<K, U> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            root: self.root.clone(),
            stage_count: self.stage_count,
            _shape: PhantomData,
        }
    }
}

impl<K, U> Debug for Pipeline<K, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stage_count", &self.stage_count)
            .finish()
    }
}

impl<K, U> Stage for Pipeline<K, U> {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        self.root.call(env)
    }
}
