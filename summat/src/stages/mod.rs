//! Stage trait and sequential composition.
//!
//! Stages are the fundamental units of work in a summat pipeline.

use crate::environment::Environment;
use crate::errors::SummatError;
use crate::signal::Signal;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for pipeline stages.
///
/// A stage maps an environment to a [`Signal`]. Stages may be effectful
/// internally but have no side channel back into the pipeline: everything
/// they contribute travels through the returned signal.
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Runs the stage against an environment.
    ///
    /// # Arguments
    ///
    /// * `env` - The environment produced by the previous stage
    ///
    /// # Returns
    ///
    /// The signal describing the next environment.
    fn call(&self, env: &Environment) -> Result<Signal, SummatError>;
}

impl<S: Stage + ?Sized> Stage for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        (**self).call(env)
    }
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        (**self).call(env)
    }
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&Environment) -> Result<Signal, SummatError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&Environment) -> Result<Signal, SummatError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&Environment) -> Result<Signal, SummatError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&Environment) -> Result<Signal, SummatError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        (self.func)(env)
    }
}

/// Two stages run in sequence, behaving as one.
///
/// The second stage sees the environment produced by applying the first
/// stage's signal. Absolute signals from the second stage are returned as-is;
/// relative ones (`Keep`, `Passthrough`) are resolved against the
/// intermediate environment, so applying the composite's signal to the
/// original input always lands on the same environment as running both
/// stages by hand. This keeps composition associative with
/// [`Identity`](crate::combinators::Identity) as its unit.
#[derive(Debug, Clone)]
pub struct Compose {
    name: String,
    first: Arc<dyn Stage>,
    second: Arc<dyn Stage>,
}

impl Compose {
    /// Creates a composite of `first` followed by `second`.
    #[must_use]
    pub fn new(first: Arc<dyn Stage>, second: Arc<dyn Stage>) -> Self {
        let name = format!("{} >> {}", first.name(), second.name());
        Self {
            name,
            first,
            second,
        }
    }

    /// Returns the stage that runs first.
    #[must_use]
    pub fn first(&self) -> &Arc<dyn Stage> {
        &self.first
    }

    /// Returns the stage that runs second.
    #[must_use]
    pub fn second(&self) -> &Arc<dyn Stage> {
        &self.second
    }
}

impl Stage for Compose {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let signal = self.first.call(env)?;
        tracing::trace!(stage = %self.first.name(), signal = signal.kind(), "Stage finished");
        let intermediate = signal.apply(env.clone());

        let signal = self.second.call(&intermediate)?;
        tracing::trace!(stage = %self.second.name(), signal = signal.kind(), "Stage finished");

        if signal.is_absolute() {
            Ok(signal)
        } else {
            Ok(Signal::resolved(signal.apply(intermediate)))
        }
    }
}

/// Composes two stages into one that runs `first` then `second`.
#[must_use]
pub fn compose(first: Arc<dyn Stage>, second: Arc<dyn Stage>) -> Arc<dyn Stage> {
    Arc::new(Compose::new(first, second))
}

/// Runs a stage to completion and returns the final current value.
///
/// The environment's present bindings are recorded as its origin first, so
/// [`Reseed::original`](crate::combinators::Reseed::original) can restore them.
///
/// # Errors
///
/// Propagates the stage failure, or `MissingCurrentValue` naming the stage if
/// the run ends without a value.
pub fn evaluate(stage: &dyn Stage, env: Environment) -> Result<serde_json::Value, SummatError> {
    let env = env.with_origin_snapshot();
    let signal = stage.call(&env).map_err(|e| {
        tracing::debug!(stage = stage.name(), error = %e, "Stage run failed");
        e
    })?;

    signal
        .apply(env)
        .into_current()
        .ok_or_else(|| SummatError::missing_current(stage.name()))
}
