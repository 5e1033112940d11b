//! Value-producing combinators.

use super::ValueFn;
use crate::environment::{Bindings, Environment};
use crate::errors::SummatError;
use crate::signal::Signal;
use crate::stages::Stage;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Ignores its input and yields a fixed value, dropping all bindings.
#[derive(Debug, Clone)]
pub struct Const {
    value: Value,
}

impl Const {
    /// Creates a constant stage.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Stage for Const {
    fn name(&self) -> &str {
        "const"
    }

    fn call(&self, _env: &Environment) -> Result<Signal, SummatError> {
        Ok(Signal::Drop(self.value.clone()))
    }
}

/// Leaves the environment untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Identity {
    /// Creates an identity stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn call(&self, _env: &Environment) -> Result<Signal, SummatError> {
        Ok(Signal::Passthrough(None))
    }
}

type EffectFn = Arc<dyn Fn(&Environment) -> anyhow::Result<()> + Send + Sync>;

/// Runs a function for its side effect only.
#[derive(Clone)]
pub struct Exec {
    name: String,
    func: EffectFn,
}

impl Exec {
    /// Creates a stage running an infallible effect.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Environment) + Send + Sync + 'static,
    {
        Self::fallible(move |env| {
            func(env);
            Ok(())
        })
    }

    /// Creates a stage running an effect that may fail.
    pub fn fallible<F>(func: F) -> Self
    where
        F: Fn(&Environment) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: "exec".to_string(),
            func: Arc::new(func),
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Debug for Exec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exec").field("name", &self.name).finish()
    }
}

impl Stage for Exec {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        (self.func)(env).map_err(|e| SummatError::execution(&self.name, format!("{e:#}")))?;
        Ok(Signal::Passthrough(None))
    }
}

/// How a [`Lift`] stage feeds its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiftMode {
    /// The function receives the current value.
    Unary,
    /// The function receives the named bindings.
    Keyword,
}

type KeywordFn = Arc<dyn Fn(&Bindings) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Clone)]
enum LiftFn {
    Unary(ValueFn),
    Keyword(KeywordFn),
}

/// Lifts a plain function into a stage.
///
/// The mode is fixed at construction: a unary lift always consumes the
/// current value and fails with `MissingCurrentValue` when there is none;
/// a keyword lift always consumes the named bindings. The result becomes the
/// only content of the environment: bindings are dropped, and a later
/// [`Reseed`](super::Reseed) restores them when needed.
#[derive(Clone)]
pub struct Lift {
    name: String,
    func: LiftFn,
}

impl Lift {
    /// Creates a lift over the current value.
    pub fn unary<F>(func: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: "lift".to_string(),
            func: LiftFn::Unary(Arc::new(func)),
        }
    }

    /// Creates a lift over the named bindings.
    pub fn keyword<F>(func: F) -> Self
    where
        F: Fn(&Bindings) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: "lift_kw".to_string(),
            func: LiftFn::Keyword(Arc::new(func)),
        }
    }

    /// Sets the stage name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the declared mode.
    #[must_use]
    pub fn mode(&self) -> LiftMode {
        match self.func {
            LiftFn::Unary(_) => LiftMode::Unary,
            LiftFn::Keyword(_) => LiftMode::Keyword,
        }
    }
}

impl Debug for Lift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lift")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .finish()
    }
}

impl Stage for Lift {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let result = match &self.func {
            LiftFn::Unary(func) => func(env.current(&self.name)?.clone()),
            LiftFn::Keyword(func) => func(env.bindings()),
        };

        result
            .map(Signal::Drop)
            .map_err(|e| SummatError::execution(&self.name, format!("{e:#}")))
    }
}
