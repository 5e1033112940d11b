//! Branching combinators.

use super::is_truthy;
use crate::environment::{no_value, Environment};
use crate::errors::SummatError;
use crate::signal::Signal;
use crate::stages::Stage;
use std::sync::Arc;

/// Runs exactly one of two stages, chosen by the current value's truthiness.
///
/// See [`is_truthy`] for the rule. The branch not taken is never called.
#[derive(Debug, Clone)]
pub struct Cond {
    then_stage: Arc<dyn Stage>,
    else_stage: Arc<dyn Stage>,
}

impl Cond {
    /// Creates a conditional stage.
    #[must_use]
    pub fn new(then_stage: Arc<dyn Stage>, else_stage: Arc<dyn Stage>) -> Self {
        Self {
            then_stage,
            else_stage,
        }
    }
}

impl Stage for Cond {
    fn name(&self) -> &str {
        "cond"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        if is_truthy(env.current(self.name())?) {
            self.then_stage.call(env)
        } else {
            self.else_stage.call(env)
        }
    }
}

/// Runs two stages against the same input and pairs their values.
///
/// Both branches receive the identical input environment. Their resulting
/// bindings are discarded; only the two values survive, as a two-element
/// array. A branch that ends without a value contributes the
/// [`no_value`](crate::environment::no_value) marker, so it stays
/// distinguishable from a branch that produced `null`.
#[derive(Debug, Clone)]
pub struct Fork {
    left: Arc<dyn Stage>,
    right: Arc<dyn Stage>,
}

impl Fork {
    /// Creates a fork stage.
    #[must_use]
    pub fn new(left: Arc<dyn Stage>, right: Arc<dyn Stage>) -> Self {
        Self { left, right }
    }

    fn branch(stage: &dyn Stage, env: &Environment) -> Result<serde_json::Value, SummatError> {
        let out = stage.call(env)?.apply(env.clone());
        Ok(out.into_current().unwrap_or_else(no_value))
    }
}

impl Stage for Fork {
    fn name(&self) -> &str {
        "fork"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let left = Self::branch(&*self.left, env)?;
        let right = Self::branch(&*self.right, env)?;
        Ok(Signal::Drop(serde_json::Value::Array(vec![left, right])))
    }
}
