//! Signals returned by stages.

use crate::environment::{Bindings, Environment};

/// The outcome of running one stage: how the environment changes next.
///
/// | Signal | Next current value | Next bindings |
/// |---|---|---|
/// | `Keep(v)` | `v` | unchanged |
/// | `Drop(v)` | `v` | empty |
/// | `Replace(v, b)` | `v` | `b` |
/// | `Passthrough(None)` | unchanged | unchanged |
/// | `Passthrough(Some(b))` | unchanged | `b` |
/// | `NoValue(b)` | none | `b` |
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Set the current value, keep all other bindings.
    Keep(serde_json::Value),
    /// Set the current value, drop all other bindings.
    Drop(serde_json::Value),
    /// Replace the bindings wholesale and force the current value.
    Replace(serde_json::Value, Bindings),
    /// Leave the current value alone, optionally adopting new bindings.
    Passthrough(Option<Bindings>),
    /// No value is producible yet; adopt the given bindings.
    NoValue(Bindings),
}

impl Signal {
    /// Applies this signal to the environment that entered the stage.
    #[must_use]
    pub fn apply(self, mut env: Environment) -> Environment {
        match self {
            Self::Keep(value) => env.set_current(value),
            Self::Drop(value) => env.replace(Bindings::new(), Some(value)),
            Self::Replace(value, bindings) => env.replace(bindings, Some(value)),
            Self::Passthrough(None) => {}
            Self::Passthrough(Some(bindings)) => env.replace_bindings(bindings),
            Self::NoValue(bindings) => env.replace(bindings, None),
        }
        env
    }

    /// Returns the value carried by the signal, if any.
    #[must_use]
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Keep(value) | Self::Drop(value) | Self::Replace(value, _) => Some(value),
            Self::Passthrough(_) | Self::NoValue(_) => None,
        }
    }

    /// Returns true if the resulting environment does not depend on the
    /// environment the signal is applied to.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        matches!(self, Self::Drop(_) | Self::Replace(..) | Self::NoValue(_))
    }

    /// Describes a complete environment as an absolute signal.
    #[must_use]
    pub fn resolved(env: Environment) -> Self {
        match env.try_current().cloned() {
            Some(value) => Self::Replace(value, env.into_bindings()),
            None => Self::NoValue(env.into_bindings()),
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Keep(_) => "keep",
            Self::Drop(_) => "drop",
            Self::Replace(..) => "replace",
            Self::Passthrough(_) => "passthrough",
            Self::NoValue(_) => "no_value",
        }
    }
}
