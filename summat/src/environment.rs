//! The call environment threaded through a pipeline run.

use crate::errors::SummatError;
use std::collections::HashMap;
use std::sync::Arc;

/// Named bindings carried alongside the current value.
pub type Bindings = HashMap<String, serde_json::Value>;

/// Reserved key holding the current value when an environment is flattened.
pub const CURRENT_KEY: &str = "__last__";

/// Key of the marker standing in for a missing value inside a value.
///
/// [`Fork`](crate::combinators::Fork) places `{"$no_value": true}` in the
/// slot of a branch that ended without a value.
pub const NO_VALUE_KEY: &str = "$no_value";

/// Returns the no-value marker, `{"$no_value": true}`.
#[must_use]
pub fn no_value() -> serde_json::Value {
    serde_json::json!({ NO_VALUE_KEY: true })
}

/// Returns true if `value` is the no-value marker.
#[must_use]
pub fn is_no_value(value: &serde_json::Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.len() == 1 && map.get(NO_VALUE_KEY) == Some(&serde_json::Value::Bool(true)))
}

/// Mutable state for one pipeline run.
///
/// An environment is a flat mapping from names to JSON values plus a
/// distinguished current-value slot holding the output of the most recently
/// run stage. Bindings live behind an `Arc` and are cloned on write, so a
/// stage handed `&Environment` can never corrupt its caller's copy.
///
/// The environment also remembers the bindings it was created from, so a
/// [`Reseed`](crate::combinators::Reseed) stage can restart from the
/// original call-time inputs.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: Arc<Bindings>,
    current: Option<serde_json::Value>,
    origin: Option<Arc<Bindings>>,
}

impl Environment {
    /// Creates an empty environment with no current value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an environment from flat call-time bindings.
    ///
    /// A [`CURRENT_KEY`] entry, if present, becomes the current value. The
    /// full map is retained as the environment's origin.
    #[must_use]
    pub fn from_bindings(mut bindings: Bindings) -> Self {
        let origin = Arc::new(bindings.clone());
        let current = bindings.remove(CURRENT_KEY);
        Self {
            bindings: Arc::new(bindings),
            current,
            origin: Some(origin),
        }
    }

    /// Sets the current value.
    #[must_use]
    pub fn with_current(mut self, value: serde_json::Value) -> Self {
        self.current = Some(value);
        self
    }

    /// Adds a named binding.
    #[must_use]
    pub fn with_binding(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let key = key.into();
        if key == CURRENT_KEY {
            self.current = Some(value);
        } else {
            Arc::make_mut(&mut self.bindings).insert(key, value);
        }
        self
    }

    /// Returns the current value, failing on behalf of `stage` if absent.
    pub fn current(&self, stage: &str) -> Result<&serde_json::Value, SummatError> {
        self.current
            .as_ref()
            .ok_or_else(|| SummatError::missing_current(stage))
    }

    /// Returns the current value if one is present.
    #[must_use]
    pub fn try_current(&self) -> Option<&serde_json::Value> {
        self.current.as_ref()
    }

    /// Returns true if a current value is present.
    #[must_use]
    pub fn has_current(&self) -> bool {
        self.current.is_some()
    }

    /// Takes the current value, consuming the environment.
    #[must_use]
    pub fn into_current(self) -> Option<serde_json::Value> {
        self.current
    }

    /// Gets a named binding.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.bindings.get(key)
    }

    /// Returns the named bindings, excluding the current value.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Returns true if the environment holds nothing but a current value.
    #[must_use]
    pub fn is_only_current(&self) -> bool {
        self.current.is_some() && self.bindings.is_empty()
    }

    /// Returns the bindings this environment was created from, if recorded.
    #[must_use]
    pub fn origin(&self) -> Option<&Bindings> {
        self.origin.as_deref()
    }

    /// Flattens the environment, storing the current value under [`CURRENT_KEY`].
    #[must_use]
    pub fn to_flat_bindings(&self) -> Bindings {
        let mut flat = (*self.bindings).clone();
        if let Some(current) = &self.current {
            flat.insert(CURRENT_KEY.to_string(), current.clone());
        }
        flat
    }

    /// Records the present state as the origin unless one is already set.
    #[must_use]
    pub fn with_origin_snapshot(mut self) -> Self {
        if self.origin.is_none() {
            self.origin = Some(Arc::new(self.to_flat_bindings()));
        }
        self
    }

    pub(crate) fn set_current(&mut self, value: serde_json::Value) {
        self.current = Some(value);
    }

    pub(crate) fn replace(&mut self, mut bindings: Bindings, current: Option<serde_json::Value>) {
        bindings.remove(CURRENT_KEY);
        self.bindings = Arc::new(bindings);
        self.current = current;
    }

    pub(crate) fn replace_bindings(&mut self, mut bindings: Bindings) {
        bindings.remove(CURRENT_KEY);
        self.bindings = Arc::new(bindings);
    }

    /// Consumes the environment, returning its bindings without the current value.
    #[must_use]
    pub fn into_bindings(self) -> Bindings {
        Arc::try_unwrap(self.bindings).unwrap_or_else(|shared| (*shared).clone())
    }
}

/// Equality compares bindings and the current value; the origin is ignored.
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current && self.bindings == other.bindings
    }
}
