//! Combinators that reshape the named bindings.

use crate::environment::{Bindings, Environment};
use crate::errors::SummatError;
use crate::signal::Signal;
use crate::stages::Stage;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Binding holding the request path.
pub const PATH_KEY: &str = "path";

/// Binding holding the decoded query parameters.
pub const QUERY_KEY: &str = "query";

type SupplierFn = Arc<dyn Fn() -> Bindings + Send + Sync>;

#[derive(Clone)]
enum ReseedSource {
    Supplier(SupplierFn),
    Origin,
}

/// Discards the environment and rebuilds it from fresh bindings.
///
/// The rebuilt environment has no current value until a later stage
/// produces one.
#[derive(Clone)]
pub struct Reseed {
    source: ReseedSource,
}

impl Reseed {
    /// Rebuilds from the bindings returned by `supplier`.
    pub fn new<F>(supplier: F) -> Self
    where
        F: Fn() -> Bindings + Send + Sync + 'static,
    {
        Self {
            source: ReseedSource::Supplier(Arc::new(supplier)),
        }
    }

    /// Rebuilds from the call-time bindings the environment was created with.
    #[must_use]
    pub fn original() -> Self {
        Self {
            source: ReseedSource::Origin,
        }
    }
}

impl Debug for Reseed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            ReseedSource::Supplier(_) => "supplier",
            ReseedSource::Origin => "origin",
        };
        f.debug_struct("Reseed").field("source", &source).finish()
    }
}

impl Stage for Reseed {
    fn name(&self) -> &str {
        "reseed"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let bindings = match &self.source {
            ReseedSource::Supplier(supplier) => supplier(),
            ReseedSource::Origin => env.origin().cloned().unwrap_or_default(),
        };
        Ok(Signal::NoValue(bindings))
    }
}

/// Clears the current value, keeping the bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reset;

impl Reset {
    /// Creates a reset stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Reset {
    fn name(&self) -> &str {
        "reset"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        Ok(Signal::NoValue(env.bindings().clone()))
    }
}

/// Copies the current value into a named binding.
#[derive(Debug, Clone)]
pub struct Bind {
    name: String,
}

impl Bind {
    /// Creates a bind stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Stage for Bind {
    fn name(&self) -> &str {
        "bind"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let current = env.current(self.name())?.clone();
        let mut bindings = env.bindings().clone();
        bindings.insert(self.name.clone(), current.clone());
        Ok(Signal::Replace(current, bindings))
    }
}

/// Fills in bindings the caller did not supply.
#[derive(Debug, Clone, Default)]
pub struct Defaults {
    defaults: Bindings,
}

impl Defaults {
    /// Creates a defaults stage.
    #[must_use]
    pub fn new(defaults: Bindings) -> Self {
        Self { defaults }
    }
}

impl Stage for Defaults {
    fn name(&self) -> &str {
        "defaults"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let mut merged = self.defaults.clone();
        merged.extend(env.bindings().iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Signal::Passthrough(Some(merged)))
    }
}

/// Splits the `path` binding into its non-empty segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathSegments;

impl PathSegments {
    /// Creates a path segment stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for PathSegments {
    fn name(&self) -> &str {
        "path"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let path = env
            .get(PATH_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| SummatError::execution(self.name(), "no string 'path' binding"))?;
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect();
        Ok(Signal::Keep(Value::Array(segments)))
    }
}

/// Exposes the `query` binding as the current value.
///
/// A missing binding yields an empty object.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query;

impl Query {
    /// Creates a query stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Query {
    fn name(&self) -> &str {
        "query"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let query = env
            .get(QUERY_KEY)
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        Ok(Signal::Keep(query))
    }
}
