//! Sequence and lookup combinators.
//!
//! All of these read the current value. A current value of the wrong shape
//! is coerced to an empty sequence (or empty object for [`Get`]) rather than
//! rejected; a missing current value is still an error.

use super::{as_sequence, BinaryFn, ValueFn};
use crate::environment::Environment;
use crate::errors::SummatError;
use crate::signal::Signal;
use crate::stages::Stage;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

fn wrap(stage: &str) -> impl Fn(anyhow::Error) -> SummatError + '_ {
    move |e| SummatError::execution(stage, format!("{e:#}"))
}

/// Applies a function to every element of the current sequence.
#[derive(Clone)]
pub struct Map {
    func: ValueFn,
}

impl Map {
    /// Creates a map stage.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

impl Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map").finish_non_exhaustive()
    }
}

impl Stage for Map {
    fn name(&self) -> &str {
        "map"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let items = as_sequence(env.current(self.name())?);
        let mapped = items
            .into_iter()
            .map(|item| (self.func)(item).map_err(wrap(self.name())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Signal::Drop(Value::Array(mapped)))
    }
}

/// Left fold over the current sequence from an initial accumulator.
#[derive(Clone)]
pub struct Foldl {
    func: BinaryFn,
    initial: Value,
}

impl Foldl {
    /// Creates a fold stage.
    pub fn new<F>(func: F, initial: Value) -> Self
    where
        F: Fn(Value, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            initial,
        }
    }
}

impl Debug for Foldl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Foldl")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

impl Stage for Foldl {
    fn name(&self) -> &str {
        "foldl"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let items = as_sequence(env.current(self.name())?);
        let folded = items
            .into_iter()
            .try_fold(self.initial.clone(), |acc, item| (self.func)(acc, item))
            .map_err(wrap(self.name()))?;
        Ok(Signal::Drop(folded))
    }
}

/// Left fold seeded with the first element; the sequence must be non-empty.
#[derive(Clone)]
pub struct Foldl1 {
    func: BinaryFn,
}

impl Foldl1 {
    /// Creates a fold stage without an initial accumulator.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(Value, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

impl Debug for Foldl1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Foldl1").finish_non_exhaustive()
    }
}

impl Stage for Foldl1 {
    fn name(&self) -> &str {
        "foldl1"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let mut items = as_sequence(env.current(self.name())?).into_iter();
        let first = items
            .next()
            .ok_or_else(|| SummatError::empty_sequence(self.name()))?;
        let folded = items
            .try_fold(first, |acc, item| (self.func)(acc, item))
            .map_err(wrap(self.name()))?;
        Ok(Signal::Drop(folded))
    }
}

/// Selects one element of the current sequence.
///
/// Negative indices count from the end, so `-1` is the last element.
#[derive(Debug, Clone, Copy)]
pub struct Index {
    index: i64,
}

impl Index {
    /// Creates an index stage.
    #[must_use]
    pub fn new(index: i64) -> Self {
        Self { index }
    }

    /// Creates a stage selecting the last element.
    #[must_use]
    pub fn last() -> Self {
        Self::new(-1)
    }

    fn resolve(&self, len: usize) -> Option<usize> {
        let len_i = i64::try_from(len).ok()?;
        let position = if self.index < 0 {
            len_i.checked_add(self.index)?
        } else {
            self.index
        };
        usize::try_from(position).ok().filter(|p| *p < len)
    }
}

impl Stage for Index {
    fn name(&self) -> &str {
        "index"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let mut items = as_sequence(env.current(self.name())?);
        let len = items.len();
        let position = self.resolve(len).ok_or(SummatError::IndexOutOfRange {
            index: self.index,
            len,
        })?;
        Ok(Signal::Drop(items.swap_remove(position)))
    }
}

/// Looks up a key in the current value, treated as an object.
#[derive(Debug, Clone)]
pub struct Get {
    key: String,
}

impl Get {
    /// Creates a lookup stage.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Stage for Get {
    fn name(&self) -> &str {
        "get"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let value = env
            .current(self.name())?
            .as_object()
            .and_then(|map| map.get(&self.key))
            .cloned()
            .ok_or_else(|| SummatError::execution("get", format!("no key '{}'", self.key)))?;
        Ok(Signal::Drop(value))
    }
}

/// Parses the current value as JSON text.
///
/// A string current value is parsed; any other value is already JSON and
/// passes through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Json {
    /// Creates a JSON parsing stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Json {
    fn name(&self) -> &str {
        "json"
    }

    fn call(&self, env: &Environment) -> Result<Signal, SummatError> {
        let value = match env.current(self.name())? {
            Value::String(text) => serde_json::from_str(text)
                .map_err(|e| SummatError::execution(self.name(), format!("invalid JSON: {e}")))?,
            other => other.clone(),
        };
        Ok(Signal::Drop(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env_with(value: Value) -> Environment {
        Environment::new().with_current(value)
    }

    fn concat(a: Value, b: Value) -> anyhow::Result<Value> {
        Ok(json!(format!("{}{}", a.as_str().unwrap_or(""), b.as_str().unwrap_or(""))))
    }

    #[test]
    fn test_map_elementwise() {
        let stage = Map::new(|v| Ok(json!(v.as_i64().unwrap_or(0) * 10)));
        let signal = stage.call(&env_with(json!([1, 2, 3]))).unwrap();
        assert_eq!(signal, Signal::Drop(json!([10, 20, 30])));
    }

    #[test]
    fn test_map_coerces_non_sequence() {
        let stage = Map::new(|_| anyhow::bail!("never called"));
        let signal = stage.call(&env_with(json!("not a list"))).unwrap();
        assert_eq!(signal, Signal::Drop(json!([])));
    }

    #[test]
    fn test_foldl_empty_returns_initial() {
        let stage = Foldl::new(concat, json!("init"));
        let signal = stage.call(&env_with(json!([]))).unwrap();
        assert_eq!(signal, Signal::Drop(json!("init")));
    }

    #[test]
    fn test_foldl_is_left_associative() {
        let stage = Foldl::new(concat, json!(">"));
        let signal = stage.call(&env_with(json!(["a", "b", "c"]))).unwrap();
        assert_eq!(signal, Signal::Drop(json!(">abc")));
    }

    #[test]
    fn test_foldl1_empty_fails() {
        let stage = Foldl1::new(concat);
        let err = stage.call(&env_with(json!([]))).unwrap_err();
        assert_eq!(err, SummatError::empty_sequence("foldl1"));

        let err = stage.call(&env_with(json!(42))).unwrap_err();
        assert_eq!(err, SummatError::empty_sequence("foldl1"));
    }

    #[test]
    fn test_foldl1_single_element() {
        let stage = Foldl1::new(concat);
        let signal = stage.call(&env_with(json!(["only"]))).unwrap();
        assert_eq!(signal, Signal::Drop(json!("only")));
    }

    #[test]
    fn test_index_positive_and_negative() {
        let env = env_with(json!(["a", "b", "hello"]));
        assert_eq!(Index::new(0).call(&env).unwrap(), Signal::Drop(json!("a")));
        assert_eq!(Index::last().call(&env).unwrap(), Signal::Drop(json!("hello")));
        assert_eq!(Index::new(-3).call(&env).unwrap(), Signal::Drop(json!("a")));
    }

    #[test]
    fn test_index_out_of_range() {
        let env = env_with(json!(["a"]));
        assert_eq!(
            Index::new(1).call(&env).unwrap_err(),
            SummatError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert_eq!(
            Index::new(-2).call(&env).unwrap_err(),
            SummatError::IndexOutOfRange { index: -2, len: 1 }
        );
        assert_eq!(
            Index::last().call(&env_with(json!("x"))).unwrap_err(),
            SummatError::IndexOutOfRange { index: -1, len: 0 }
        );
    }

    #[test]
    fn test_get() {
        let env = env_with(json!({"name": "owt"}));
        assert_eq!(Get::new("name").call(&env).unwrap(), Signal::Drop(json!("owt")));
        assert!(Get::new("missing").call(&env).is_err());
    }

    #[test]
    fn test_json_parses_text() {
        let signal = Json::new()
            .call(&env_with(json!(r#"{"a": [1, 2]}"#)))
            .unwrap();
        assert_eq!(signal, Signal::Drop(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_json_passes_structured_value() {
        let signal = Json::new().call(&env_with(json!([1, "x"]))).unwrap();
        assert_eq!(signal, Signal::Drop(json!([1, "x"])));
    }

    #[test]
    fn test_json_rejects_invalid_text() {
        let err = Json::new().call(&env_with(json!("{nope"))).unwrap_err();
        assert_eq!(err.code(), "SUMMAT-EXECUTION");
        assert!(Json::new().call(&Environment::new()).is_err());
    }
}
