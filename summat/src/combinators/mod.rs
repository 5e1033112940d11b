//! The standard combinator library.
//!
//! Every combinator is a plain [`Stage`](crate::stages::Stage):
//! - Values: [`Const`], [`Lift`], [`Exec`], [`Identity`]
//! - Control flow: [`Cond`], [`Fork`]
//! - Sequences: [`Map`], [`Foldl`], [`Foldl1`], [`Index`], [`Get`], [`Json`]
//! - Bindings: [`Reseed`], [`Reset`], [`Bind`], [`Defaults`], [`PathSegments`], [`Query`]

mod basic;
mod bindings;
mod control;
mod sequence;

pub use basic::{Const, Exec, Identity, Lift, LiftMode};
pub use bindings::{Bind, Defaults, PathSegments, Query, Reseed, Reset, PATH_KEY, QUERY_KEY};
pub use control::{Cond, Fork};
pub use sequence::{Foldl, Foldl1, Get, Index, Json, Map};

use serde_json::Value;
use std::sync::Arc;

pub(crate) type ValueFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;
pub(crate) type BinaryFn = Arc<dyn Fn(Value, Value) -> anyhow::Result<Value> + Send + Sync>;

/// Truthiness of a JSON value.
///
/// `null`, `false`, numeric zero, the empty string, the empty array and the
/// empty object are falsy. Everything else is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Coerces a value to a sequence; anything but an array becomes empty.
pub(crate) fn as_sequence(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&value), "{value} should be falsy");
        }
    }

    #[test]
    fn test_truthy_values() {
        for value in [json!(true), json!(-1), json!(0.5), json!("0"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&value), "{value} should be truthy");
        }
    }

    #[test]
    fn test_as_sequence_coerces_non_arrays() {
        assert_eq!(as_sequence(&json!([1, 2])), vec![json!(1), json!(2)]);
        assert!(as_sequence(&json!("abc")).is_empty());
        assert!(as_sequence(&json!({"a": 1})).is_empty());
    }
}
