//! Fluent, typed pipeline builder.

use super::Pipeline;
use crate::combinators::{
    Bind, Cond, Const, Defaults, Exec, Foldl, Foldl1, Fork, Get, Identity, Index, Json, Lift,
    Map,
    PathSegments, Query, Reseed, Reset,
};
use crate::environment::{Bindings, Environment};
use crate::errors::SummatError;
use crate::stages::{compose, Stage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Marker for a builder whose current value has been cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unset;

/// Builder for typed pipelines.
///
/// `K` is the keyword shape the pipeline is called with (any
/// `DeserializeOwned` struct, or [`Bindings`]); `U` is the declared type of
/// the current value after the last appended stage. Each combinator method
/// appends one stage and returns a builder re-typed to that stage's output.
/// Typed closures are bridged through `serde_json`, so a value that does not
/// decode into the declared type fails the run with an execution error.
pub struct PipelineBuilder<K = Bindings, U = Value> {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    error: Option<SummatError>,
    _shape: PhantomData<fn() -> (K, U)>,
}

/// Starts a builder over plain [`Bindings`].
#[must_use]
pub fn pipe(name: impl Into<String>) -> PipelineBuilder<Bindings, Value> {
    PipelineBuilder::new(name)
}

impl<K> PipelineBuilder<K, Value> {
    /// Creates a new, empty builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            error: None,
            _shape: PhantomData,
        }
    }
}

impl<K, U> PipelineBuilder<K, U> {
    fn retype<V>(self) -> PipelineBuilder<K, V> {
        PipelineBuilder {
            name: self.name,
            stages: self.stages,
            error: self.error,
            _shape: PhantomData,
        }
    }

    fn push<V>(mut self, stage: Arc<dyn Stage>) -> PipelineBuilder<K, V> {
        self.stages.push(stage);
        self.retype()
    }

    fn encode<T: Serialize>(&mut self, stage: &str, value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                self.error
                    .get_or_insert_with(|| SummatError::execution(stage, e));
                Value::Null
            }
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stages have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Appends an arbitrary stage, declaring its output type.
    #[must_use]
    pub fn then<V>(self, stage: impl Stage + 'static) -> PipelineBuilder<K, V> {
        self.push(Arc::new(stage))
    }

    /// Re-declares the current value type without adding a stage.
    #[must_use]
    pub fn cast<V>(self) -> PipelineBuilder<K, V> {
        self.retype()
    }

    /// Appends a unary function of the current value.
    #[must_use]
    pub fn lift<V, F>(self, func: F) -> PipelineBuilder<K, V>
    where
        U: DeserializeOwned + 'static,
        V: Serialize + 'static,
        F: Fn(U) -> V + Send + Sync + 'static,
    {
        self.try_lift(move |input| Ok(func(input)))
    }

    /// Appends a fallible unary function of the current value.
    #[must_use]
    pub fn try_lift<V, F>(self, func: F) -> PipelineBuilder<K, V>
    where
        U: DeserializeOwned + 'static,
        V: Serialize + 'static,
        F: Fn(U) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        let stage = Lift::unary(move |value| {
            let input: U = serde_json::from_value(value)?;
            Ok(serde_json::to_value(func(input)?)?)
        });
        self.push(Arc::new(stage))
    }

    /// Appends a function of the named bindings, decoded as `K`.
    #[must_use]
    pub fn lift_kw<V, F>(self, func: F) -> PipelineBuilder<K, V>
    where
        K: DeserializeOwned + 'static,
        V: Serialize + 'static,
        F: Fn(K) -> V + Send + Sync + 'static,
    {
        let stage = Lift::keyword(move |bindings| {
            let object: serde_json::Map<String, Value> = bindings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let shape: K = serde_json::from_value(Value::Object(object))?;
            Ok(serde_json::to_value(func(shape))?)
        });
        self.push(Arc::new(stage))
    }

    /// Appends a side effect over the current value.
    #[must_use]
    pub fn exec<F>(self, func: F) -> Self
    where
        U: DeserializeOwned + 'static,
        F: Fn(&U) + Send + Sync + 'static,
    {
        let stage = Exec::fallible(move |env| {
            let value = env
                .try_current()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("exec requires a current value"))?;
            let input: U = serde_json::from_value(value)?;
            func(&input);
            Ok(())
        });
        self.push(Arc::new(stage))
    }

    /// Appends a side effect over the whole environment.
    #[must_use]
    pub fn inspect<F>(self, func: F) -> Self
    where
        F: Fn(&Environment) + Send + Sync + 'static,
    {
        self.push(Arc::new(Exec::new(func)))
    }

    /// Appends a constant.
    #[must_use]
    pub fn constant<V: Serialize>(mut self, value: V) -> PipelineBuilder<K, V> {
        let value = self.encode("const", &value);
        self.push(Arc::new(Const::new(value)))
    }

    /// Appends a no-op stage.
    #[must_use]
    pub fn identity(self) -> Self {
        self.push(Arc::new(Identity::new()))
    }

    /// Appends a branch on the current value's truthiness.
    #[must_use]
    pub fn cond<V>(
        self,
        then_stage: impl Stage + 'static,
        else_stage: impl Stage + 'static,
    ) -> PipelineBuilder<K, V> {
        self.push(Arc::new(Cond::new(Arc::new(then_stage), Arc::new(else_stage))))
    }

    /// Appends a fork pairing the outputs of two stages.
    #[must_use]
    pub fn fork<L, R>(
        self,
        left: impl Stage + 'static,
        right: impl Stage + 'static,
    ) -> PipelineBuilder<K, (L, R)> {
        self.push(Arc::new(Fork::new(Arc::new(left), Arc::new(right))))
    }

    /// Appends an elementwise map over the current sequence.
    #[must_use]
    pub fn map<A, V, F>(self, func: F) -> PipelineBuilder<K, Vec<V>>
    where
        A: DeserializeOwned + 'static,
        V: Serialize + 'static,
        F: Fn(A) -> V + Send + Sync + 'static,
    {
        let stage = Map::new(move |item| {
            let item: A = serde_json::from_value(item)?;
            Ok(serde_json::to_value(func(item))?)
        });
        self.push(Arc::new(stage))
    }

    /// Appends a left fold over the current sequence.
    #[must_use]
    pub fn foldl<A, V, F>(mut self, func: F, initial: V) -> PipelineBuilder<K, V>
    where
        A: DeserializeOwned + 'static,
        V: Serialize + DeserializeOwned + 'static,
        F: Fn(V, A) -> V + Send + Sync + 'static,
    {
        let initial = self.encode("foldl", &initial);
        let stage = Foldl::new(
            move |acc, item| {
                let acc: V = serde_json::from_value(acc)?;
                let item: A = serde_json::from_value(item)?;
                Ok(serde_json::to_value(func(acc, item))?)
            },
            initial,
        );
        self.push(Arc::new(stage))
    }

    /// Appends a left fold seeded with the first element.
    #[must_use]
    pub fn foldl1<A, F>(self, func: F) -> PipelineBuilder<K, A>
    where
        A: Serialize + DeserializeOwned + 'static,
        F: Fn(A, A) -> A + Send + Sync + 'static,
    {
        let stage = Foldl1::new(move |acc, item| {
            let acc: A = serde_json::from_value(acc)?;
            let item: A = serde_json::from_value(item)?;
            Ok(serde_json::to_value(func(acc, item))?)
        });
        self.push(Arc::new(stage))
    }

    /// Appends an element lookup; negative indices count from the end.
    #[must_use]
    pub fn index<V>(self, index: i64) -> PipelineBuilder<K, V> {
        self.push(Arc::new(Index::new(index)))
    }

    /// Appends a lookup of the last element.
    #[must_use]
    pub fn last<V>(self) -> PipelineBuilder<K, V> {
        self.push(Arc::new(Index::last()))
    }

    /// Appends a key lookup on the current value.
    #[must_use]
    pub fn get<V>(self, key: impl Into<String>) -> PipelineBuilder<K, V> {
        self.push(Arc::new(Get::new(key)))
    }

    /// Appends a stage parsing a string current value as JSON.
    #[must_use]
    pub fn json<V>(self) -> PipelineBuilder<K, V> {
        self.push(Arc::new(Json::new()))
    }

    /// Appends a stage yielding the request path segments.
    #[must_use]
    pub fn path(self) -> PipelineBuilder<K, Vec<String>> {
        self.push(Arc::new(PathSegments::new()))
    }

    /// Appends a stage yielding the query parameters.
    #[must_use]
    pub fn query(self) -> PipelineBuilder<K, Bindings> {
        self.push(Arc::new(Query::new()))
    }

    /// Appends a stage copying the current value into `name`.
    #[must_use]
    pub fn bind(self, name: impl Into<String>) -> Self {
        self.push(Arc::new(Bind::new(name)))
    }

    /// Appends default bindings; caller-supplied bindings win.
    #[must_use]
    pub fn defaults(self, defaults: Bindings) -> Self {
        self.push(Arc::new(Defaults::new(defaults)))
    }

    /// Appends a stage rebuilding the bindings from `supplier`.
    #[must_use]
    pub fn reseed<F>(self, supplier: F) -> PipelineBuilder<K, Unset>
    where
        F: Fn() -> Bindings + Send + Sync + 'static,
    {
        self.push(Arc::new(Reseed::new(supplier)))
    }

    /// Appends a stage restarting from the call-time bindings.
    #[must_use]
    pub fn input(self) -> PipelineBuilder<K, Unset> {
        self.push(Arc::new(Reseed::original()))
    }

    /// Appends a stage clearing the current value.
    #[must_use]
    pub fn reset(self) -> PipelineBuilder<K, Unset> {
        self.push(Arc::new(Reset::new()))
    }

    /// Compiles the stage list into a single pipeline.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPipeline` if no stages were added, or the first error
    /// recorded while encoding a constant.
    pub fn build(self) -> Result<Pipeline<K, U>, SummatError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let stage_count = self.stages.len();
        let root = self
            .stages
            .into_iter()
            .reduce(compose)
            .ok_or_else(|| SummatError::EmptyPipeline {
                name: self.name.clone(),
            })?;

        tracing::debug!(pipeline = %self.name, stage_count, "Pipeline compiled");
        Ok(Pipeline::new(self.name, root, stage_count))
    }
}

impl<K, U> std::fmt::Debug for PipelineBuilder<K, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages.len())
            .finish()
    }
}
