//! Running a resolved handler stage.
//!
//! Pipeline runs are synchronous. A [`HandlerRunner`] decides where that
//! synchronous work happens relative to the async dispatcher, and is the
//! place to layer limits such as timeouts.

use crate::errors::OwtError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use summat::{evaluate, Environment, Stage};

/// Runs a handler stage to its final value.
#[async_trait]
pub trait HandlerRunner: Send + Sync + Debug {
    /// Runs `stage` against `env`.
    async fn run(&self, stage: Arc<dyn Stage>, env: Environment) -> Result<Value, OwtError>;
}

/// Runs the handler on the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineRunner;

#[async_trait]
impl HandlerRunner for InlineRunner {
    async fn run(&self, stage: Arc<dyn Stage>, env: Environment) -> Result<Value, OwtError> {
        Ok(evaluate(&*stage, env)?)
    }
}

/// Runs the handler on tokio's blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingRunner;

#[async_trait]
impl HandlerRunner for BlockingRunner {
    async fn run(&self, stage: Arc<dyn Stage>, env: Environment) -> Result<Value, OwtError> {
        let result = tokio::task::spawn_blocking(move || evaluate(&*stage, env))
            .await
            .map_err(|e| OwtError::Runner(format!("handler task failed: {e}")))?;
        Ok(result?)
    }
}

/// Bounds another runner's wall-clock time.
///
/// On timeout the call fails; work already handed to a blocking thread is
/// not interrupted.
#[derive(Debug, Clone)]
pub struct TimeoutRunner {
    inner: Arc<dyn HandlerRunner>,
    timeout: Duration,
}

impl TimeoutRunner {
    /// Wraps `inner` with a deadline.
    #[must_use]
    pub fn new(inner: Arc<dyn HandlerRunner>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl HandlerRunner for TimeoutRunner {
    async fn run(&self, stage: Arc<dyn Stage>, env: Environment) -> Result<Value, OwtError> {
        tokio::time::timeout(self.timeout, self.inner.run(stage, env))
            .await
            .map_err(|_| {
                OwtError::Runner(format!("handler timed out after {:?}", self.timeout))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use summat::combinators::{Const, Exec, Reset};
    use summat::{compose, SummatError};

    #[tokio::test]
    async fn test_inline_and_blocking_agree() {
        let stage: Arc<dyn Stage> = Arc::new(Const::new(json!("done")));

        let inline = InlineRunner.run(stage.clone(), Environment::new()).await.unwrap();
        let blocking = BlockingRunner.run(stage, Environment::new()).await.unwrap();

        assert_eq!(inline, json!("done"));
        assert_eq!(blocking, json!("done"));
    }

    #[tokio::test]
    async fn test_missing_value_is_pipeline_error() {
        let err = BlockingRunner
            .run(Arc::new(Reset::new()), Environment::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OwtError::Pipeline(SummatError::MissingCurrentValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let slow = compose(
            Arc::new(Exec::new(|_| std::thread::sleep(Duration::from_millis(200)))),
            Arc::new(Const::new(json!(1))),
        );
        let runner = TimeoutRunner::new(Arc::new(BlockingRunner), Duration::from_millis(10));

        let err = runner.run(slow, Environment::new()).await.unwrap_err();
        assert!(matches!(err, OwtError::Runner(_)));
    }
}
