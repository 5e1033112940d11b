//! Dispatching inbound calls through the cache to handler stages.
//!
//! Each call moves through these states, all logged with the call id:
//!
//! ```text
//! Idle -> KeyDerived -> CacheHit -> Done
//!                    -> CacheMiss -> Running -> Stored -> Done
//!                                            -> Failed -> Done
//! ```
//!
//! Calls that bypass the cache go from `KeyDerived` straight to `Running`.

use crate::cache::CachePolicy;
use crate::context::RuntimeContext;
use crate::errors::OwtError;
use crate::request::{DecodedCall, InboundCall};
use crate::response::Response;
use std::time::Instant;
use uuid::Uuid;

/// Runs calls against a [`RuntimeContext`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: RuntimeContext,
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(context: RuntimeContext) -> Self {
        Self { context }
    }

    /// Returns the runtime context.
    #[must_use]
    pub fn context(&self) -> &RuntimeContext {
        &self.context
    }

    /// Dispatches a call, always producing a response.
    ///
    /// Errors become failure responses (see [`Response::is_failure`]) and are
    /// never cached.
    pub async fn dispatch(&self, call: &InboundCall) -> Response {
        let call_id = Uuid::new_v4();
        match self.try_dispatch(call_id, call).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    %call_id,
                    path = %call.path,
                    state = "failed",
                    code = e.code(),
                    error = %e,
                    "Call failed"
                );
                Response::failure(&e)
            }
        }
    }

    /// Dispatches a call, returning errors instead of failure responses.
    pub async fn try_dispatch(&self, call_id: Uuid, call: &InboundCall) -> Result<Response, OwtError> {
        self.context.authorize(call.credentials.as_ref())?;

        let decoded = DecodedCall::decode(call)?;
        let policy = CachePolicy::from_request(&decoded.request);
        let key = policy.key(&call.path, decoded.request.kwargs_b64.as_deref());
        tracing::debug!(
            %call_id,
            path = %call.path,
            state = "key_derived",
            ?policy,
            "Derived cache policy"
        );

        if let Some(key) = &key {
            if let Some(hit) = self.context.cache().get(key) {
                tracing::info!(%call_id, %key, state = "cache_hit", "Cache hit");
                return Ok(hit);
            }
            tracing::info!(%call_id, %key, state = "cache_miss", "Cache miss");
        }

        let stage = self
            .context
            .loader()
            .load(&decoded.code, &decoded.request.fn_name)?;
        tracing::info!(
            %call_id,
            entry_point = %decoded.request.fn_name,
            stage = stage.name(),
            state = "running",
            "Running handler"
        );

        let started = Instant::now();
        let value = self.context.runner().run(stage, decoded.environment).await?;
        let response = Response::from_value(value)?;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let Some(key) = key else {
            tracing::info!(%call_id, duration_ms, status = response.status(), state = "done", "Call complete");
            return Ok(response);
        };

        let stored = self.context.cache().store(key.clone(), response);
        tracing::info!(
            %call_id,
            %key,
            duration_ms,
            status = stored.status(),
            state = "stored",
            "Cached result"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BasicAuth;
    use crate::loader::RegistryLoader;
    use crate::request::{Credentials, UnsafeRequest};
    use crate::runner::InlineRunner;
    use serde_json::json;
    use std::sync::Arc;
    use summat::combinators::Const;

    fn dispatcher() -> Dispatcher {
        let loader = RegistryLoader::new().with_entry_point("run", Arc::new(Const::new(json!("hi"))));
        let context = RuntimeContext::new(Arc::new(loader)).with_runner(Arc::new(InlineRunner));
        Dispatcher::new(context)
    }

    fn call(request: &UnsafeRequest) -> InboundCall {
        InboundCall::new("/x").with_body(request.to_json().unwrap())
    }

    #[tokio::test]
    async fn test_bypass_does_not_store() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch(&call(&UnsafeRequest::new("code"))).await;

        assert_eq!(response, Response::text("hi"));
        assert!(dispatcher.context().cache().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_entry_point_is_500() {
        let dispatcher = dispatcher();
        let request = UnsafeRequest::new("code").with_fn_name("main").with_cache(true);
        let response = dispatcher.dispatch(&call(&request)).await;

        assert!(response.is_failure());
        assert_eq!(response.status(), 500);
        assert!(dispatcher.context().cache().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_401() {
        let dispatcher = Dispatcher::new(
            dispatcher()
                .context()
                .clone()
                .with_auth(BasicAuth::new().with_default_user()),
        );
        let request = UnsafeRequest::new("code");

        let denied = dispatcher.dispatch(&call(&request)).await;
        assert_eq!(denied.status(), 401);

        let allowed = dispatcher
            .dispatch(&call(&request).with_credentials(Credentials::new("owt", "owt")))
            .await;
        assert_eq!(allowed, Response::text("hi"));
    }
}
