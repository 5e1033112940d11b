//! End-to-end dispatch through decoding, caching and handler stages.

use owt::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use summat::pipeline::pipe;
use summat::prelude::*;

fn counting_stage(counter: Arc<AtomicUsize>) -> Arc<dyn Stage> {
    Arc::new(FnStage::new("counter", move |_env| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Signal::Drop(json!(format!("R{n}"))))
    }))
}

fn dispatcher_with(entry_point: &str, stage: Arc<dyn Stage>) -> Dispatcher {
    let loader = RegistryLoader::new().with_entry_point(entry_point, stage);
    Dispatcher::new(RuntimeContext::new(Arc::new(loader)))
}

fn kwargs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn call(path: &str, request: &UnsafeRequest) -> InboundCall {
    InboundCall::new(path).with_body(request.to_json().unwrap())
}

#[tokio::test]
async fn cache_hit_returns_stored_response() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher_with("run", counting_stage(counter.clone()));
    let request = UnsafeRequest::new("handler").with_cache(true);

    let first = dispatcher.dispatch(&call("/x", &request)).await;
    let second = dispatcher.dispatch(&call("/x", &request)).await;

    assert_eq!(first, Response::text("R1"));
    assert_eq!(second.body().to_bytes(), first.body().to_bytes());
    assert_eq!(second, first);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn endpoint_key_ignores_arguments() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher_with("run", counting_stage(counter.clone()));
    let base = UnsafeRequest::new("handler").with_cache(true).with_cache_kwargs(false);

    let first = dispatcher
        .dispatch(&call("/x", &base.clone().with_kwargs(&kwargs(json!({"n": 1})))))
        .await;
    let second = dispatcher
        .dispatch(&call("/x", &base.with_kwargs(&kwargs(json!({"n": 2})))))
        .await;

    assert_eq!(first, Response::text("R1"));
    assert_eq!(second, Response::text("R1"));
    assert_eq!(dispatcher.context().cache().keys(), vec![CacheKey::endpoint("/x")]);
}

#[tokio::test]
async fn argument_keys_are_independent() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher_with("run", counting_stage(counter.clone()));
    let base = UnsafeRequest::new("handler").with_cache(true).with_cache_kwargs(true);
    let one = base.clone().with_kwargs(&kwargs(json!({"n": 1})));
    let two = base.with_kwargs(&kwargs(json!({"n": 2})));

    let a = dispatcher.dispatch(&call("/x", &one)).await;
    let b = dispatcher.dispatch(&call("/x", &two)).await;
    let a_again = dispatcher.dispatch(&call("/x", &one)).await;

    assert_eq!(a, Response::text("R1"));
    assert_eq!(b, Response::text("R2"));
    assert_eq!(a_again, a);
    assert_eq!(dispatcher.context().cache().len(), 2);
}

#[tokio::test]
async fn override_key_shares_entries_across_paths() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher_with("run", counting_stage(counter.clone()));
    let request = UnsafeRequest::new("handler")
        .with_cache(true)
        .with_cache_kwargs(true)
        .with_cache_key_override(CacheKey::endpoint("shared"));

    let first = dispatcher.dispatch(&call("/a", &request)).await;
    let second = dispatcher.dispatch(&call("/b", &request)).await;

    assert_eq!(first, second);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(dispatcher.context().cache().contains(&CacheKey::endpoint("shared")));
}

#[tokio::test]
async fn failures_are_not_cached() {
    let counter = Arc::new(AtomicUsize::new(0));
    let attempts = counter.clone();
    let flaky: Arc<dyn Stage> = Arc::new(FnStage::new("flaky", move |_env| {
        if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(SummatError::execution("flaky", "first call fails"))
        } else {
            Ok(Signal::Drop(json!("ok")))
        }
    }));
    let dispatcher = dispatcher_with("run", flaky);
    let request = UnsafeRequest::new("handler").with_cache(true);

    let failed = dispatcher.dispatch(&call("/x", &request)).await;
    assert!(failed.is_failure());
    assert_eq!(failed.status(), 500);
    assert!(dispatcher.context().cache().is_empty());

    let ok = dispatcher.dispatch(&call("/x", &request)).await;
    assert_eq!(ok, Response::text("ok"));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn decode_errors_stop_before_any_stage() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = dispatcher_with("run", counting_stage(counter.clone()));

    let mut bad_kwargs = UnsafeRequest::new("handler");
    bad_kwargs.kwargs_b64 = Some("!!not base64!!".to_string());

    for inbound in [
        InboundCall::new("/x").with_body("{}"),
        InboundCall::new("/x").with_body("garbage"),
        call("/x", &bad_kwargs),
    ] {
        let response = dispatcher.dispatch(&inbound).await;
        assert!(response.is_failure());
        assert_eq!(response.status(), 400);
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn environment_carries_path_query_and_kwargs() {
    let handler = pipe("greet")
        .fork::<String, Value>(
            PipelineBuilder::<Bindings>::new("segments")
                .path()
                .last::<String>()
                .build()
                .unwrap(),
            PipelineBuilder::<Bindings>::new("name")
                .lift_kw(|kwargs: Bindings| kwargs.get("name").cloned().unwrap_or(Value::Null))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let dispatcher = dispatcher_with("main", Arc::new(handler));
    let request = UnsafeRequest::new("handler")
        .with_fn_name("main")
        .with_kwargs(&kwargs(json!({"name": "World"})));

    let response = dispatcher.dispatch(&call("/a/b/hello", &request)).await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), &Body::Json(json!(["hello", "World"])));
}

#[tokio::test]
async fn explicit_status_and_bytes() {
    let dispatcher = dispatcher_with(
        "run",
        Arc::new(Const::new(json!({"$status": 201, "$body": {"$bytes": "AAEC"}}))),
    );

    let response = dispatcher
        .dispatch(&call("/bin", &UnsafeRequest::new("handler")))
        .await;

    assert_eq!(response.status(), 201);
    assert_eq!(response.body(), &Body::Bytes(vec![0, 1, 2]));
    assert!(!response.is_failure());
}

#[tokio::test]
async fn fork_pair_is_json_not_status() {
    let fork = Fork::new(
        Arc::new(Const::new(json!(10))),
        Arc::new(Const::new(json!(404))),
    );
    let dispatcher = dispatcher_with("run", Arc::new(fork));

    let response = dispatcher
        .dispatch(&call("/pair", &UnsafeRequest::new("handler")))
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), &Body::Json(json!([10, 404])));
}

#[tokio::test]
async fn query_parameters_are_accepted() {
    use base64::Engine as _;

    let dispatcher = dispatcher_with("run", Arc::new(PathSegments::new()));
    let code_b64 = base64::engine::general_purpose::STANDARD.encode("handler");
    let inbound = InboundCall::new("/a/b").with_query_param("code_b64", code_b64);

    let response = dispatcher.dispatch(&inbound).await;
    assert_eq!(response.body(), &Body::Json(json!(["a", "b"])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_store_one_winner() {
    let counter = Arc::new(AtomicUsize::new(0));
    let dispatcher = Arc::new(dispatcher_with("run", counting_stage(counter.clone())));
    let request = UnsafeRequest::new("handler").with_cache(true);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let inbound = call("/race", &request);
            tokio::spawn(async move { dispatcher.dispatch(&inbound).await })
        })
        .collect();

    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap());
    }

    let stored = dispatcher
        .context()
        .cache()
        .get(&CacheKey::endpoint("/race"))
        .unwrap();
    assert!(responses.iter().all(|r| *r == stored));
    assert_eq!(dispatcher.context().cache().len(), 1);
}
