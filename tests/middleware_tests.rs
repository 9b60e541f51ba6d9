use std::sync::Arc;
use std::time::Duration;

use brrtrpc::failure::FailureOrigin;
use brrtrpc::prelude::*;
use brrtrpc::registry::Registry;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::Level;

use tracing_util::TestTracing;

fn registry_with(builder: RegistryBuilder) -> Registry {
    let people = MethodTable::new()
        .with("list", |_ctx: Context| json!({"message": "Listing"}))
        .with("get", |_ctx: Context| -> Result<Value, Failure> {
            Err(Failure::with_code(5, "not found"))
        })
        .with("slow", |_ctx: Context| {
            Outcome::deferred(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                json!({"slow": true})
            })
        });
    builder
        .add_service(
            ServiceDefinition::new("testapp.PersonService", people)
                .unary("list")
                .unary("get")
                .unary("slow"),
        )
        .build()
        .expect("valid registry")
}

async fn call(registry: &Registry, method: &str) -> Result<Value, Failure> {
    registry
        .method(method)
        .expect("declared method")
        .call(Call::new(json!({})))
        .await
}

#[tokio::test]
async fn test_metrics_middleware_counts() {
    let _tracing = TestTracing::init();
    let metrics = MetricsMiddleware::new();
    let registry = registry_with(
        RegistryBuilder::new()
            .use_middleware(metrics.clone())
            .use_middleware(TracingMiddleware),
    );

    assert_eq!(metrics.call_count(), 0);
    assert_eq!(metrics.average_latency(), Duration::from_nanos(0));

    let result = call(&registry, "testapp.PersonService.list").await;
    assert_eq!(result, Ok(json!({"message": "Listing"})));
    assert_eq!(metrics.call_count(), 1);
    assert_eq!(metrics.failure_count(), 0);
}

#[tokio::test]
async fn test_metrics_middleware_counts_failures() {
    let metrics = MetricsMiddleware::new();
    let registry = registry_with(RegistryBuilder::new().use_middleware(metrics.clone()));

    let failed = call(&registry, "testapp.PersonService.get").await;
    assert_eq!(failed, Err(Failure::with_code(5, "not found")));
    let listed = call(&registry, "testapp.PersonService.list").await;
    assert!(listed.is_ok());

    assert_eq!(metrics.call_count(), 2);
    assert_eq!(metrics.failure_count(), 1);
}

#[tokio::test]
async fn test_metrics_middleware_latency() {
    let metrics = MetricsMiddleware::new();
    let registry = registry_with(RegistryBuilder::new().use_middleware(metrics.clone()));

    let result = call(&registry, "testapp.PersonService.slow").await;
    assert_eq!(result, Ok(json!({"slow": true})));
    assert!(metrics.average_latency() >= Duration::from_millis(10));
}

#[tokio::test]
async fn test_metrics_middleware_scoped_to_one_method() {
    let metrics = MetricsMiddleware::new();
    let registry = registry_with(
        RegistryBuilder::new().use_middleware_for("testapp.PersonService.slow", metrics.clone()),
    );

    assert!(call(&registry, "testapp.PersonService.list").await.is_ok());
    assert!(call(&registry, "testapp.PersonService.get").await.is_err());
    assert_eq!(metrics.call_count(), 0);

    assert!(call(&registry, "testapp.PersonService.slow").await.is_ok());
    assert_eq!(metrics.call_count(), 1);
}

#[tokio::test]
async fn test_tracing_middleware_logs_settlement() {
    let tracing = TestTracing::init();
    let registry = registry_with(RegistryBuilder::new().use_middleware(TracingMiddleware));

    let result = call(&registry, "testapp.PersonService.list").await;
    assert!(result.is_ok());

    let settled = tracing.with_message("downstream settled");
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].level, Level::DEBUG);
    assert_eq!(settled[0].field("responded"), Some("true"));
    assert!(settled[0].field("latency_ms").is_some());
    assert!(tracing.warnings().is_empty());
}

#[tokio::test]
async fn test_tracing_middleware_reraises_failure_without_new_warning() {
    let tracing = TestTracing::init();
    let handled = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&handled);
    let registry = registry_with(
        RegistryBuilder::new()
            .use_middleware(TracingMiddleware)
            .add_error_handler(move |failure: Failure, _ctx: Context, next: ErrorNext| {
                sink.lock().push(failure.origin());
                next.forward(failure)
            }),
    );

    let result = call(&registry, "testapp.PersonService.get").await;
    assert_eq!(result, Err(Failure::with_code(5, "not found")));

    let failed = tracing.with_message("downstream failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].level, Level::INFO);
    assert_eq!(failed[0].field("error"), Some("not found (code 5)"));

    assert_eq!(tracing.warnings_for("not found (code 5)"), 1);
    assert_eq!(*handled.lock(), vec![Some(FailureOrigin::BusinessLogic)]);
}

#[tokio::test]
async fn test_closure_middleware_sees_call_metadata() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let registry = registry_with(RegistryBuilder::new().use_middleware(
        move |ctx: Context, next: Next| {
            *sink.lock() = ctx.call().get_metadata("authorization").map(str::to_string);
            next.run()
        },
    ));

    let result = registry
        .method("testapp.PersonService.list")
        .expect("declared method")
        .call(Call::new(json!({})).with_metadata("authorization", "Bearer token"))
        .await;

    assert!(result.is_ok());
    assert_eq!(seen.lock().as_deref(), Some("Bearer token"));
}
