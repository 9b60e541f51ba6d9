use std::hint::black_box;

use brrtrpc::prelude::*;
use brrtrpc::registry::Registry;
use criterion::{criterion_group, criterion_main, Criterion};
use futures::executor::block_on;
use serde_json::{json, Value};

fn registry(stages: usize) -> Registry {
    let people = MethodTable::new()
        .with("list", |_ctx: Context| json!({"message": "Listing"}))
        .with("get", |_ctx: Context| -> Result<Value, Failure> {
            Err(Failure::with_code(5, "not found"))
        });
    let mut builder = RegistryBuilder::new().add_service(
        ServiceDefinition::new("testapp.PersonService", people)
            .unary("list")
            .unary("get"),
    );
    for _ in 0..stages {
        builder = builder.use_middleware(|_ctx: Context, next: Next| next.run());
    }
    builder
        .add_error_handler(|failure: Failure, _ctx: Context, next: ErrorNext| next.forward(failure))
        .build()
        .expect("valid registry")
}

fn bench_unary(c: &mut Criterion) {
    for stages in [0, 4, 16] {
        let registry = registry(stages);
        let list = registry
            .method("testapp.PersonService.list")
            .expect("list is declared");
        c.bench_function(&format!("unary_{stages}_stages"), |b| {
            b.iter(|| block_on(list.call(black_box(Call::new(json!({"a": 1}))))))
        });
    }
}

fn bench_failure_path(c: &mut Criterion) {
    let registry = registry(4);
    let get = registry
        .method("testapp.PersonService.get")
        .expect("get is declared");
    c.bench_function("failure_4_stages", |b| {
        b.iter(|| block_on(get.call(black_box(Call::new(json!({}))))))
    });
}

fn bench_fire_and_forget(c: &mut Criterion) {
    let registry = RegistryBuilder::new()
        .add_service(
            ServiceDefinition::new(
                "testapp.PersonService",
                MethodTable::new().with("list", |_ctx: Context| json!({"message": "Listing"})),
            )
            .unary("list"),
        )
        .use_middleware(|_ctx: Context, next: Next| {
            drop(next.run());
            async { Ok::<(), Failure>(()) }
        })
        .build()
        .expect("valid registry");
    let list = registry
        .method("testapp.PersonService.list")
        .expect("list is declared");
    c.bench_function("fire_and_forget", |b| {
        b.iter(|| block_on(list.call(black_box(Call::new(json!({}))))))
    });
}

criterion_group!(benches, bench_unary, bench_failure_path, bench_fire_and_forget);
criterion_main!(benches);
