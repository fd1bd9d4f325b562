// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use xfetch::middleware::{fold, from_fn, AuthHeaderInjector, Intercept, Interception, Transformer};
use xfetch::{Fetch, FetchOptions, Namespace, Request, Response};

struct Echo;

#[async_trait]
impl Fetch for Echo {
    async fn fetch(&self, _request: Request) -> xfetch::Result<Response> {
        Response::json_body(&json!({"items": [1, 2, 3]}))
    }
}

fn absorb_benchmark(c: &mut Criterion) {
    let request = Request::get("https://example.com/api").unwrap();

    c.bench_function("absorb_intercepts", |b| {
        b.iter(|| {
            let mut interception = Interception::new(request.clone());
            for _ in 0..8 {
                interception.absorb(
                    Intercept::new()
                        .parse_as("json")
                        .transform(Ok)
                        .listen(|_| Ok(())),
                );
            }
            black_box(interception.transformer_count())
        })
    });
}

fn fold_benchmark(c: &mut Criterion) {
    let transformers: Vec<Transformer> = (0..8)
        .map(|_| {
            let transform: Transformer = Arc::new(|value: Value| {
                Ok(json!({ "n": value["n"].as_i64().unwrap_or(0) + 1 }))
            });
            transform
        })
        .collect();

    c.bench_function("fold_transformers", |b| {
        b.iter(|| black_box(fold(&transformers, json!({"n": 0})).unwrap()))
    });
}

fn intercepted_fetch_benchmark(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let ns = Arc::new(Namespace::new().with_fetch(Arc::new(Echo)));
    xfetch::start_intercepting_fetch(FetchOptions::new().namespace(ns.clone())).unwrap();
    xfetch::fetch::on_request(&ns, Arc::new(AuthHeaderInjector::new().bearer_token("t"))).unwrap();
    xfetch::fetch::on_request(
        &ns,
        from_fn(|_| Ok(Some(Intercept::new().parse_as("json").transform(Ok)))),
    )
    .unwrap();

    c.bench_function("intercepted_fetch", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let request = Request::get("https://example.com/api").unwrap();
                black_box(ns.fetch(request).await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    absorb_benchmark,
    fold_benchmark,
    intercepted_fetch_benchmark
);
criterion_main!(benches);
