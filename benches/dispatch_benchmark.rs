use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use instant_ride_sdk::{
    fallback, mock_server::MockServer, ClientConfig, InstantRideClient, RequestSpec,
};
use serde_json::json;
use std::sync::Arc;

// Fallback generation for each branch of the dispatch table
pub fn fallback_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fallback");

    for target in ["/status", "/ping", "/analytics/sample?period=week"] {
        group.bench_with_input(BenchmarkId::from_parameter(target), target, |b, target| {
            b.iter(|| black_box(fallback(black_box(target))));
        });
    }

    group.finish();
}

// Full dispatch path against the in-process mock, live and offline
pub fn dispatch_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let server = Arc::new(MockServer::new());
    server.add_json_response("/status", 200, json!({"status": "operational"}));
    let config = ClientConfig::new("bench_key").with_base_url("http://mock.itwhip.test/api/v3");

    let live = InstantRideClient::builder()
        .config(config.clone())
        .transport(server)
        .build()
        .unwrap();
    let offline = InstantRideClient::builder()
        .config(config)
        .offline()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("dispatch");
    group.bench_function("live", |b| {
        b.iter(|| runtime.block_on(live.dispatch(RequestSpec::get("/status"))))
    });
    group.bench_function("offline", |b| {
        b.iter(|| runtime.block_on(offline.dispatch(RequestSpec::get("/status"))))
    });
    group.finish();
}

criterion_group!(benches, fallback_benchmark, dispatch_benchmark);
criterion_main!(benches);
