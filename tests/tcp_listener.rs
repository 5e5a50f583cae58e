//! The TCP listener relays through the same core and advertises HTTP/3.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header::ALT_SVC, Request, StatusCode};
use common::{closed_port, gateway_for, start_backend, MockResponse};
use h3_gateway::http::tcp::build_router;
use metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use tower::ServiceExt;

#[tokio::test]
async fn relays_and_advertises_h3() {
    let (addr, mut seen) = start_backend(MockResponse {
        headers: vec![("x-multi", "a"), ("x-multi", "b")],
        ..MockResponse::ok("[]")
    })
    .await;
    let router = build_router(Arc::new(gateway_for(addr, 2_000)), 4433);

    let request = Request::get("/items?limit=10")
        .header("x-trace", "req-1")
        .header("x-trace", "req-2")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ALT_SVC], "h3=\":4433\"; ma=86400");
    assert_eq!(response.headers()["x-multi"], "a;b");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"[]");

    let captured = seen.recv().await.unwrap();
    assert_eq!(captured.target, "/items");
    assert_eq!(captured.header_values("x-trace"), vec!["req-1;req-2"]);
}

#[tokio::test]
async fn failure_is_bare_500_with_alt_svc() {
    let router = build_router(Arc::new(gateway_for(closed_port().await, 2_000)), 8443);

    let request = Request::post("/orders").body(Body::from("{}")).unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[ALT_SVC], "h3=\":8443\"; ma=86400");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[derive(Debug, Default)]
struct RequestCounter {
    count: Arc<AtomicU64>,
    labels: Arc<Mutex<Vec<String>>>,
}

#[derive(Debug)]
struct Count(Arc<AtomicU64>);

impl CounterFn for Count {
    fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::SeqCst);
    }

    fn absolute(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl Recorder for RequestCounter {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        if key.name() != "gateway_requests_total" {
            return Counter::noop();
        }
        self.labels.lock().unwrap().extend(
            key.labels()
                .map(|label| format!("{}={}", label.key(), label.value())),
        );
        Counter::from_arc(Arc::new(Count(Arc::clone(&self.count))))
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[test]
fn tcp_requests_are_counted() {
    let recorder = RequestCounter::default();

    metrics::with_local_recorder(&recorder, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let router = build_router(Arc::new(gateway_for(closed_port().await, 2_000)), 4433);
            let request = Request::get("/items").body(Body::empty()).unwrap();
            let response = router.oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        });
    });

    assert_eq!(recorder.count.load(Ordering::SeqCst), 1);
    let labels = recorder.labels.lock().unwrap();
    assert!(labels.contains(&"method=GET".to_string()), "{labels:?}");
    assert!(labels.contains(&"status=500".to_string()), "{labels:?}");
    assert!(labels.contains(&"outcome=connect".to_string()), "{labels:?}");
}
