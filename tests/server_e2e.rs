//! End-to-end test of the instrumented server over a real socket.

use http_prometheus::config::AppConfig;
use http_prometheus::{HttpServer, MetricsRegistry, Shutdown};

mod common;

#[tokio::test]
async fn serves_routes_and_metrics() {
    let mut config = AppConfig::default();
    config.metrics.subsystem = "demo".into();

    let registry = MetricsRegistry::with_quantiles(&config.metrics.quantiles).unwrap();
    let server = HttpServer::new(config, registry).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    let res = client.get(format!("http://{addr}/")).send().await.expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "ok");

    let res = client
        .post(format!("http://{addr}/echo"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "payload");

    let res = client.get(format!("http://{addr}/metrics")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let text = res.text().await.unwrap();

    assert_eq!(
        common::sample_value(&text, "demo_requests_total", &[("code", "200"), ("method", "get"), ("handler", "Index")]),
        Some(1.0)
    );
    assert_eq!(
        common::sample_value(&text, "demo_requests_total", &[("code", "200"), ("method", "post"), ("handler", "Echo")]),
        Some(1.0)
    );
    assert_eq!(common::unlabeled(&text, "demo_request_duration_seconds_count"), 2.0);
    assert!(text.contains("demo_request_size_bytes{quantile=\"0.5\"}"));

    drop(client);
    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
