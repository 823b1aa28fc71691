//! HTTP surface tests: control plane through `oneshot`, data plane against
//! real replica servers on loopback.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use corelib::{Dispatcher, PoolConfig, RequestIdPolicy, ServerPool};
use provisioning::FixedProvisioner;
use serde_json::{json, Value};
use tower::ServiceExt;
use transport::{build_router, replica_router, AppState, HttpForwarder};

// ============================================================================
// Helpers
// ============================================================================

async fn spawn_replica(id: &str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let app = replica_router(id);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    address
}

fn balancer(provisioner: FixedProvisioner) -> (Router, Arc<ServerPool>) {
    let pool = Arc::new(ServerPool::new(PoolConfig::default(), Arc::new(provisioner)).unwrap());
    let dispatcher = Dispatcher::new(
        pool.clone(),
        Arc::new(HttpForwarder::new(Duration::from_secs(2))),
        RequestIdPolicy::Path,
    );
    (build_router(AppState::new(dispatcher)), pool)
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn scale(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Control plane
// ============================================================================

#[tokio::test]
async fn test_rep_on_empty_pool() {
    let (router, _) = balancer(FixedProvisioner::new(5000));
    let (status, body) = call(&router, get("/rep")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": {"N": 0, "replicas": []}, "status": "successful"})
    );
}

#[tokio::test]
async fn test_add_then_remove() {
    let (router, pool) = balancer(FixedProvisioner::new(5000));

    let (status, body) = call(
        &router,
        scale("POST", "/add", json!({"n": 3, "hostnames": ["h1", "h2"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": {"N": 3, "replicas": ["h1", "h2", "server-3"]}, "status": "successful"})
    );

    let (status, body) = call(
        &router,
        scale("DELETE", "/rm", json!({"n": 1, "hostnames": ["h2"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": {"N": 2, "replicas": ["h1", "server-3"]}, "status": "successful"})
    );
    assert!(pool.is_consistent());
}

#[tokio::test]
async fn test_add_with_too_many_hostnames() {
    let (router, pool) = balancer(FixedProvisioner::new(5000));

    let (status, body) = call(
        &router,
        scale("POST", "/add", json!({"n": 1, "hostnames": ["a", "b"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "message": {"<Error>": "Length of hostname list is more than newly added instances"},
            "status": "failure"
        })
    );
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_remove_with_too_many_hostnames() {
    let (router, _) = balancer(FixedProvisioner::new(5000));

    let (status, body) = call(
        &router,
        scale("DELETE", "/rm", json!({"n": 0, "hostnames": ["a"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"]["<Error>"],
        "Length of hostname list is more than removable instances"
    );
}

#[tokio::test]
async fn test_malformed_payload_is_validation_failure() {
    let (router, _) = balancer(FixedProvisioner::new(5000));

    let (status, body) = call(&router, scale("POST", "/add", json!({"hostnames": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failure");
    assert!(body["message"]["<Error>"].is_string());
}

#[tokio::test]
async fn test_remove_more_than_live() {
    let (router, pool) = balancer(FixedProvisioner::new(5000));
    call(&router, scale("POST", "/add", json!({"n": 2}))).await;

    let (status, body) = call(&router, scale("DELETE", "/rm", json!({"n": 5}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "failure");
    assert!(pool.is_empty());
}

// ============================================================================
// Data plane
// ============================================================================

#[tokio::test]
async fn test_route_to_replica() {
    let address = spawn_replica("1").await;
    let (router, _) = balancer(FixedProvisioner::new(5000).strict().with_address("h1", address));
    call(&router, scale("POST", "/add", json!({"n": 1, "hostnames": ["h1"]}))).await;

    let (status, body) = call(&router, get("/home")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Hello from Server: 1"}));

    let response = router.clone().oneshot(get("/heartbeat")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_route_spreads_over_replicas() {
    let first = spawn_replica("1").await;
    let second = spawn_replica("2").await;
    let provisioner = FixedProvisioner::new(5000)
        .strict()
        .with_address("h1", first)
        .with_address("h2", second);
    let (router, _) = balancer(provisioner);
    call(&router, scale("POST", "/add", json!({"n": 2, "hostnames": ["h1", "h2"]}))).await;

    // Unknown paths reach a backend and come back as not served, whichever
    // backend owns them.
    for i in 0..20 {
        let (status, body) = call(&router, get(&format!("/missing/{i}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            format!("'/missing/{i}' endpoint does not exist in server replicas")
        );
    }
}

#[tokio::test]
async fn test_route_with_empty_pool() {
    let (router, _) = balancer(FixedProvisioner::new(5000));
    let (status, body) = call(&router, get("/home")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "failure");
}

#[tokio::test]
async fn test_route_to_dead_backend() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let (router, _) = balancer(FixedProvisioner::new(5000).with_address("h1", address));
    call(&router, scale("POST", "/add", json!({"n": 1, "hostnames": ["h1"]}))).await;

    let (status, body) = call(&router, get("/home")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "failure");
}

#[tokio::test]
async fn test_non_get_is_not_routed() {
    let (router, _) = balancer(FixedProvisioner::new(5000));
    let request = Request::builder()
        .method("PUT")
        .uri("/home")
        .body(Body::empty())
        .unwrap();

    let (status, _) = call(&router, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_closed_pool_refuses_routing() {
    let (router, pool) = balancer(FixedProvisioner::new(5000));
    call(&router, scale("POST", "/add", json!({"n": 1}))).await;
    pool.close();

    let (status, _) = call(&router, get("/home")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_serve_until_drains_pool() {
    let (_, pool) = balancer(FixedProvisioner::new(5000));
    pool.add(2, Vec::new()).await.unwrap();
    let dispatcher = Dispatcher::new(
        pool.clone(),
        Arc::new(HttpForwarder::default()),
        RequestIdPolicy::Path,
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(transport::serve_until(listener, dispatcher, async move {
        let _ = rx.await;
    }));

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    assert!(pool.is_closed());
    assert!(pool.is_empty());
}
