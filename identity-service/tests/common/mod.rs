#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use identity_service::config::IdentityConfig;
use identity_service::services::{InMemoryContactStore, MongoDb, RecordsRepository};
use identity_service::startup::{build_router, AppState, Application};
use service_core::config::{Config as CoreConfig, Environment};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower::ServiceExt;

/// Nothing listens on port 1, so record queries fail fast.
pub const UNREACHABLE_MONGODB_URI: &str =
    "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200";

/// Router over a fresh in-memory contact store.
pub async fn test_router() -> (Router, Arc<InMemoryContactStore>) {
    let store = Arc::new(InMemoryContactStore::new());
    let mongo = MongoDb::connect(UNREACHABLE_MONGODB_URI, "identity_test")
        .await
        .expect("Failed to create MongoDB client");
    let state = AppState::new(store.clone(), RecordsRepository::new(mongo));
    (build_router(state), store)
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to execute request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, body)
}

pub async fn post_identify(router: &Router, payload: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/identify")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("Failed to build request");
    send(router, request).await
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request");
    send(router, request).await
}

/// A full server on a random port, backed by the in-memory store.
pub struct TestApp {
    pub address: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CONTACT_STORE", "memory"),
            ("MONGODB_URI", UNREACHABLE_MONGODB_URI),
        ]);
        let common = CoreConfig {
            port: 0,
            environment: Environment::Dev,
        };
        let config = IdentityConfig::from_lookup(common, |key| vars.get(key).map(|v| v.to_string()))
            .expect("Failed to load configuration");

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            app.run_until_stopped(async move {
                rx.await.ok();
            })
            .await
            .ok();
        });

        TestApp {
            address,
            shutdown: Some(tx),
        }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.stop();
    }
}
