use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use status_ingestor::rest::create_router;
use status_ingestor::{MemoryStore, StatusService};
use std::sync::Arc;
use std::time::Duration;

struct TestServer {
    base: String,
    store: Arc<MemoryStore>,
    client: Client,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.add_device("garage", "abc").await;
        store.add_device("attic", "xyz").await;

        let service = StatusService::new(store.clone(), Duration::from_secs(2));
        let app = create_router(service);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}/status", addr),
            store,
            client: Client::new(),
        }
    }

    async fn post(&self, key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self.client.post(&self.base).json(&body);
        if let Some(key) = key {
            req = req.header("X-Device-Key", key);
        }
        let resp = req.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn call(&self, method: Method, id: Option<&str>, key: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.request(method, &self.base);
        if let Some(id) = id {
            req = req.header("X-Device-ID", id);
        }
        if let Some(key) = key {
            req = req.header("X-Device-Key", key);
        }
        let resp = req.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }
}

#[tokio::test]
async fn test_post_then_get_scenario() {
    let server = TestServer::start().await;
    let before = Utc::now();

    let (code, body) = server
        .post(Some("abc"), json!({"deviceID": 1, "uptime": 100, "temperature": 20}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));
    assert_eq!(server.store.status_count().await, 1);

    let (code, body) = server.call(Method::GET, Some("1"), Some("abc")).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["device_id"], 1);
    assert_eq!(data[0]["uptime"], 100);
    assert_eq!(data[0]["temperature_c"], 20);

    let created_at: DateTime<Utc> = data[0]["created_at"].as_str().unwrap().parse().unwrap();
    assert!(created_at >= before);
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
    let server = TestServer::start().await;

    let (code, body) = server
        .post(Some("wrong"), json!({"deviceID": 1, "uptime": 100, "temperature": 20}))
        .await;

    assert_eq!(code, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"status": "invalid authorization or device"}));
    assert_eq!(server.store.status_count().await, 0);
}

#[tokio::test]
async fn test_delete_is_method_not_allowed() {
    let server = TestServer::start().await;

    let (code, body) = server.call(Method::DELETE, Some("1"), Some("abc")).await;

    assert_eq!(code, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"status": "method not allowed"}));
}

#[tokio::test]
async fn test_probe_without_credentials() {
    let server = TestServer::start().await;

    let (code, body) = server.call(Method::GET, None, None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, json!({"status": "No action"}));

    let (code, body) = server
        .post(None, json!({"deviceID": 1, "uptime": 100, "temperature": 20}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, json!({"status": "No action"}));

    assert_eq!(server.store.operations(), 0);
}

#[tokio::test]
async fn test_get_is_idempotent() {
    let server = TestServer::start().await;
    server
        .post(Some("abc"), json!({"deviceID": 1, "uptime": 1, "temperature": 20}))
        .await;
    server
        .post(Some("xyz"), json!({"deviceID": 2, "uptime": 2, "temperature": 21}))
        .await;

    let (_, first) = server.call(Method::GET, Some("1"), Some("abc")).await;
    let (_, second) = server.call(Method::GET, Some("1"), Some("abc")).await;

    assert_eq!(first, second);
    assert_eq!(first["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_payload_is_rejected() {
    let server = TestServer::start().await;

    let (code, body) = server
        .post(Some("abc"), json!({"deviceID": 1, "uptime": "long", "temperature": 20}))
        .await;

    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "invalid payload"}));
    assert_eq!(server.store.status_count().await, 0);
}

#[tokio::test]
async fn test_storage_outage_is_5xx() {
    let server = TestServer::start().await;
    server.store.set_unavailable(true);

    let (code, body) = server.call(Method::GET, Some("1"), Some("abc")).await;

    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"status": "storage unavailable"}));
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let url = server.base.replace("/status", "/health");

    let resp = server.client.get(&url).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}
