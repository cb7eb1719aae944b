use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use super::{AppState, router};
use crate::broker::{Broker, Producer};
use crate::persistence::{MemoryStore, MessageStore, Record, Statistics};
use crate::relay::MessageService;
use crate::utils::{Error, Result};
use crate::validation::MessageValidator;

struct DownProducer;

#[async_trait]
impl Producer for DownProducer {
    async fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<()> {
        Err(Error::unavailable("publish", "connection refused"))
    }
}

/// Store that is always unreachable.
struct DownStore;

#[async_trait]
impl MessageStore for DownStore {
    async fn create(&self, _content: &str) -> Result<Record> {
        Err(Error::unavailable("create", "connection refused"))
    }

    async fn get_by_id(&self, _id: i64) -> Result<Record> {
        Err(Error::unavailable("get_by_id", "connection refused"))
    }

    async fn set_processed(&self, _id: i64, _processed: bool) -> Result<()> {
        Err(Error::unavailable("set_processed", "connection refused"))
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        Err(Error::unavailable("list_all", "connection refused"))
    }

    async fn statistics(&self) -> Result<Statistics> {
        Err(Error::unknown("statistics", "query planner exploded"))
    }
}

/// Store whose every create collides with an existing id.
#[derive(Default)]
struct CollidingStore {
    inner: MemoryStore,
}

#[async_trait]
impl MessageStore for CollidingStore {
    async fn create(&self, _content: &str) -> Result<Record> {
        Err(Error::duplicate_entry("create", "message 1 already exists"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Record> {
        self.inner.get_by_id(id).await
    }

    async fn set_processed(&self, id: i64, processed: bool) -> Result<()> {
        self.inner.set_processed(id, processed).await
    }

    async fn list_all(&self) -> Result<Vec<Record>> {
        self.inner.list_all().await
    }

    async fn statistics(&self) -> Result<Statistics> {
        self.inner.statistics().await
    }
}

fn app_with(store: Arc<dyn MessageStore>, producer: Arc<dyn Producer>) -> Router {
    router(AppState {
        service: MessageService::new(store, producer, "messages"),
        validator: MessageValidator::new(20),
    })
}

fn app() -> Router {
    app_with(
        Arc::new(MemoryStore::new(MessageValidator::new(20))),
        Arc::new(Broker::new()),
    )
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn post_message(app: &Router, content: &str) -> (StatusCode, Value) {
    let body = serde_json::json!({ "content": content }).to_string();
    send(app, Method::POST, "/messages", Some(&body)).await
}

#[tokio::test]
async fn test_create_message_returns_id() {
    let app = app();
    let (status, body) = post_message(&app, "Hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn test_create_message_rejects_bad_bodies() {
    let app = app();
    let cases = [
        (r#"{"content": ""}"#, "Message content cannot be empty"),
        (
            r#"{"content": "this is far too long for the limit"}"#,
            "Message content too long (max 20 characters)",
        ),
        (
            r#"{"content": "<script>"}"#,
            "Message content contains invalid characters",
        ),
        ("not json", "Invalid JSON"),
        (r#"{"text": "wrong field"}"#, "Invalid JSON"),
    ];

    for (body, expected) in cases {
        let (status, response) = send(&app, Method::POST, "/messages", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response["error"], expected, "{body}");
    }

    let (_, stats) = send(&app, Method::GET, "/statistics", None).await;
    assert_eq!(stats["total_messages"], 0);
}

#[tokio::test]
async fn test_statistics_and_process_flow() {
    let app = app();
    post_message(&app, "Hello").await;

    let (status, stats) = send(&app, Method::GET, "/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_messages"], 1);
    assert_eq!(stats["processed_messages"], 0);
    assert_eq!(stats["unprocessed_messages"], 1);

    let (status, _) = send(&app, Method::PUT, "/messages/1/process", None).await;
    assert_eq!(status, StatusCode::OK);
    // idempotent
    let (status, _) = send(&app, Method::PUT, "/messages/1/process", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, stats) = send(&app, Method::GET, "/statistics", None).await;
    assert_eq!(stats["processed_messages"], 1);
    assert_eq!(stats["unprocessed_messages"], 0);
}

#[tokio::test]
async fn test_process_rejects_bad_ids() {
    let app = app();
    for uri in ["/messages/abc/process", "/messages/0/process", "/messages/-2/process"] {
        let (status, body) = send(&app, Method::PUT, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "Invalid message ID", "{uri}");
    }

    let (status, body) = send(&app, Method::PUT, "/messages/42/process", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Message not found");
}

#[tokio::test]
async fn test_get_and_list_messages() {
    let app = app();
    post_message(&app, "A").await;
    post_message(&app, "B").await;

    let (status, record) = send(&app, Method::GET, "/messages/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["content"], "A");
    assert_eq!(record["processed"], false);

    let (status, listed) = send(&app, Method::GET, "/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["B", "A"]);

    let (status, _) = send(&app, Method::GET, "/messages/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_broker_down_is_service_unavailable() {
    let store = Arc::new(MemoryStore::new(MessageValidator::new(20)));
    let app = app_with(store.clone(), Arc::new(DownProducer));

    let (status, body) = post_message(&app, "Hello").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["error"],
        "Message 1 was stored but not queued for processing"
    );
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_store_failures_map_to_status_codes() {
    let app = app_with(Arc::new(DownStore), Arc::new(Broker::new()));

    let (status, body) = post_message(&app, "Hello").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service temporarily unavailable");

    let (status, body) = send(&app, Method::GET, "/statistics", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_duplicate_entry_is_a_client_error() {
    let broker = Arc::new(Broker::new());
    let app = app_with(Arc::new(CollidingStore::default()), broker.clone());

    let (status, body) = post_message(&app, "Hello").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Duplicate entry");
    assert!(!broker.has_topic("messages"), "nothing is queued");
}
