use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use msgrelay::broker::Broker;
use msgrelay::persistence::{MessageStore, SledStore};
use msgrelay::relay::{MessageService, RelayWorker, RetryPolicy};
use msgrelay::transport::{AppState, router};
use msgrelay::validation::MessageValidator;

async fn call(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
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
    call(app, Method::POST, "/messages", Some(&body)).await
}

async fn wait_for_processed(app: &Router, expected: u64) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, stats) = call(app, Method::GET, "/statistics", None).await;
            if stats["processed_messages"] == expected {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("worker did not process messages in time")
}

/// sled releases its file lock shortly after the last handle drops.
async fn reopen(path: &str, validator: MessageValidator) -> SledStore {
    let mut attempts = 0;
    loop {
        match SledStore::open(path, validator) {
            Ok(store) => return store,
            Err(err) if attempts < 50 => {
                attempts += 1;
                eprintln!("reopen attempt {attempts} failed: {err}");
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(err) => panic!("could not reopen {path}: {err}"),
        }
    }
}

#[tokio::test]
async fn submitted_messages_are_relayed_and_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("messages_db");
    let path = path.to_str().unwrap();
    let validator = MessageValidator::default();

    {
        let sled = SledStore::open(path, validator).unwrap();
        let store: Arc<dyn MessageStore> = Arc::new(sled.clone());
        let broker = Arc::new(Broker::new());
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(
            RelayWorker::new(
                store.clone(),
                broker.clone(),
                "messages",
                RetryPolicy::new(3, Duration::from_millis(10)),
                cancel.clone(),
            )
            .run(),
        );

        let app = router(AppState {
            service: MessageService::new(store.clone(), broker.clone(), "messages"),
            validator,
        });

        let (status, body) = post_message(&app, "Hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        let (status, body) = post_message(&app, "World").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 2);

        let stats = wait_for_processed(&app, 2).await;
        assert_eq!(stats["total_messages"], 2);
        assert_eq!(stats["unprocessed_messages"], 0);

        cancel.cancel();
        broker.close();
        let report = worker.await.unwrap();
        assert_eq!(report.applied, 2);
        sled.flush().await.unwrap();

        drop(app);
        drop(store);
        drop(sled);
    }

    let store = reopen(path, validator).await;
    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.processed, 2);

    let created = store.create("after restart").await.unwrap();
    assert_eq!(created.id, 3);
}

#[tokio::test]
async fn manual_processing_and_relay_do_not_conflict() {
    let validator = MessageValidator::default();
    let store: Arc<dyn MessageStore> = Arc::new(SledStore::temporary(validator).unwrap());
    let broker = Arc::new(Broker::new());
    let cancel = CancellationToken::new();

    let app = router(AppState {
        service: MessageService::new(store.clone(), broker.clone(), "messages"),
        validator,
    });

    // Queue first, start the worker after a manual mark.
    let (_, body) = post_message(&app, "Hello").await;
    assert_eq!(body["id"], 1);
    let (status, _) = call(&app, Method::PUT, "/messages/1/process", None).await;
    assert_eq!(status, StatusCode::OK);

    let worker = tokio::spawn(
        RelayWorker::new(
            store.clone(),
            broker.clone(),
            "messages",
            RetryPolicy::new(0, Duration::from_millis(10)),
            cancel.clone(),
        )
        .run(),
    );

    let stats = wait_for_processed(&app, 1).await;
    assert_eq!(stats["total_messages"], 1);

    // Let the worker drain the queued envelope.
    tokio::time::sleep(Duration::from_millis(200)).await;

    cancel.cancel();
    let report = worker.await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.exhausted, 0);
    assert_eq!(report.malformed, 0);
}
