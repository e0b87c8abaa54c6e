//! Cloud adapter and replication against a mock document service.

use cardbox_client::persistence::{
    AdapterEvent, CloudAdapter, CloudClient, LocalDatabase, PersistenceAdapter, Replicator,
    SyncReport,
};
use cardbox_client::{Channel, Error, Scope};
use cardbox_engine::{Document, Stack};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stack_document(id: &str, title: &str, seq: u64) -> Document {
    let mut document = Document::from_entity(&Stack::new(id, title, 1).with_owner("u1")).unwrap();
    document.seq = seq;
    document
}

#[tokio::test]
async fn find_reads_the_owner_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entities/documents"))
        .and(query_param("kind", "stack"))
        .and(query_param("owner", "u1"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![stack_document("s1", "Spanish", 1)]))
        .mount(&server)
        .await;

    let client = CloudClient::new(&server.uri(), "entities", Some("secret".into()));
    let adapter = CloudAdapter::<Stack>::new(client, Some("u1".into()), Duration::from_secs(60));
    let mut events = adapter.events();

    adapter.find(&Scope::owner("u1")).await.unwrap();

    match events.try_recv().unwrap() {
        AdapterEvent::Collection(stacks) => {
            assert_eq!(stacks.len(), 1);
            assert_eq!(stacks[0].title, "Spanish");
        }
        other => panic!("unexpected event {other:?}"),
    }
    adapter.cancel_subscription();
    adapter.cancel_subscription();
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entities/documents/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = CloudClient::new(&server.uri(), "entities", None);
    let adapter = CloudAdapter::<Stack>::new(client, None, Duration::from_secs(60));

    let err = adapter.find_by_id("nope", &Scope::global()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn rejected_write_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/entities/documents"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;

    let client = CloudClient::new(&server.uri(), "entities", None);
    let adapter = CloudAdapter::<Stack>::new(client, Some("u1".into()), Duration::from_secs(60));
    let mut events = adapter.events();

    let err = adapter.create(&Stack::new("s1", "Spanish", 1)).await.unwrap_err();

    match err {
        Error::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database down");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(matches!(events.try_recv().unwrap(), AdapterEvent::Error(_)));
}

#[tokio::test]
async fn replication_pushes_then_pulls() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/entities/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": 1, "lastSeq": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/entities/changes"))
        .and(query_param("since", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [stack_document("remote", "From elsewhere", 2)],
            "lastSeq": 2,
            "hasMore": false,
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cardbox.db");
    let local = LocalDatabase::open(&path.to_string_lossy(), "entities")
        .await
        .unwrap();
    let pending = Document::from_entity(&Stack::new("local", "Made offline", 5)).unwrap();
    local.write(&[pending], true).await.unwrap();

    let replicator = Replicator::new(
        local.clone(),
        CloudClient::new(&server.uri(), "entities", None),
        Duration::from_secs(60),
        Channel::new("sync-errors"),
    );
    let report = replicator.run_once().await.unwrap();

    assert_eq!(report, SyncReport { pushed: 1, pulled: 1 });
    assert!(local.dirty().await.unwrap().is_empty());
    assert_eq!(local.checkpoint().await.unwrap(), 2);
    assert!(local.read("remote").await.unwrap().is_some());
}

#[tokio::test]
async fn replication_stops_on_first_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entities/changes"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cardbox.db");
    let local = LocalDatabase::open(&path.to_string_lossy(), "entities")
        .await
        .unwrap();
    let errors = Channel::new("sync-errors");
    let mut failures = errors.subscribe();

    let handle = Replicator::new(
        local,
        CloudClient::new(&server.uri(), "entities", None),
        Duration::from_millis(10),
        errors,
    )
    .spawn();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(failures.try_recv().unwrap().contains("entities"));
}
