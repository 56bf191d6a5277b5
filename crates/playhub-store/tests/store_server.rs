//! Integration tests for the persistence engine over real TCP.
//!
//! Each test opens a store on a temp file, serves it on a random port, and
//! talks to it through `StoreClient` or a bare framed connection.

use std::collections::HashSet;
use std::sync::Arc;

use playhub_protocol::{JsonCodec, Response, recv_message, send_message};
use playhub_store::{Store, StoreClient, StoreError, StoreServer};
use playhub_transport::{Connection, TcpConnection};
use serde_json::{Value, json};

async fn start_store(dir: &tempfile::TempDir) -> String {
    let store = Store::open(dir.path().join("data.json"));
    let server = StoreServer::bind("127.0.0.1:0", store).await.expect("bind");
    let addr = server.local_addr().expect("addr").to_string();
    tokio::spawn(server.run());
    addr
}

#[tokio::test]
async fn test_ping_and_crud_through_client() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_store(&dir).await;
    let client = StoreClient::connect(&addr).await.expect("connect");

    let created: Value = client
        .create("artifacts", &json!({"name": "A", "version": "1.0.0"}))
        .await
        .unwrap();
    assert_eq!(created["id"], "1");

    let read: Value = client.read("artifacts", "1").await.unwrap();
    assert_eq!(read["name"], "A");

    let updated: Value = client
        .update("artifacts", "1", &json!({"version": "1.1.0"}))
        .await
        .unwrap();
    assert_eq!(updated["version"], "1.1.0");
    assert_eq!(updated["name"], "A");

    let hits: Vec<Value> = client
        .query("artifacts", &json!({"version": "1.1.0"}))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    assert!(client.delete("artifacts", "1").await.unwrap());
    let all: Vec<Value> = client.list("artifacts").await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_store(&dir).await;
    let client = StoreClient::new(&addr);

    let err = client.read::<Value>("reviews", "42").await.unwrap_err();
    assert!(
        matches!(&err, StoreError::NotFound { collection, id } if collection == "reviews" && id == "42"),
        "got {err:?}"
    );
    // The connection survives an error reply.
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_increasing_ids() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_store(&dir).await;

    let mut tasks = Vec::new();
    for worker in 0..4 {
        let client = Arc::new(StoreClient::new(&addr));
        tasks.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for n in 0..10 {
                let rec: Value = client
                    .create("ownerships", &json!({"worker": worker, "n": n}))
                    .await
                    .unwrap();
                ids.push(rec["id"].as_str().unwrap().parse::<u64>().unwrap());
            }
            ids
        }));
    }

    let mut all = HashSet::new();
    for task in tasks {
        let ids = task.await.unwrap();
        // Each connection sees its own ids strictly increasing.
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "{ids:?}");
        for id in ids {
            assert!(all.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(all.len(), 40);
    assert_eq!(all.iter().copied().max(), Some(40));
}

#[tokio::test]
async fn test_errors_keep_connection_open() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_store(&dir).await;
    let conn = TcpConnection::connect(&addr).await.unwrap();
    let codec = JsonCodec;

    send_message(&conn, &codec, &json!({"action": "explode", "collection": "x"}))
        .await
        .unwrap();
    let resp: Response = recv_message(&conn, &codec).await.unwrap().unwrap();
    assert!(!resp.is_ok());
    assert_eq!(resp.error.as_deref(), Some("unknown action explode"));

    send_message(&conn, &codec, &json!({"action": "list"})).await.unwrap();
    let resp: Response = recv_message(&conn, &codec).await.unwrap().unwrap();
    assert_eq!(resp.error.as_deref(), Some("collection required"));

    send_message(&conn, &codec, &json!({"action": "ping"})).await.unwrap();
    let resp: Response = recv_message(&conn, &codec).await.unwrap().unwrap();
    assert_eq!(resp.result, Some(json!("pong")));
}

#[tokio::test]
async fn test_malformed_frame_drops_connection() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_store(&dir).await;
    let conn = TcpConnection::connect(&addr).await.unwrap();

    conn.send(b"{not json").await.unwrap();
    let next = conn.recv().await;
    assert!(matches!(next, Ok(None) | Err(_)));
}

#[tokio::test]
async fn test_snapshot_on_disk_after_each_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_store(&dir).await;
    let client = StoreClient::new(&addr);

    let _: Value = client
        .create("publishers", &json!({"username": "pub1", "password": "x"}))
        .await
        .unwrap();

    let raw: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("data.json")).unwrap()).unwrap();
    assert_eq!(raw["_counters"]["publishers"], 1);
    assert_eq!(raw["publishers"]["1"]["username"], "pub1");
    assert!(!dir.path().join("data.json.tmp").exists());
}
