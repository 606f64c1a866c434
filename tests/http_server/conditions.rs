use homewatch::persistence::traits::{DeviceRepository, StateStore};

use crate::helpers::*;

const PATH: &str = "/devices/D1/conditions/high-temperature";

#[tokio::test]
async fn put_condition_writes_flag_and_forwards_change() {
    let repo = create_test_repo().await;
    let mut server = TestServer::new(repo.clone()).await;

    let resp = server.put_flag(PATH, true).await;

    assert_eq!(resp.status(), 202);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["device_id"], "D1");
    assert_eq!(body["condition_id"], "high-temperature");
    assert_eq!(body["previous"], serde_json::Value::Null);
    assert_eq!(body["active"], true);

    let change = server.events_rx.recv().await.expect("No change forwarded");
    assert_eq!(change.device_id, "D1");
    assert_eq!(change.condition_id, "high-temperature");
    assert!(change.is_activation());
    assert_eq!(repo.get_flag("D1", "high-temperature").await.unwrap(), Some(true));

    let resp = server.put_flag(PATH, false).await;
    assert_eq!(resp.status(), 202);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["previous"], true);
    assert!(server.events_rx.recv().await.unwrap().is_deactivation());

    server.cleanup().await;
}

#[tokio::test]
async fn put_condition_is_accepted_when_engine_has_stopped() {
    let repo = create_test_repo().await;
    let mut server = TestServer::new(repo.clone()).await;
    server.events_rx.close();

    let resp = server.put_flag(PATH, true).await;

    assert_eq!(resp.status(), 202);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["active"], true);
    assert_eq!(repo.get_flag("D1", "high-temperature").await.unwrap(), Some(true));

    server.cleanup().await;
}

#[tokio::test]
async fn put_condition_rejects_malformed_body() {
    let repo = create_test_repo().await;
    let mut server = TestServer::new(repo.clone()).await;

    let resp = server
        .put(PATH)
        .bearer_auth(TEST_API_KEY)
        .json(&serde_json::json!({ "enabled": true }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 422);
    assert!(server.events_rx.try_recv().is_err());
    assert_eq!(repo.get_flag("D1", "high-temperature").await.unwrap(), None);

    server.cleanup().await;
}

#[tokio::test]
async fn condition_routes_require_bearer_token() {
    let repo = create_test_repo().await;
    let mut server = TestServer::new(repo.clone()).await;

    let resp = server.put(PATH).json(&serde_json::json!({ "active": true })).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Unauthorized");

    let resp = server
        .put(PATH)
        .bearer_auth("wrong-key")
        .json(&serde_json::json!({ "active": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp =
        server.client.get(format!("http://{}{}", server.address, PATH)).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    assert!(server.events_rx.try_recv().is_err());
    assert_eq!(repo.get_flag("D1", "high-temperature").await.unwrap(), None);

    server.cleanup().await;
}

#[tokio::test]
async fn condition_routes_are_open_without_api_key() {
    let repo = create_test_repo().await;
    let mut server = TestServer::with_api_key(repo, None).await;

    let resp = server.put(PATH).json(&serde_json::json!({ "active": true })).send().await.unwrap();

    assert_eq!(resp.status(), 202);
    assert!(server.events_rx.recv().await.is_some());

    server.cleanup().await;
}

#[tokio::test]
async fn get_condition_returns_404_for_unknown_pair() {
    let repo = create_test_repo().await;
    let server = TestServer::new(repo).await;

    let resp = server.get("/devices/D9/conditions/water-leak").await;

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Condition not found");

    server.cleanup().await;
}

#[tokio::test]
async fn get_condition_returns_stored_state() {
    let repo = create_test_repo().await;
    repo.write_flag("D1", "water-leak", true).await.unwrap();
    let notified_at = chrono::Utc::now();
    repo.set_last_notified("D1", "water-leak", notified_at).await.unwrap();
    let server = TestServer::new(repo).await;

    let resp = server.get("/devices/D1/conditions/water-leak").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["device_id"], "D1");
    assert_eq!(body["condition_id"], "water-leak");
    assert_eq!(body["active"], true);
    let recorded: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["last_notified_at"].clone()).unwrap();
    assert_eq!(recorded, notified_at);

    server.cleanup().await;
}
