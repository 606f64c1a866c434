use crate::helpers::*;

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let repo = create_test_repo().await;
    let server = TestServer::new(repo).await;

    let resp = server.client.get(format!("http://{}/health", server.address)).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");

    server.cleanup().await;
}
