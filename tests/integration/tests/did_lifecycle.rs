//! Integration test: DID issuance and background anchoring over HTTP.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use sigil_integration_tests::{FlakyLedger, TestNode};
use sigil_node::SigilConfig;

// =========================================================================
// Issuance and anchoring
// =========================================================================

#[tokio::test]
async fn test_generated_did_is_anchored_in_background() {
    let node = TestNode::start().await;

    let (status, body) = node
        .post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let data = &body["data"];
    assert_eq!(data["status"], "pending");
    assert_eq!(data["ipfsHash"], "pending");
    assert!(data["did"].as_str().unwrap().starts_with("did:ion:"));
    assert!(data.get("privateKey").is_none());

    let details = node.wait_for_did_status("alice-token", "anchored").await;
    assert_eq!(details["did"]["did_identifier"], data["did"]);
    assert!(details["did"].get("sealed_private_key").is_none());

    let operations = details["operations"].as_array().unwrap();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["status"], "anchored");
    assert!(operations[0]["transaction_id"].as_str().unwrap().starts_with("btc_tx_"));

    let pins = details["ipfsPins"].as_array().unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0]["content"]["id"], data["did"]);

    let verifications = details["verifications"].as_array().unwrap();
    assert_eq!(verifications.len(), 1);
    assert_eq!(verifications[0]["status"], "verified");

    let (_, stats) = node.get(None, "/api/v1/stats/global").await;
    assert_eq!(stats["data"]["total"], 1);
    assert_eq!(stats["data"]["anchored"], 1);
    assert_eq!(stats["data"]["pending"], 0);
}

#[tokio::test]
async fn test_second_did_for_same_user_is_rejected() {
    let node = TestNode::start().await;

    let (status, _) = node
        .post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = node
        .post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "User already has a DID" }));

    // Another user is unaffected.
    let (status, _) = node
        .post(Some("bob-token"), "/functions/generate-did", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(node.store().list_dids().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuance_creates_exactly_one_did() {
    let node = TestNode::start().await;

    let requests = (0..8).map(|_| {
        node.post(Some("alice-token"), "/functions/generate-did", json!({}))
    });
    let results = futures::future::join_all(requests).await;

    let succeeded = results.iter().filter(|(s, _)| *s == StatusCode::OK).count();
    assert_eq!(succeeded, 1);
    for (status, body) in results.iter().filter(|(s, _)| *s != StatusCode::OK) {
        assert_eq!(*status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User already has a DID");
    }
    assert_eq!(node.store().list_dids().unwrap().len(), 1);
}

#[tokio::test]
async fn test_service_block_only_with_endpoint() {
    let node = TestNode::start().await;

    let (_, body) = node
        .post(
            Some("alice-token"),
            "/functions/generate-did",
            json!({ "includeService": true, "serviceEndpoint": "" }),
        )
        .await;
    assert!(body["data"]["didDocument"].get("service").is_none());

    let (_, body) = node
        .post(
            Some("bob-token"),
            "/functions/generate-did",
            json!({ "includeService": true, "serviceEndpoint": "https://bob.example.org" }),
        )
        .await;
    let services = body["data"]["didDocument"]["service"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["serviceEndpoint"], "https://bob.example.org");
}

#[tokio::test]
async fn test_resolve_and_search_anchored_did() {
    let node = TestNode::start().await;
    let (_, body) = node
        .post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    let did = body["data"]["did"].as_str().unwrap().to_string();
    node.wait_for_did_status("alice-token", "anchored").await;

    let (status, doc) = node
        .get(None, &format!("/api/v1/dids/resolve/{}", did))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc["data"]["id"], did);

    let suffix = &did[did.len() - 8..];
    let (_, found) = node
        .get(None, &format!("/api/v1/dids/search?q={}", suffix))
        .await;
    assert_eq!(found["data"].as_array().unwrap().len(), 1);

    let (status, _) = node.get(None, "/api/v1/dids/resolve/did:ion:missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_on_demand_verification_passes_after_anchoring() {
    let node = TestNode::start().await;
    node.post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    node.wait_for_did_status("alice-token", "anchored").await;

    let (status, body) = node
        .post(Some("alice-token"), "/api/v1/dids/me/verify", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["verification_method"], "on-demand");
    assert_eq!(body["data"]["status"], "verified");

    let (_, stats) = node.get(Some("alice-token"), "/api/v1/stats/me").await;
    assert_eq!(stats["data"]["totalDids"], 1);
    assert_eq!(stats["data"]["verifiedDids"], 2);
    assert_eq!(stats["data"]["ipfsPins"], 1);
    assert_eq!(stats["data"]["pendingOperations"], 0);
}

// =========================================================================
// Submission endpoint
// =========================================================================

#[tokio::test]
async fn test_resubmitting_anchored_operation_is_rejected() {
    let node = TestNode::start().await;
    node.post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    let details = node.wait_for_did_status("alice-token", "anchored").await;
    let operation_id = details["operations"][0]["id"].as_str().unwrap().to_string();
    let tx = details["operations"][0]["transaction_id"].clone();

    let (status, body) = node
        .post(
            None,
            "/functions/submit-ion-operation",
            json!({ "operationId": operation_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Operation already anchored");

    let details = node.wait_for_did_status("alice-token", "anchored").await;
    assert_eq!(details["operations"].as_array().unwrap().len(), 1);
    assert_eq!(details["operations"][0]["transaction_id"], tx);
}

#[tokio::test]
async fn test_submit_requires_known_operation() {
    let node = TestNode::start().await;

    let (status, body) = node
        .post(None, "/functions/submit-ion-operation", json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Operation ID is required");

    let (status, body) = node
        .post(
            None,
            "/functions/submit-ion-operation",
            json!({ "operationId": "0190f7d2-6c1e-7a6b-9d3e-2f1a0b9c8d7e" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Operation not found");
}

// =========================================================================
// Failures and retries
// =========================================================================

#[tokio::test]
async fn test_transient_ledger_failures_are_retried_without_duplicates() {
    let ledger = Arc::new(FlakyLedger::new(2));
    let node = TestNode::with_ledger(ledger.clone(), SigilConfig::ephemeral()).await;

    node.post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    let details = node.wait_for_did_status("alice-token", "anchored").await;

    assert_eq!(ledger.calls(), 3);
    assert_eq!(details["operations"].as_array().unwrap().len(), 1);
    assert_eq!(details["ipfsPins"].as_array().unwrap().len(), 1);
    assert_eq!(details["verifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_exhausted_attempts_fail_did_which_can_be_retired() {
    let mut config = SigilConfig::ephemeral();
    config.anchoring.max_attempts = 2;
    let ledger = Arc::new(FlakyLedger::new(u32::MAX));
    let node = TestNode::with_ledger(ledger.clone(), config).await;

    node.post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    let details = node.wait_for_did_status("alice-token", "failed").await;
    assert_eq!(ledger.calls(), 2);
    assert_eq!(details["operations"][0]["status"], "failed");

    // Anchored or pending DIDs cannot be retired; failed ones can.
    let (status, _) = node.delete(Some("alice-token"), "/api/v1/dids/me").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = node.get(Some("alice-token"), "/api/v1/dids/me").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(node.store().list_operations().unwrap().is_empty());

    let (status, _) = node
        .post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_anchored_did_cannot_be_retired() {
    let node = TestNode::start().await;
    node.post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    node.wait_for_did_status("alice-token", "anchored").await;

    let (status, _) = node.delete(Some("alice-token"), "/api/v1/dids/me").await;
    assert_eq!(status, StatusCode::CONFLICT);
}
