//! Integration test: issuer onboarding, credential issuance, presentations
//! and verification across the node and the credentials crate.

use reqwest::StatusCode;
use serde_json::{json, Value};

use sigil_credentials::{PresentationVerifier, VerifiablePresentation};
use sigil_integration_tests::TestNode;

/// Onboard carol as an issuer through the application flow.
async fn onboard_issuer(node: &TestNode) -> Value {
    node.sign_in("carol-token").await;
    let (status, body) = node
        .post(
            Some("carol-token"),
            "/api/v1/applications/me",
            json!({
                "fullName": "State University",
                "email": "registrar@university.example",
                "websiteUrl": "https://university.example",
                "dnsVerification": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let application = body["data"].clone();
    assert_eq!(application["status"], "pending");

    let (status, body) = node
        .post(
            Some("admin-token"),
            &format!("/api/v1/admin/applications/{}/review", application["id"].as_str().unwrap()),
            json!({ "decision": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"].clone()
}

/// Issue a credential from carol to alice and return the stored record.
async fn issue_to_alice(node: &TestNode, claims: Value) -> Value {
    let (status, body) = node
        .post(
            Some("carol-token"),
            "/api/v1/credentials/issue",
            json!({
                "recipientEmail": "alice@example.org",
                "organizationName": "State University",
                "credentialType": "EducationCredential",
                "claims": claims,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"].clone()
}

// =========================================================================
// Issuer onboarding
// =========================================================================

#[tokio::test]
async fn test_approved_application_grants_issuer_role() {
    let node = TestNode::start().await;
    let profile = node.sign_in("carol-token").await;
    assert_eq!(profile["role"], "holder");

    let reviewed = onboard_issuer(&node).await;
    assert_eq!(reviewed["status"], "approved");
    assert_eq!(reviewed["reviewed_by"], "admin");

    let profile = node.sign_in("carol-token").await;
    assert_eq!(profile["role"], "issuer");

    // A decided application cannot be reviewed again.
    let (status, _) = node
        .post(
            Some("admin-token"),
            &format!("/api/v1/admin/applications/{}/review", reviewed["id"].as_str().unwrap()),
            json!({ "decision": "reject" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_holders_cannot_review_or_issue() {
    let node = TestNode::start().await;
    node.sign_in("alice-token").await;

    let (status, _) = node.get(Some("bob-token"), "/api/v1/admin/applications").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = node
        .post(
            Some("bob-token"),
            "/api/v1/credentials/issue",
            json!({ "recipientEmail": "alice@example.org", "claims": { "name": "Alice" } }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Insufficient permissions");
}

// =========================================================================
// Issuance, presentation and verification
// =========================================================================

#[tokio::test]
async fn test_presentation_round_trip_preserves_subject() {
    let node = TestNode::start().await;
    onboard_issuer(&node).await;
    node.sign_in("alice-token").await;
    let (_, did) = node
        .post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    let holder_did = did["data"]["did"].as_str().unwrap().to_string();

    let stored = issue_to_alice(
        &node,
        json!({ "name": "Alice Example", "degree": "BSc Computer Science", "gpa": 3.8 }),
    )
    .await;
    assert_eq!(stored["status"], "active");
    assert_eq!(stored["credential_data"]["issuer"]["name"], "State University");
    issue_to_alice(&node, json!({ "name": "Alice Example", "course": "Cryptography" })).await;

    let (_, listed) = node.get(Some("alice-token"), "/api/v1/credentials").await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 2);

    let (status, body) = node
        .post(Some("alice-token"), "/api/v1/presentations", json!({ "indices": [0] }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let vp: VerifiablePresentation = serde_json::from_value(body["data"].clone()).unwrap();
    assert_eq!(vp.holder, holder_did);
    assert_eq!(vp.verifiable_credential.len(), 1);
    assert_eq!(vp.proof.verification_method, format!("{}#key-1", holder_did));

    // Verify over HTTP with the presentation as a string.
    let (status, body) = node
        .post(
            None,
            "/api/v1/presentations/verify",
            json!({ "presentation": vp.to_json_pretty().unwrap() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let report = &body["data"];
    assert_eq!(report["holder"], holder_did);
    assert_eq!(report["validPresentation"], true);
    assert_eq!(report["signatureChecked"], false);
    let credential = &report["credentials"][0];
    assert_eq!(credential["issuer"], "State University");
    assert_eq!(credential["credentialSubject"]["name"], "Alice Example");
    assert_eq!(credential["credentialSubject"]["degree"], "BSc Computer Science");
    assert_eq!(credential["credentialSubject"]["gpa"], 3.8);
    assert_eq!(credential["credentialSubject"]["id"], stored["credential_data"]["credentialSubject"]["id"]);
}

#[tokio::test]
async fn test_presentation_requires_selection_and_did() {
    let node = TestNode::start().await;
    onboard_issuer(&node).await;
    node.sign_in("alice-token").await;
    issue_to_alice(&node, json!({ "name": "Alice Example" })).await;

    let (status, _) = node
        .post(Some("alice-token"), "/api/v1/presentations", json!({ "indices": [0] }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    node.post(Some("alice-token"), "/functions/generate-did", json!({}))
        .await;
    let (status, _) = node
        .post(Some("alice-token"), "/api/v1/presentations", json!({ "indices": [] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = node
        .post(Some("alice-token"), "/api/v1/presentations", json!({ "indices": [5] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_revoked_credentials_leave_the_wallet() {
    let node = TestNode::start().await;
    onboard_issuer(&node).await;
    node.sign_in("alice-token").await;
    let stored = issue_to_alice(&node, json!({ "name": "Alice Example" })).await;
    let path = format!("/api/v1/credentials/{}/revoke", stored["id"].as_str().unwrap());

    let (status, _) = node.post(Some("bob-token"), &path, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = node.post(Some("carol-token"), &path, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "revoked");

    let (_, listed) = node.get(Some("alice-token"), "/api/v1/credentials").await;
    assert!(listed["data"].as_array().unwrap().is_empty());
    let (_, issued) = node.get(Some("carol-token"), "/api/v1/credentials/issued").await;
    assert_eq!(issued["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_recipient_is_not_found() {
    let node = TestNode::start().await;
    onboard_issuer(&node).await;

    let (status, body) = node
        .post(
            Some("carol-token"),
            "/api/v1/credentials/issue",
            json!({ "recipientEmail": "nobody@example.org", "claims": { "name": "Nobody" } }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Recipient not found");
}

// =========================================================================
// Verifier
// =========================================================================

#[test]
fn test_verifier_reads_string_and_object_issuers() {
    let vp = json!({
        "holder": "did:ion:holder",
        "verifiableCredential": [
            {
                "id": "vc:1",
                "issuer": "did:ion:issuer:plain",
                "type": ["VerifiableCredential", "EducationCredential"],
                "issuanceDate": "2024-01-01T00:00:00Z",
                "credentialSubject": { "name": "A" }
            },
            {
                "issuer": { "id": "did:ion:issuer:org", "name": "Org Name" },
                "type": "EmploymentCredential",
                "credentialSubject": { "name": "B" }
            },
            { "issuer": { "id": "did:ion:issuer:anon" } }
        ]
    });

    let report = PresentationVerifier::verify(&vp.to_string()).unwrap();
    assert_eq!(report.holder, "did:ion:holder");
    assert!(!report.opaque);
    assert_eq!(report.credentials.len(), 3);
    assert_eq!(report.credentials[0].issuer, "did:ion:issuer:plain");
    assert_eq!(report.credentials[1].issuer, "Org Name");
    assert_eq!(report.credentials[1].id, "credential-1");
    assert_eq!(report.credentials[1].credential_type, vec!["EmploymentCredential"]);
    assert_eq!(report.credentials[2].issuer, "Unknown Issuer");
    assert_eq!(report.credentials[2].credential_type, vec!["VerifiableCredential"]);
}

#[tokio::test]
async fn test_verify_endpoint_handles_opaque_and_empty_input() {
    let node = TestNode::start().await;

    let (status, body) = node
        .post(None, "/api/v1/presentations/verify", json!({ "presentation": "did:ion:someone" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["holder"], "did:ion:someone");
    assert_eq!(body["data"]["opaque"], true);
    assert!(body["data"]["credentials"].as_array().unwrap().is_empty());

    let (status, body) = node
        .post(None, "/api/v1/presentations/verify", json!({ "presentation": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Please provide a VP to verify");
}
