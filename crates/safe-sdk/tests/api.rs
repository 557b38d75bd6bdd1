//! `SafeApiClient` against a local mock HTTP server.

use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use safe_sdk::testing::{member, member_address, opaque_address};
use safe_sdk::{
    Error, GhostKeyService, GhostRequest, Payment, RetryPolicy, SafeApiClient, SubmissionRequest,
    SubmissionService, TransactionBuilder, UtxoQuery, UtxoSource, submit_transaction,
};
use serde_json::json;

const TOKEN: &str = "test-token";

fn client(server: &MockServer) -> SafeApiClient {
    SafeApiClient::new(server.base_url(), Some(TOKEN.to_string()), Duration::from_secs(5)).unwrap()
}

fn utxo_json(n: u8, amount: &str) -> serde_json::Value {
    json!({
        "output_id": format!("00000000-0000-4000-8000-0000000000{n:02x}"),
        "transaction_hash": format!("{n:02x}").repeat(32),
        "output_index": n,
        "asset_id": "c6d0c728-2624-429b-8e0d-d9d19b6592fa",
        "kernel_asset_id": "a5".repeat(32),
        "amount": amount,
        "receivers": [member(1).to_string()],
        "receivers_threshold": 1,
        "state": "unspent",
        "created_at": "2024-01-01T00:00:00Z"
    })
}

fn ghost_request() -> GhostRequest {
    GhostRequest {
        receivers: vec![member(1).to_string(), member(2).to_string()],
        index: 0,
        hint: "83652a0d-a377-3d5c-88de-ec947a2582d4".to_string(),
    }
}

// ── UTXO lookup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn list_unspent_sends_query_and_bearer_token() {
    let server = MockServer::start_async().await;
    let query = UtxoQuery::new(
        "c6d0c728-2624-429b-8e0d-d9d19b6592fa",
        vec![member(1).to_string()],
        1,
    )
    .with_limit(500);

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/safe/outputs")
                .query_param("asset", "c6d0c728-2624-429b-8e0d-d9d19b6592fa")
                .query_param("members", query.members_hash())
                .query_param("threshold", "1")
                .query_param("state", "unspent")
                .query_param("limit", "500")
                .header("authorization", format!("Bearer {TOKEN}"));
            then.status(200)
                .json_body(json!({ "data": [utxo_json(1, "1.5"), utxo_json(2, "0.00000001")] }));
        })
        .await;

    let utxos = client(&server).list_unspent(&query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(utxos.len(), 2);
    assert_eq!(utxos[0].amount, "1.5".parse().unwrap());
    assert_eq!(utxos[1].output_index, 2);
    assert_eq!(utxos[0].address().unwrap(), member_address(&[1], 1));
}

#[tokio::test]
async fn unreachable_service_is_a_retryable_lookup_error() {
    let client = SafeApiClient::new("http://127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
    let query = UtxoQuery::new("asset", vec![member(1).to_string()], 1);

    let err = client.list_unspent(&query).await.unwrap_err();

    assert!(matches!(err, Error::UtxoLookup { transient: true, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unauthorized_lookup_is_not_retryable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/safe/outputs");
            then.status(401).json_body(json!({
                "error": { "status": 401, "code": 401, "description": "Unauthorized" }
            }));
        })
        .await;
    let query = UtxoQuery::new("asset", vec![member(1).to_string()], 1);

    let err = client(&server).list_unspent(&query).await.unwrap_err();

    match &err {
        Error::UtxoLookup { reason, transient } => {
            assert!(reason.contains("Unauthorized"));
            assert!(!transient);
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!err.is_retryable());
}

// ── Ghost keys ──────────────────────────────────────────────────────────

#[tokio::test]
async fn ghost_keys_are_posted_with_senders() {
    let server = MockServer::start_async().await;
    let request = ghost_request();
    let senders = vec![member(9).to_string()];

    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/keys").json_body(json!({
                "keys": [{
                    "receivers": request.receivers,
                    "index": 0,
                    "hint": request.hint,
                }],
                "senders": senders,
            }));
            then.status(200).json_body(json!({
                "data": [{
                    "type": "ghost_key",
                    "mask": "0f".repeat(32),
                    "keys": ["01".repeat(32), "02".repeat(32)],
                }]
            }));
        })
        .await;

    let keys = client(&server)
        .fetch_ghost_keys(std::slice::from_ref(&request), &senders)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].keys.len(), 2);
    assert_eq!(keys[0].mask.to_string(), "0f".repeat(32));
}

#[tokio::test]
async fn error_envelope_is_a_permanent_ghost_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/keys");
            then.status(202).json_body(json!({
                "error": { "status": 202, "code": 10002, "description": "invalid receivers" }
            }));
        })
        .await;

    let err = client(&server)
        .fetch_ghost_keys(&[ghost_request()], &[])
        .await
        .unwrap_err();

    match err {
        Error::GhostKeyService { reason, transient } => {
            assert!(reason.contains("invalid receivers"));
            assert!(!transient);
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/keys");
            then.status(503).body("upstream unavailable");
        })
        .await;

    let err = client(&server)
        .fetch_ghost_keys(&[ghost_request()], &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::GhostKeyService { transient: true, .. }));
}

// ── Submission ──────────────────────────────────────────────────────────

#[tokio::test]
async fn transaction_request_is_posted_as_array() {
    let server = MockServer::start_async().await;
    let request = SubmissionRequest {
        request_id: "7d1255ff-d89a-3d88-8571-193820f83205".to_string(),
        raw: "7777000500".to_string(),
    };

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/safe/transaction/requests")
                .json_body(json!([{
                    "request_id": "7d1255ff-d89a-3d88-8571-193820f83205",
                    "raw": "7777000500",
                }]));
            then.status(200).json_body(json!({
                "data": [{
                    "request_id": "7d1255ff-d89a-3d88-8571-193820f83205",
                    "transaction_hash": "ab".repeat(32),
                    "state": "unspent",
                }]
            }));
        })
        .await;

    let pending = client(&server)
        .create_transaction_requests(&[request])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(pending[0].state.as_deref(), Some("unspent"));
}

#[tokio::test]
async fn rejected_transaction_request_is_not_retryable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/transaction/requests");
            then.status(400).body("invalid raw transaction");
        })
        .await;
    let request = SubmissionRequest {
        request_id: "7d1255ff-d89a-3d88-8571-193820f83205".to_string(),
        raw: "00".to_string(),
    };

    let err = client(&server)
        .create_transaction_requests(&[request])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Submission { transient: false, .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unavailable_submission_service_is_retryable() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/transaction/requests");
            then.status(502).body("bad gateway");
        })
        .await;
    let request = SubmissionRequest {
        request_id: "7d1255ff-d89a-3d88-8571-193820f83205".to_string(),
        raw: "00".to_string(),
    };

    let err = client(&server)
        .create_transaction_requests(&[request])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Submission { transient: true, .. }));
    assert!(err.is_retryable());
}

// ── Full flow over HTTP ─────────────────────────────────────────────────

#[tokio::test]
async fn build_and_submit_through_the_api() {
    let server = MockServer::start_async().await;
    let source = member_address(&[1], 1);
    let utxo: safe_sdk::Utxo = serde_json::from_value(utxo_json(1, "5")).unwrap();

    let keys_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/keys");
            then.status(200).json_body(json!({
                "data": [{ "type": "ghost_key", "mask": "0f".repeat(32), "keys": ["01".repeat(32)] }]
            }));
        })
        .await;
    let submit_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/safe/transaction/requests");
            then.status(200).json_body(json!({
                "data": [{
                    "request_id": safe_sdk::request_id(&utxo.output_id, safe_sdk::DEFAULT_OPERATION_TAG).to_string(),
                    "state": "initial",
                }]
            }));
        })
        .await;

    let api = client(&server);
    let built = TransactionBuilder::new(vec![utxo.clone()])
        .with_retry_policy(RetryPolicy::no_retry())
        .make_transaction(&api, &[Payment::new(opaque_address(3), "2".parse().unwrap())])
        .await
        .unwrap();
    assert_eq!(built.source, source);

    let pending = submit_transaction(&api, &built).await.unwrap();

    keys_mock.assert_hits_async(1).await;
    submit_mock.assert_hits_async(1).await;
    assert_eq!(pending.request_id, built.request_id.to_string());
}
