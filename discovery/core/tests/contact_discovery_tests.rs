// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cds_core::application::{ContactDiscoveryOperation, EnclaveDiscoveryBatch};
use cds_core::domain::attestation::{RemoteAttestation, RemoteAttestationKeys, RemoteAttestor};
use cds_core::domain::request::{BasicCredentials, SignedRequest};
use cds_core::domain::{DiscoveryConfig, DiscoveryError, RecipientId};
use cds_core::infrastructure::crypto::{decrypt_aes_gcm, encrypt_aes_gcm};
use cds_core::infrastructure::transport::RequestTransport;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use url::Url;

const CLIENT_KEY: [u8; 32] = [1; 32];
const SERVER_KEY: [u8; 32] = [2; 32];
const REQUEST_ID: &[u8] = b"attestation-request-id";

type Handler = dyn Fn(&dyn SignedRequest, usize) -> Result<Value, DiscoveryError> + Send + Sync;

/// Records every request path and answers through a handler that also sees
/// the call index.
struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    fn new(
        handler: impl Fn(&dyn SignedRequest, usize) -> Result<Value, DiscoveryError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn paths(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RequestTransport for MockTransport {
    async fn send(&self, request: &dyn SignedRequest) -> Result<Value, DiscoveryError> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(request.request().url().path().to_string());
            calls.len() - 1
        };
        (self.handler)(request, index)
    }
}

struct MockAttestor {
    fail: bool,
}

#[async_trait]
impl RemoteAttestor for MockAttestor {
    async fn perform_remote_attestation(&self) -> Result<RemoteAttestation, DiscoveryError> {
        if self.fail {
            return Err(DiscoveryError::Attestation("quote rejected".to_string()));
        }
        Ok(RemoteAttestation {
            request_id: REQUEST_ID.to_vec(),
            enclave_id: "enclave-1".to_string(),
            credentials: BasicCredentials::new("cds-user", "cds-token"),
            keys: RemoteAttestationKeys::new(CLIENT_KEY.to_vec(), SERVER_KEY.to_vec()),
            cookies: vec!["AWSALB=abc".to_string()],
        })
    }
}

/// Counts attestations before delegating to a [`MockAttestor`], optionally
/// cancelling a token while attesting.
struct CountingAttestor {
    inner: MockAttestor,
    calls: AtomicUsize,
    cancel_on_attest: Option<CancellationToken>,
}

impl CountingAttestor {
    fn new() -> Arc<Self> {
        Self::cancelling(None)
    }

    fn cancelling(cancel_on_attest: Option<CancellationToken>) -> Arc<Self> {
        Arc::new(Self {
            inner: MockAttestor { fail: false },
            calls: AtomicUsize::new(0),
            cancel_on_attest,
        })
    }
}

#[async_trait]
impl RemoteAttestor for CountingAttestor {
    async fn perform_remote_attestation(&self) -> Result<RemoteAttestation, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = &self.cancel_on_attest {
            cancel.cancel();
        }
        self.inner.perform_remote_attestation().await
    }
}

fn config(batch_size: usize) -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.batch_size = batch_size;
    config.retry_backoff = Duration::from_millis(1);
    config
}

fn ids(numbers: &[&str]) -> Vec<RecipientId> {
    numbers.iter().map(|n| RecipientId::new(*n)).collect()
}

/// Answers an intersection request with the tokens of `registered`.
fn intersect(request: &dyn SignedRequest, registered: &HashSet<String>) -> Value {
    let requested: HashSet<String> = request.request().parameters().unwrap()["contacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap().to_string())
        .collect();

    let contacts: Vec<Value> = registered
        .iter()
        .map(|id| RecipientId::new(id.clone()).discovery_token())
        .filter(|token| requested.contains(token))
        .map(|token| json!({ "token": token }))
        .collect();

    json!({ "contacts": contacts })
}

/// Decrypts the numbers of an enclave request and flags the registered ones.
fn enclave_flags(request: &dyn SignedRequest, registered: &HashSet<String>) -> Vec<u8> {
    let params = request.request().parameters().unwrap();
    let field = |name: &str| STANDARD.decode(params[name].as_str().unwrap()).unwrap();

    let plaintext = decrypt_aes_gcm(&CLIENT_KEY, &field("data"), &field("iv"), &field("mac"), REQUEST_ID).unwrap();
    plaintext
        .chunks(8)
        .map(|chunk| {
            let number = u64::from_be_bytes(chunk.try_into().unwrap());
            registered.contains(&format!("+{}", number)) as u8
        })
        .collect()
}

/// Plays the enclave: decrypts the numbers and encrypts one flag per number.
fn enclave(request: &dyn SignedRequest, registered: &HashSet<String>) -> Value {
    seal(&enclave_flags(request, registered))
}

fn seal(flags: &[u8]) -> Value {
    let sealed = encrypt_aes_gcm(&SERVER_KEY, flags, &[]).unwrap();
    json!({
        "data": STANDARD.encode(&sealed.ciphertext),
        "iv": STANDARD.encode(&sealed.iv),
        "mac": STANDARD.encode(&sealed.auth_tag),
    })
}

#[tokio::test]
async fn test_batches_are_unioned() {
    let registered: HashSet<String> = ["+15551230001", "+15551230003", "+15551230005"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let transport = MockTransport::new(move |request, _| Ok(intersect(request, &registered)));

    let operation = ContactDiscoveryOperation::new(config(2), transport.clone());
    let result = operation
        .run(ids(&[
            "+15551230001",
            "+15551230002",
            "+15551230003",
            "+15551230004",
            "+15551230005",
            "+15551230001",
        ]))
        .await
        .unwrap();

    assert_eq!(
        result,
        ids(&["+15551230001", "+15551230003", "+15551230005"]).into_iter().collect::<BTreeSet<_>>()
    );
    // 5 unique recipients in batches of 2
    assert_eq!(transport.paths().len(), 3);
    assert!(transport.paths().iter().all(|p| p == "/v1/directory/tokens"));
}

#[tokio::test]
async fn test_empty_input_sends_nothing() {
    let transport = MockTransport::new(|_, _| Ok(json!({ "contacts": [] })));
    let operation = ContactDiscoveryOperation::new(config(2048), transport.clone());

    let result = operation.run(Vec::new()).await.unwrap();

    assert!(result.is_empty());
    assert!(transport.paths().is_empty());
}

#[tokio::test]
async fn test_retryable_errors_are_retried() {
    let registered: HashSet<String> = HashSet::from(["+15551230001".to_string()]);
    let transport = MockTransport::new(move |request, index| {
        if index < 2 {
            Err(DiscoveryError::Server { status: 503, message: String::new() })
        } else {
            Ok(intersect(request, &registered))
        }
    });

    let operation = ContactDiscoveryOperation::new(config(2048), transport.clone());
    let result = operation.run(ids(&["+15551230001", "+15551230002"])).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(transport.paths().len(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let transport = MockTransport::new(|_, _| {
        Err(DiscoveryError::UnprocessableResponse("missing contacts".to_string()))
    });

    let mut config = config(2048);
    config.max_retries = 2;
    let operation = ContactDiscoveryOperation::new(config, transport.clone());

    let error = operation.run(ids(&["+15551230001"])).await.unwrap_err();

    assert!(matches!(error, DiscoveryError::UnprocessableResponse(_)));
    assert_eq!(transport.paths().len(), 3);
}

#[tokio::test]
async fn test_rate_limit_is_not_retried() {
    let transport = MockTransport::new(|_, _| Err(DiscoveryError::RateLimited));
    let operation = ContactDiscoveryOperation::new(config(2048), transport.clone());

    let error = operation.run(ids(&["+15551230001"])).await.unwrap_err();

    assert!(matches!(error, DiscoveryError::RateLimited));
    assert_eq!(transport.paths().len(), 1);
}

#[tokio::test]
async fn test_failing_batch_stops_the_operation() {
    // The first batch fails for good; the second keeps failing with a
    // retryable error behind a long backoff.
    let transport = MockTransport::new(|request, _| {
        let tokens = &request.request().parameters().unwrap()["contacts"];
        if tokens[0] == json!(RecipientId::new("+15551230001").discovery_token()) {
            Err(DiscoveryError::Unauthorized("bad account".to_string()))
        } else {
            Err(DiscoveryError::Network("connection reset".to_string()))
        }
    });

    let mut config = config(1);
    config.retry_backoff = Duration::from_secs(60);
    let operation = ContactDiscoveryOperation::new(config, transport.clone());

    let result = timeout(
        Duration::from_secs(5),
        operation.run(ids(&["+15551230001", "+15551230002"])),
    )
    .await
    .expect("operation should fail fast");

    assert!(matches!(result, Err(DiscoveryError::Unauthorized(_))));
}

fn comparison_transport(
    legacy: HashSet<String>,
    enclave_registered: HashSet<String>,
) -> Arc<MockTransport> {
    MockTransport::new(move |request, _| {
        let path = request.request().url().path().to_string();
        if path == "/v1/directory/tokens" {
            Ok(intersect(request, &legacy))
        } else if path == "/v1/discovery/enclave-1" {
            assert_eq!(request.credentials().unwrap().username(), "cds-user");
            assert_eq!(
                request.request().headers(),
                &[("Cookie".to_string(), "AWSALB=abc".to_string())]
            );
            Ok(enclave(request, &enclave_registered))
        } else {
            Ok(Value::Null)
        }
    })
}

fn compare_config() -> DiscoveryConfig {
    let mut config = config(2048);
    config.compare_with_enclave = true;
    config
}

#[tokio::test]
async fn test_matching_enclave_reports_ok() {
    let registered: HashSet<String> = HashSet::from(["+15551230001".to_string()]);
    let transport = comparison_transport(registered.clone(), registered);

    let operation = ContactDiscoveryOperation::new(compare_config(), transport.clone())
        .with_attestor(Arc::new(MockAttestor { fail: false }));

    let result = operation.run(ids(&["+15551230001", "+15551230002"])).await.unwrap();
    operation.wait_for_comparisons().await;

    assert_eq!(result.len(), 1);
    assert_eq!(
        transport.paths(),
        vec![
            "/v1/directory/tokens".to_string(),
            "/v1/discovery/enclave-1".to_string(),
            "/v1/directory/feedback/ok".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_diverging_enclave_reports_mismatch() {
    let legacy: HashSet<String> = HashSet::from(["+15551230001".to_string()]);
    let enclave_registered: HashSet<String> =
        HashSet::from(["+15551230001".to_string(), "+15551230002".to_string()]);
    let transport = comparison_transport(legacy, enclave_registered);

    let operation = ContactDiscoveryOperation::new(compare_config(), transport.clone())
        .with_attestor(Arc::new(MockAttestor { fail: false }));

    let result = operation.run(ids(&["+15551230001", "+15551230002"])).await.unwrap();
    operation.wait_for_comparisons().await;

    // The legacy answer is authoritative
    assert_eq!(result, ids(&["+15551230001"]).into_iter().collect::<BTreeSet<_>>());
    assert_eq!(
        transport.paths().last().map(String::as_str),
        Some("/v1/directory/feedback/mismatch")
    );
}

#[tokio::test]
async fn test_attestation_failure_reports_attestation_error() {
    let registered: HashSet<String> = HashSet::from(["+15551230001".to_string()]);
    let transport = comparison_transport(registered.clone(), registered);

    let operation = ContactDiscoveryOperation::new(compare_config(), transport.clone())
        .with_attestor(Arc::new(MockAttestor { fail: true }));

    let result = operation.run(ids(&["+15551230001"])).await.unwrap();
    operation.wait_for_comparisons().await;

    assert_eq!(result.len(), 1);
    assert_eq!(
        transport.paths(),
        vec![
            "/v1/directory/tokens".to_string(),
            "/v1/directory/feedback/attestation-error".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_no_comparison_without_attestor() {
    let registered: HashSet<String> = HashSet::from(["+15551230001".to_string()]);
    let transport = comparison_transport(registered.clone(), registered);

    let operation = ContactDiscoveryOperation::new(compare_config(), transport.clone());
    operation.run(ids(&["+15551230001"])).await.unwrap();
    operation.wait_for_comparisons().await;

    assert_eq!(transport.paths(), vec!["/v1/directory/tokens".to_string()]);
}

fn enclave_url() -> Url {
    Url::parse("https://enclave.example.org").unwrap()
}

#[tokio::test]
async fn test_enclave_result_count_mismatch_is_unprocessable() {
    let registered: HashSet<String> = HashSet::from(["+15551230001".to_string()]);
    let transport = MockTransport::new(move |request, _| {
        let mut flags = enclave_flags(request, &registered);
        flags.pop();
        Ok(seal(&flags))
    });
    let attestor = CountingAttestor::new();

    let batch = EnclaveDiscoveryBatch::new(
        ids(&["+15551230001", "+15551230002", "+15551230003"]),
        enclave_url(),
        attestor.clone(),
        transport.clone(),
        CancellationToken::new(),
    );
    let result = batch.run().await;

    assert!(matches!(result, Err(DiscoveryError::UnprocessableResponse(_))));
    assert_eq!(attestor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.paths(), vec!["/v1/discovery/enclave-1".to_string()]);
}

#[tokio::test]
async fn test_cancelled_enclave_batch_does_no_work() {
    let transport = MockTransport::new(|_, _| Ok(json!({})));
    let attestor = CountingAttestor::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let batch = EnclaveDiscoveryBatch::new(
        ids(&["+15551230001", "+15551230002"]),
        enclave_url(),
        attestor.clone(),
        transport.clone(),
        cancel,
    );
    let result = batch.run().await;

    assert!(matches!(result, Err(DiscoveryError::Cancelled)));
    assert_eq!(attestor.calls.load(Ordering::SeqCst), 0);
    assert!(transport.paths().is_empty());
}

#[tokio::test]
async fn test_cancellation_during_attestation_skips_lookup() {
    let transport = MockTransport::new(|_, _| Ok(json!({})));
    let cancel = CancellationToken::new();
    let attestor = CountingAttestor::cancelling(Some(cancel.clone()));

    let batch = EnclaveDiscoveryBatch::new(
        ids(&["+15551230001"]),
        enclave_url(),
        attestor.clone(),
        transport.clone(),
        cancel,
    );
    let result = batch.run().await;

    assert!(matches!(result, Err(DiscoveryError::Cancelled)));
    assert_eq!(attestor.calls.load(Ordering::SeqCst), 1);
    assert!(transport.paths().is_empty());
}
