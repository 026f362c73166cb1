// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Enclave lookup
//!
//! Attests the discovery enclave, sends the encrypted phone numbers and maps
//! the decrypted per-address flags back to recipients.
//!
//! ```text
//! RemoteAttestor ──► RemoteAttestation { request_id, keys, credentials, cookies }
//!        │
//!        ▼
//! AES-GCM(client_key, packed numbers, AAD = request_id)
//!        │
//!        ▼  PUT /v1/discovery/{enclave_id}
//! { data, iv, mac } ──► AES-GCM⁻¹(server_key) ──► one flag byte per address
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::domain::attestation::RemoteAttestor;
use crate::domain::error::DiscoveryError;
use crate::domain::recipient::RecipientId;
use crate::domain::request::EnclaveDiscoveryRequest;
use crate::infrastructure::crypto::{decrypt_discovery_response, encrypt_addresses};
use crate::infrastructure::transport::RequestTransport;

pub struct EnclaveDiscoveryBatch {
    recipients: Vec<RecipientId>,
    enclave_url: Url,
    attestor: Arc<dyn RemoteAttestor>,
    transport: Arc<dyn RequestTransport>,
    cancel: CancellationToken,
}

impl EnclaveDiscoveryBatch {
    /// Recipients are sorted and deduplicated so the payload order is stable.
    pub fn new(
        recipients: impl IntoIterator<Item = RecipientId>,
        enclave_url: Url,
        attestor: Arc<dyn RemoteAttestor>,
        transport: Arc<dyn RequestTransport>,
        cancel: CancellationToken,
    ) -> Self {
        let recipients: BTreeSet<RecipientId> = recipients.into_iter().collect();
        Self {
            recipients: recipients.into_iter().collect(),
            enclave_url,
            attestor,
            transport,
            cancel,
        }
    }

    pub async fn run(&self) -> Result<BTreeSet<RecipientId>, DiscoveryError> {
        if self.cancel.is_cancelled() {
            info!("No work to do, since we were cancelled");
            return Err(DiscoveryError::Cancelled);
        }

        let attestation = self.attestor.perform_remote_attestation().await?;

        if self.cancel.is_cancelled() {
            info!("No work to do, since we were cancelled");
            return Err(DiscoveryError::Cancelled);
        }

        let (encoded, payload) = encrypt_addresses(&self.recipients, &attestation)?;
        if encoded.is_empty() {
            debug!("No recipients with a numeric form, skipping enclave request");
            return Ok(BTreeSet::new());
        }

        debug!(addresses = payload.address_count, "Sending enclave discovery request");
        let request = EnclaveDiscoveryRequest::new(&self.enclave_url, &attestation, &payload)?;
        let response = self.transport.send(&request).await?;

        let flags = parse_enclave_response(&response, &attestation.keys.server_key)?;
        if flags.len() != encoded.len() {
            return Err(DiscoveryError::UnprocessableResponse(format!(
                "expected {} results, got {}",
                encoded.len(),
                flags.len()
            )));
        }

        Ok(encoded
            .into_iter()
            .zip(flags)
            .filter(|(_, flag)| *flag != 0)
            .map(|(recipient, _)| recipient)
            .collect())
    }
}

/// Decrypts `{"data", "iv", "mac"}` (all base64) with the server key.
fn parse_enclave_response(response: &Value, server_key: &[u8]) -> Result<Vec<u8>, DiscoveryError> {
    let field = |name: &str| -> Result<Vec<u8>, DiscoveryError> {
        let encoded = response.get(name).and_then(Value::as_str).ok_or_else(|| {
            DiscoveryError::UnprocessableResponse(format!("missing {}", name))
        })?;
        STANDARD
            .decode(encoded)
            .map_err(|e| DiscoveryError::UnprocessableResponse(format!("invalid {}: {}", name, e)))
    };

    let data = field("data")?;
    let iv = field("iv")?;
    let mac = field("mac")?;

    decrypt_discovery_response(server_key, &data, &iv, &mac)
}
