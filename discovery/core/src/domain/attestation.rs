// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote Attestation
//!
//! Material obtained from a completed remote attestation with the discovery
//! enclave, and the collaborator trait that produces it.
//!
//! # Architecture
//!
//! - **Layer:** Domain
//! - **Purpose:** Carry the request id, enclave credentials and session keys
//!   from the attestation handshake into the encrypted lookup
//!
//! Quote verification and the key agreement itself live behind
//! [`RemoteAttestor`]; this crate only consumes their result.

use async_trait::async_trait;
use std::fmt;

use crate::domain::error::DiscoveryError;
use crate::domain::request::BasicCredentials;

/// Session keys negotiated with the enclave.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteAttestationKeys {
    pub client_key: Vec<u8>,
    pub server_key: Vec<u8>,
}

impl RemoteAttestationKeys {
    pub fn new(client_key: Vec<u8>, server_key: Vec<u8>) -> Self {
        Self {
            client_key,
            server_key,
        }
    }
}

impl fmt::Debug for RemoteAttestationKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAttestationKeys")
            .field("client_key", &format_args!("<{} bytes>", self.client_key.len()))
            .field("server_key", &format_args!("<{} bytes>", self.server_key.len()))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RemoteAttestation {
    /// Decrypted request id; used as AAD for the address ciphertext.
    pub request_id: Vec<u8>,
    pub enclave_id: String,
    /// Username and auth token issued for the enclave.
    pub credentials: BasicCredentials,
    pub keys: RemoteAttestationKeys,
    /// `name=value` cookies the enclave expects to see again.
    pub cookies: Vec<String>,
}

/// Phone numbers encrypted for the enclave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedAddresses {
    pub address_count: usize,
    pub data: Vec<u8>,
    pub iv: Vec<u8>,
    pub mac: Vec<u8>,
}

#[async_trait]
pub trait RemoteAttestor: Send + Sync {
    async fn perform_remote_attestation(&self) -> Result<RemoteAttestation, DiscoveryError>;
}
