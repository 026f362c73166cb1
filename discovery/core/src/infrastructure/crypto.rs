// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AES-256-GCM for enclave lookups.
//!
//! Requests encrypt the packed phone numbers under the client key with the
//! attestation request id as associated data. Responses are encrypted under
//! the server key with no associated data.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::domain::attestation::{EncryptedAddresses, RemoteAttestation};
use crate::domain::error::DiscoveryError;
use crate::domain::recipient::{encode_numeric_identifiers, RecipientId};

pub const KEY_LENGTH: usize = 32;
pub const IV_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcmCiphertext {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, DiscoveryError> {
    if key.len() != KEY_LENGTH {
        return Err(DiscoveryError::Crypto(format!(
            "expected a {}-byte key, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| DiscoveryError::Crypto(e.to_string()))
}

/// Encrypts with a fresh random IV.
pub fn encrypt_aes_gcm(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<GcmCiphertext, DiscoveryError> {
    let cipher = cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let mut sealed = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|_| DiscoveryError::Crypto("Encryption failure".to_string()))?;

    // aes-gcm appends the tag to the ciphertext
    let auth_tag = sealed.split_off(sealed.len() - TAG_LENGTH);

    Ok(GcmCiphertext {
        ciphertext: sealed,
        iv: nonce.to_vec(),
        auth_tag,
    })
}

pub fn decrypt_aes_gcm(
    key: &[u8],
    ciphertext: &[u8],
    iv: &[u8],
    auth_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DiscoveryError> {
    if iv.len() != IV_LENGTH {
        return Err(DiscoveryError::Crypto(format!(
            "expected a {}-byte IV, got {}",
            IV_LENGTH,
            iv.len()
        )));
    }
    if auth_tag.len() != TAG_LENGTH {
        return Err(DiscoveryError::Crypto(format!(
            "expected a {}-byte MAC, got {}",
            TAG_LENGTH,
            auth_tag.len()
        )));
    }

    let cipher = cipher(key)?;
    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LENGTH);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(auth_tag);

    cipher
        .decrypt(Nonce::from_slice(iv), Payload { msg: &sealed, aad })
        .map_err(|_| DiscoveryError::Crypto("Decryption failure".to_string()))
}

/// Packs and encrypts recipients for the enclave. Returns the recipients that
/// made it into the payload, in payload order.
pub fn encrypt_addresses(
    recipients: &[RecipientId],
    attestation: &RemoteAttestation,
) -> Result<(Vec<RecipientId>, EncryptedAddresses), DiscoveryError> {
    let (encoded, plaintext) = encode_numeric_identifiers(recipients);

    let sealed = encrypt_aes_gcm(&attestation.keys.client_key, &plaintext, &attestation.request_id)?;

    let payload = EncryptedAddresses {
        address_count: encoded.len(),
        data: sealed.ciphertext,
        iv: sealed.iv,
        mac: sealed.auth_tag,
    };
    Ok((encoded, payload))
}

/// One byte per queried address; non-zero means registered.
pub fn decrypt_discovery_response(
    server_key: &[u8],
    data: &[u8],
    iv: &[u8],
    mac: &[u8],
) -> Result<Vec<u8>, DiscoveryError> {
    decrypt_aes_gcm(server_key, data, iv, mac, &[])
}
