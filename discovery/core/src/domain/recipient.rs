// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Recipient identifiers and their wire encodings.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

use crate::domain::error::DiscoveryError;

/// Bytes of the SHA-1 digest kept in a discovery token.
pub const TOKEN_HASH_LENGTH: usize = 10;

/// An E.164 phone number such as `+15551230001`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated SHA-1 of the identifier, base64 without padding.
    pub fn discovery_token(&self) -> String {
        let digest = Sha1::digest(self.0.as_bytes());
        STANDARD_NO_PAD.encode(&digest[..TOKEN_HASH_LENGTH])
    }

    /// The digits after the leading `+` as an integer.
    pub fn numeric_identifier(&self) -> Result<u64, DiscoveryError> {
        let digits = self.0.strip_prefix('+').ok_or_else(|| {
            DiscoveryError::InvalidRecipient("unexpected initial character".to_string())
        })?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DiscoveryError::InvalidRecipient(
                "identifier is not numeric".to_string(),
            ));
        }

        let numeric: u64 = digits.parse().map_err(|_| {
            DiscoveryError::InvalidRecipient("identifier out of range".to_string())
        })?;

        if numeric <= 99 {
            return Err(DiscoveryError::InvalidRecipient(
                "identifier unexpectedly short".to_string(),
            ));
        }

        Ok(numeric)
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Encodes identifiers as consecutive 64-bit big-endian integers.
///
/// Identifiers that have no numeric form are skipped; the returned list holds
/// the encoded recipients in payload order.
pub fn encode_numeric_identifiers(ids: &[RecipientId]) -> (Vec<RecipientId>, Vec<u8>) {
    let mut encoded = Vec::with_capacity(ids.len());
    let mut output = Vec::with_capacity(ids.len() * 8);

    for id in ids {
        match id.numeric_identifier() {
            Ok(numeric) => {
                output.extend_from_slice(&numeric.to_be_bytes());
                encoded.push(id.clone());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping recipient without numeric form");
            }
        }
    }

    (encoded, output)
}
