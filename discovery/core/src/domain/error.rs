// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Failures reported by the transport and the discovery operations.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Contacts intersection rate limit")]
    RateLimited,

    #[error("Client error: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    #[error("Server error: HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Unable to process server response: {0}")]
    UnprocessableResponse(String),

    #[error("Remote attestation failed: {0}")]
    Attestation(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Assertion failed: {0}")]
    Assertion(String),
}

impl DiscoveryError {
    /// Whether the operation that produced this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Network(_)
                | DiscoveryError::Server { .. }
                | DiscoveryError::UnprocessableResponse(_)
        )
    }
}
