// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::error::DiscoveryError;
use crate::domain::recipient::RecipientId;

/// Outcome of comparing the enclave lookup against the legacy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackKind {
    Ok,
    Mismatch,
    ServerError,
    ClientError,
    AttestationError,
    UnexpectedError,
}

impl FeedbackKind {
    pub fn as_path_segment(&self) -> &'static str {
        match self {
            FeedbackKind::Ok => "ok",
            FeedbackKind::Mismatch => "mismatch",
            FeedbackKind::ServerError => "server-error",
            FeedbackKind::ClientError => "client-error",
            FeedbackKind::AttestationError => "attestation-error",
            FeedbackKind::UnexpectedError => "unexpected-error",
        }
    }

    pub fn from_comparison(
        legacy: &BTreeSet<RecipientId>,
        enclave: &BTreeSet<RecipientId>,
    ) -> Self {
        if legacy == enclave {
            FeedbackKind::Ok
        } else {
            FeedbackKind::Mismatch
        }
    }

    /// Feedback for a failed enclave lookup. Cancellation is not reported.
    pub fn from_error(error: &DiscoveryError) -> Option<Self> {
        let kind = match error {
            DiscoveryError::Cancelled => return None,
            DiscoveryError::Network(_)
            | DiscoveryError::Server { .. }
            | DiscoveryError::UnprocessableResponse(_) => FeedbackKind::ServerError,
            DiscoveryError::Unauthorized(_)
            | DiscoveryError::RateLimited
            | DiscoveryError::Client { .. }
            | DiscoveryError::Crypto(_)
            | DiscoveryError::InvalidRecipient(_)
            | DiscoveryError::InvalidUrl(_) => FeedbackKind::ClientError,
            DiscoveryError::Attestation(_) => FeedbackKind::AttestationError,
            DiscoveryError::Assertion(_) => FeedbackKind::UnexpectedError,
        };
        Some(kind)
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path_segment())
    }
}
