// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value types shared by the application and infrastructure layers.
//!
//! # Architecture
//!
//! - **Layer:** Domain
//! - **Purpose:** Requests, recipients, attestation material, feedback and configuration

pub mod attestation;
pub mod discovery_config;
pub mod error;
pub mod feedback;
pub mod recipient;
pub mod request;

pub use attestation::{EncryptedAddresses, RemoteAttestation, RemoteAttestationKeys, RemoteAttestor};
pub use discovery_config::DiscoveryConfig;
pub use error::DiscoveryError;
pub use feedback::FeedbackKind;
pub use recipient::RecipientId;
pub use request::{
    AttestationRequest, BasicCredentials, EnclaveDiscoveryRequest, HttpMethod, OutboundRequest,
    Parameters, SignedRequest,
};
