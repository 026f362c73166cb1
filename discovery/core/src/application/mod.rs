// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Contact discovery operations built on the transport.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Legacy and enclave batch lookups, their orchestration and feedback

pub mod contact_discovery;
pub mod enclave_batch;
pub mod feedback;
pub mod legacy_batch;

pub use contact_discovery::ContactDiscoveryOperation;
pub use enclave_batch::EnclaveDiscoveryBatch;
pub use feedback::FeedbackReporter;
pub use legacy_batch::LegacyDiscoveryBatch;
