// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! CDS Core
//!
//! Request values, transport and batch operations for contact discovery.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Builds signed directory requests (including the
//!   basic-auth attestation request) and runs legacy and enclave lookups

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
