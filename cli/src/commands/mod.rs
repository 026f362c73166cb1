// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the CDS CLI

pub mod attest;
pub mod config;
pub mod lookup;

pub use self::attest::AttestCommand;
pub use self::config::ConfigCommand;
pub use self::lookup::LookupCommand;
