// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Contact lookup command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use cds_core::application::ContactDiscoveryOperation;
use cds_core::domain::{DiscoveryConfig, RecipientId};
use cds_core::infrastructure::transport::HttpTransport;

#[derive(Args, Debug)]
pub struct LookupCommand {
    /// Phone numbers in E.164 form
    #[arg(value_name = "E164", required = true)]
    pub recipients: Vec<String>,

    /// Print the registered recipients as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_command(command: LookupCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = DiscoveryConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    if config.account.is_none() {
        warn!("No account credentials configured; the directory will likely reject the lookup");
    }
    if config.compare_with_enclave {
        warn!("compare_with_enclave is set but the CLI has no remote attestor; skipping comparisons");
    }

    let transport = Arc::new(HttpTransport::new(&config)?);
    let operation = ContactDiscoveryOperation::new(config, transport);

    let total = command.recipients.len();
    let registered = operation
        .run(command.recipients.into_iter().map(RecipientId::new))
        .await
        .context("Contact discovery failed")?;

    if command.json {
        println!("{}", serde_json::to_string_pretty(&registered)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("✓ {} of {} recipients registered", registered.len(), total).green()
    );
    for recipient in &registered {
        println!("  {}", recipient);
    }

    Ok(())
}
