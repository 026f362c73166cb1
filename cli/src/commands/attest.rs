// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Attestation request command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use url::Url;

use cds_core::domain::{AttestationRequest, DiscoveryConfig, HttpMethod, Parameters};
use cds_core::infrastructure::transport::{HttpTransport, RequestTransport};

#[derive(Args)]
pub struct AttestCommand {
    /// Attestation endpoint
    #[arg(long, value_name = "URL")]
    pub url: Url,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "PUT")]
    pub method: HttpMethod,

    /// Request parameters (JSON object or @file.json)
    #[arg(short, long, value_name = "PARAMS")]
    pub params: Option<String>,

    /// Basic auth username
    #[arg(short, long, env = "CDS_AUTH_USERNAME")]
    pub username: String,

    /// Basic auth password
    #[arg(long, env = "CDS_AUTH_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn handle_command(command: AttestCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = DiscoveryConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    let parameters = command
        .params
        .as_deref()
        .map(parse_parameters)
        .transpose()?;

    let request = AttestationRequest::new(
        command.url,
        command.method,
        parameters,
        command.username,
        command.password,
    );

    info!(method = %request.method(), url = %request.url(), "Sending attestation request");

    let transport = HttpTransport::new(&config)?;
    let response = transport
        .send(&request)
        .await
        .context("Attestation request failed")?;

    println!("{}", "✓ Attestation request succeeded".green());
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}

/// Parses a JSON object given inline or as `@path`.
pub fn parse_parameters(input: &str) -> Result<Parameters> {
    let json = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {}", path))?,
        None => input.to_string(),
    };

    serde_json::from_str(&json).context("Parameters must be a JSON object")
}
