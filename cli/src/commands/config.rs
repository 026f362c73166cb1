// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use cds_core::domain::{BasicCredentials, DiscoveryConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./cds-config.yaml)
        #[arg(short, long, default_value = "./cds-config.yaml")]
        output: PathBuf,

        /// Include placeholder account credentials
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = DiscoveryConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CDS_CONFIG_PATH: {}",
            std::env::var("CDS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./cds-config.yaml");
        println!("  4. ~/.cds/config.yaml");
        println!("  5. /etc/cds/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Endpoints:".bold());
    println!("  Directory: {}", config.service_url);
    println!("  Enclave: {}", config.enclave_base());
    println!();

    println!("{}", "Lookup:".bold());
    println!("  Batch size: {}", config.batch_size);
    println!("  Max retries: {}", config.max_retries);
    println!("  Retry backoff: {:?}", config.retry_backoff);
    println!("  Request timeout: {:?}", config.request_timeout);
    println!("  Compare with enclave: {}", config.compare_with_enclave);
    println!();

    println!("{}", "Account:".bold());
    match &config.account {
        Some(account) => println!("  Username: {} (password set)", account.username()),
        None => println!("  {}", "(none)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DiscoveryConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let config = sample_config(with_examples);

    config
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_examples: bool) -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    if with_examples {
        config.account = Some(BasicCredentials::new("+15550000000", "change-me"));
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cds-config.yaml");

        generate(path.clone(), true).await.unwrap();

        let config = DiscoveryConfig::from_yaml_file(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.account.unwrap().username(), "+15550000000");
    }

    #[test]
    fn test_minimal_sample_has_no_account() {
        assert!(sample_config(false).account.is_none());
    }
}
