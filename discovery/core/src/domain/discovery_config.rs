// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Discovery Configuration
//
// YAML configuration for the contact discovery client:
// - Directory service and enclave endpoints
// - Batch size, retry budget and timeouts
// - Optional account credentials for requests without their own auth
// - Enclave comparison toggle

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::domain::request::BasicCredentials;

/// Largest number of recipients the directory accepts in one request.
pub const MAX_BATCH_SIZE: usize = 2048;

const DEFAULT_SERVICE_URL: &str = "https://textsecure-service.whispersystems.org";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Directory service used for legacy lookups and feedback
    #[serde(default = "default_service_url")]
    pub service_url: Url,

    /// Attestation and enclave lookup service (defaults to `service_url`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclave_service_url: Option<Url>,

    /// Recipients per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Extra attempts for retryable failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`
    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Shadow every legacy batch with an enclave lookup and report feedback
    #[serde(default)]
    pub compare_with_enclave: bool,

    /// Account credentials for requests that carry none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<BasicCredentials>,
}

fn default_service_url() -> Url {
    Url::parse(DEFAULT_SERVICE_URL).expect("default service URL is valid")
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            enclave_service_url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
            request_timeout: default_request_timeout(),
            compare_with_enclave: false,
            account: None,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CDS_CONFIG_PATH environment variable
    /// 2. ./cds-config.yaml (working directory)
    /// 3. ~/.cds/config.yaml (user home)
    /// 4. /etc/cds/config.yaml (system, Unix) or C:\ProgramData\Cds\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CDS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./cds-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cds").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/cds/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Cds\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must load
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CDS_SERVICE_URL") {
            match Url::parse(&val) {
                Ok(url) => {
                    tracing::info!("Environment override: CDS_SERVICE_URL={}", url);
                    self.service_url = url;
                }
                Err(e) => {
                    tracing::warn!("Invalid value for CDS_SERVICE_URL: '{}' ({}). Ignoring.", val, e);
                }
            }
        }

        let username = lookup("CDS_ACCOUNT_USERNAME");
        let password = lookup("CDS_ACCOUNT_PASSWORD");
        match (username, password) {
            (Some(username), Some(password)) => {
                tracing::info!("Environment override: account credentials from CDS_ACCOUNT_USERNAME/CDS_ACCOUNT_PASSWORD");
                self.account = Some(BasicCredentials::new(username, password));
            }
            (None, None) => {}
            _ => {
                tracing::warn!(
                    "CDS_ACCOUNT_USERNAME and CDS_ACCOUNT_PASSWORD must be set together. Ignoring."
                );
            }
        }

        if let Some(val) = lookup("CDS_COMPARE_WITH_ENCLAVE") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: CDS_COMPARE_WITH_ENCLAVE=true");
                    self.compare_with_enclave = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: CDS_COMPARE_WITH_ENCLAVE=false");
                    self.compare_with_enclave = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for CDS_COMPARE_WITH_ENCLAVE: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!(
                "Invalid batch_size: {}. Must be between 1 and {}",
                self.batch_size,
                MAX_BATCH_SIZE
            );
        }

        for url in std::iter::once(&self.service_url).chain(self.enclave_service_url.iter()) {
            if url.scheme() != "https" && url.scheme() != "http" {
                anyhow::bail!("Invalid URL scheme in '{}'. Must be http or https", url);
            }
        }

        if let Some(account) = &self.account {
            if account.username().is_empty() || account.password().is_empty() {
                anyhow::bail!("Account username and password must not be empty");
            }
        }

        Ok(())
    }

    /// Base URL for attestation and enclave lookups.
    pub fn enclave_base(&self) -> &Url {
        self.enclave_service_url.as_ref().unwrap_or(&self.service_url)
    }
}
