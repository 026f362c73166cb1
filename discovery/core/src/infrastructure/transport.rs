// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP transport for signed requests.
//!
//! Anti-corruption layer between [`SignedRequest`] values and reqwest:
//! credentials become a basic `Authorization` header, parameters become a
//! JSON body or a query string depending on the method, and HTTP statuses
//! become [`DiscoveryError`] variants.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::domain::discovery_config::DiscoveryConfig;
use crate::domain::error::DiscoveryError;
use crate::domain::request::{BasicCredentials, HttpMethod, Parameters, SignedRequest};

/// Sends requests and returns the decoded JSON response.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn send(&self, request: &dyn SignedRequest) -> Result<Value, DiscoveryError>;
}

pub struct HttpTransport {
    client: Client,
    account: Option<BasicCredentials>,
}

impl HttpTransport {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DiscoveryError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            account: config.account.clone(),
        })
    }

    /// Credentials used for requests that carry none.
    pub fn with_account(mut self, account: BasicCredentials) -> Self {
        self.account = Some(account);
        self
    }
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn send(&self, signed: &dyn SignedRequest) -> Result<Value, DiscoveryError> {
        let request = signed.request();
        debug!(method = %request.method(), url = %request.url(), "Sending request");

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), request.url().clone());

        if let Some(credentials) = signed.credentials().or(self.account.as_ref()) {
            builder = builder.basic_auth(credentials.username(), Some(credentials.password()));
        }

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(parameters) = request.parameters() {
            builder = if request.method().carries_body() {
                builder.json(parameters)
            } else {
                builder.query(&query_pairs(parameters))
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::Network(e.to_string()))?;

        debug!(status = status.as_u16(), "Received response");

        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        parse_body(&body)
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Strings go into the query verbatim; other values as their JSON text.
fn query_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn classify_status(status: StatusCode, body: String) -> DiscoveryError {
    match status.as_u16() {
        401 | 403 => DiscoveryError::Unauthorized(body),
        413 | 429 => DiscoveryError::RateLimited,
        code @ 400..=499 => DiscoveryError::Client {
            status: code,
            message: body,
        },
        code => DiscoveryError::Server {
            status: code,
            message: body,
        },
    }
}

fn parse_body(body: &str) -> Result<Value, DiscoveryError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| DiscoveryError::UnprocessableResponse(format!("invalid JSON: {}", e)))
}
