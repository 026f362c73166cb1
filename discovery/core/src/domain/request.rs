// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Signed Requests
//!
//! Outbound request values consumed by a [`RequestTransport`].
//!
//! # Architecture
//!
//! - **Layer:** Domain
//! - **Purpose:** Immutable request descriptions; the transport owns encoding and sending
//!
//! Every request kind composes an [`OutboundRequest`] (URL, method,
//! parameters, headers) and exposes it through [`SignedRequest`]. Kinds that
//! authenticate with their own username/password add [`BasicCredentials`];
//! requests without credentials are signed with the account credentials of
//! the transport.
//!
//! [`RequestTransport`]: crate::infrastructure::transport::RequestTransport

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::domain::attestation::{EncryptedAddresses, RemoteAttestation};
use crate::domain::error::DiscoveryError;
use crate::domain::feedback::FeedbackKind;

/// Request parameters: string keys mapped to arbitrary JSON values.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Parameters travel in a JSON body for these methods and in the query
    /// string for the others.
    pub fn carries_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported HTTP method: '{0}'")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(UnsupportedMethod(s.to_string())),
        }
    }
}

/// Username/password pair sent as HTTP basic authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Anything a transport can send.
pub trait SignedRequest: fmt::Debug + Send + Sync {
    /// The URL, method, parameters and headers of the call.
    fn request(&self) -> &OutboundRequest;

    /// Credentials carried by the request itself. `None` means the transport
    /// signs with its account credentials.
    fn credentials(&self) -> Option<&BasicCredentials> {
        None
    }
}

/// The fields common to every outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    url: Url,
    method: HttpMethod,
    parameters: Option<Parameters>,
    headers: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn new(url: Url, method: HttpMethod, parameters: Option<Parameters>) -> Self {
        Self {
            url,
            method,
            parameters,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// `PUT /v1/directory/tokens` with the truncated-hash tokens to intersect.
    pub fn contacts_intersection(base: &Url, tokens: &[String]) -> Result<Self, DiscoveryError> {
        let mut parameters = Parameters::new();
        parameters.insert("contacts".to_string(), serde_json::json!(tokens));

        Ok(Self::new(
            endpoint(base, &["v1", "directory", "tokens"])?,
            HttpMethod::Put,
            Some(parameters),
        ))
    }

    /// `PUT /v1/directory/feedback/{kind}` with an empty JSON body.
    pub fn directory_feedback(base: &Url, kind: FeedbackKind) -> Result<Self, DiscoveryError> {
        Ok(Self::new(
            endpoint(base, &["v1", "directory", "feedback", kind.as_path_segment()])?,
            HttpMethod::Put,
            Some(Parameters::new()),
        ))
    }
}

impl SignedRequest for OutboundRequest {
    fn request(&self) -> &OutboundRequest {
        self
    }
}

/// A request to the attestation endpoint authenticated with basic auth.
///
/// Only the fully parameterised constructor exists, so every instance has a
/// URL, a method and both credential fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationRequest {
    request: OutboundRequest,
    credentials: BasicCredentials,
}

impl AttestationRequest {
    pub fn new(
        url: Url,
        method: HttpMethod,
        parameters: Option<Parameters>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            request: OutboundRequest::new(url, method, parameters),
            credentials: BasicCredentials::new(username, password),
        }
    }

    /// `PUT /v1/attestation/{enclave_id}` carrying the client's ephemeral
    /// public key.
    pub fn remote_attestation(
        base: &Url,
        enclave_id: &str,
        client_public: &[u8],
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DiscoveryError> {
        let mut parameters = Parameters::new();
        parameters.insert(
            "clientPublic".to_string(),
            serde_json::Value::String(STANDARD.encode(client_public)),
        );

        Ok(Self::new(
            endpoint(base, &["v1", "attestation", enclave_id])?,
            HttpMethod::Put,
            Some(parameters),
            username,
            password,
        ))
    }

    pub fn url(&self) -> &Url {
        self.request.url()
    }

    pub fn method(&self) -> HttpMethod {
        self.request.method()
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.request.parameters()
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    pub fn password(&self) -> &str {
        self.credentials.password()
    }
}

impl SignedRequest for AttestationRequest {
    fn request(&self) -> &OutboundRequest {
        &self.request
    }

    fn credentials(&self) -> Option<&BasicCredentials> {
        Some(&self.credentials)
    }
}

/// The encrypted lookup sent to an attested enclave.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclaveDiscoveryRequest {
    request: OutboundRequest,
    credentials: BasicCredentials,
}

impl EnclaveDiscoveryRequest {
    /// `PUT /v1/discovery/{enclave_id}` with the AES-GCM encrypted address
    /// list. Authenticates with the attestation's credentials and replays its
    /// cookies.
    pub fn new(
        base: &Url,
        attestation: &RemoteAttestation,
        payload: &EncryptedAddresses,
    ) -> Result<Self, DiscoveryError> {
        let mut parameters = Parameters::new();
        parameters.insert("requestId".into(), STANDARD.encode(&attestation.request_id).into());
        parameters.insert("addressCount".into(), payload.address_count.into());
        parameters.insert("data".into(), STANDARD.encode(&payload.data).into());
        parameters.insert("iv".into(), STANDARD.encode(&payload.iv).into());
        parameters.insert("mac".into(), STANDARD.encode(&payload.mac).into());

        let url = endpoint(base, &["v1", "discovery", attestation.enclave_id.as_str()])?;
        let mut request = OutboundRequest::new(url, HttpMethod::Put, Some(parameters));
        if !attestation.cookies.is_empty() {
            request = request.with_header("Cookie", attestation.cookies.join("; "));
        }

        Ok(Self {
            request,
            credentials: attestation.credentials.clone(),
        })
    }
}

impl SignedRequest for EnclaveDiscoveryRequest {
    fn request(&self) -> &OutboundRequest {
        &self.request
    }

    fn credentials(&self) -> Option<&BasicCredentials> {
        Some(&self.credentials)
    }
}

/// Appends percent-encoded path segments to `base`, keeping its query.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, DiscoveryError> {
    let mut joined = base.clone();
    joined
        .path_segments_mut()
        .map_err(|_| DiscoveryError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(joined)
}
