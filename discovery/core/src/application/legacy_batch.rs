// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Legacy directory lookup: intersect truncated-hash tokens with the server.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::domain::error::DiscoveryError;
use crate::domain::recipient::RecipientId;
use crate::domain::request::OutboundRequest;
use crate::infrastructure::transport::RequestTransport;

pub struct LegacyDiscoveryBatch {
    recipients: Vec<RecipientId>,
    service_url: Url,
    transport: Arc<dyn RequestTransport>,
}

impl LegacyDiscoveryBatch {
    pub fn new(
        recipients: Vec<RecipientId>,
        service_url: Url,
        transport: Arc<dyn RequestTransport>,
    ) -> Self {
        Self {
            recipients,
            service_url,
            transport,
        }
    }

    /// Returns the subset of this batch's recipients the server knows.
    pub async fn run(&self) -> Result<BTreeSet<RecipientId>, DiscoveryError> {
        debug!(recipients = self.recipients.len(), "Running legacy discovery batch");

        let recipients_by_token = token_map(&self.recipients)?;
        let tokens: Vec<String> = recipients_by_token.keys().cloned().collect();

        let request = OutboundRequest::contacts_intersection(&self.service_url, &tokens)?;
        let response = self.transport.send(&request).await?;

        parse_intersection_response(&response, &recipients_by_token)
    }
}

fn token_map(recipients: &[RecipientId]) -> Result<HashMap<String, RecipientId>, DiscoveryError> {
    let mut recipients_by_token = HashMap::with_capacity(recipients.len());
    for recipient in recipients {
        let token = recipient.discovery_token();
        if let Some(existing) = recipients_by_token.insert(token, recipient.clone()) {
            if &existing != recipient {
                return Err(DiscoveryError::Assertion(
                    "discovery token collision within batch".to_string(),
                ));
            }
        }
    }
    Ok(recipients_by_token)
}

/// Parses `{"contacts": [{"token": "..."}]}`.
pub(crate) fn parse_intersection_response(
    response: &Value,
    recipients_by_token: &HashMap<String, RecipientId>,
) -> Result<BTreeSet<RecipientId>, DiscoveryError> {
    let contacts = response
        .as_object()
        .ok_or_else(|| DiscoveryError::UnprocessableResponse("response is not an object".to_string()))?
        .get("contacts")
        .and_then(Value::as_array)
        .ok_or_else(|| DiscoveryError::UnprocessableResponse("missing contacts".to_string()))?;

    let mut registered = BTreeSet::new();
    for contact in contacts {
        let token = match contact.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!("Contact token was unexpectedly empty");
                continue;
            }
        };

        match recipients_by_token.get(token) {
            Some(recipient) => {
                registered.insert(recipient.clone());
            }
            None => warn!("Server returned a token that was not requested"),
        }
    }

    Ok(registered)
}
