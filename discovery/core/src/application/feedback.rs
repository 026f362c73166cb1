// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::domain::feedback::FeedbackKind;
use crate::domain::request::OutboundRequest;
use crate::infrastructure::transport::RequestTransport;

/// Reports enclave comparison outcomes to the directory service.
#[derive(Clone)]
pub struct FeedbackReporter {
    service_url: Url,
    transport: Arc<dyn RequestTransport>,
}

impl FeedbackReporter {
    pub fn new(service_url: Url, transport: Arc<dyn RequestTransport>) -> Self {
        Self {
            service_url,
            transport,
        }
    }

    /// Failures are logged and swallowed; feedback never affects a lookup.
    pub async fn report(&self, kind: FeedbackKind) {
        let request = match OutboundRequest::directory_feedback(&self.service_url, kind) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Failed to build feedback request");
                return;
            }
        };

        match self.transport.send(&request).await {
            Ok(_) => debug!(feedback = %kind, "Reported discovery feedback"),
            Err(e) => warn!(feedback = %kind, error = %e, "Failed to report discovery feedback"),
        }
    }
}
