// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Contact Discovery Operation
//!
//! Finds which of a set of recipients are registered with the directory.
//!
//! ## Flow
//!
//! ```text
//! recipients ──dedupe──► chunks of batch_size (≤ 2048)
//!        │
//!        ▼  concurrently, retrying retryable errors
//! LegacyDiscoveryBatch × N ──► union of registered recipients
//!        │
//!        └─(compare_with_enclave)─► serial queue: EnclaveDiscoveryBatch
//!                                    └─► FeedbackReporter (ok / mismatch / *-error)
//! ```
//!
//! The first batch to fail for good cancels its siblings and fails the
//! operation. Enclave comparisons run detached from the lookup and never
//! change its result.

use futures::future::try_join_all;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::enclave_batch::EnclaveDiscoveryBatch;
use crate::application::feedback::FeedbackReporter;
use crate::application::legacy_batch::LegacyDiscoveryBatch;
use crate::domain::attestation::RemoteAttestor;
use crate::domain::discovery_config::DiscoveryConfig;
use crate::domain::error::DiscoveryError;
use crate::domain::feedback::FeedbackKind;
use crate::domain::recipient::RecipientId;
use crate::infrastructure::transport::RequestTransport;

pub struct ContactDiscoveryOperation {
    config: DiscoveryConfig,
    transport: Arc<dyn RequestTransport>,
    attestor: Option<Arc<dyn RemoteAttestor>>,
    feedback: FeedbackReporter,
    /// One enclave comparison in flight at a time
    comparison_queue: Arc<Semaphore>,
    comparisons: Mutex<Vec<JoinHandle<()>>>,
}

impl ContactDiscoveryOperation {
    pub fn new(config: DiscoveryConfig, transport: Arc<dyn RequestTransport>) -> Self {
        let feedback = FeedbackReporter::new(config.service_url.clone(), transport.clone());
        Self {
            config,
            transport,
            attestor: None,
            feedback,
            comparison_queue: Arc::new(Semaphore::new(1)),
            comparisons: Mutex::new(Vec::new()),
        }
    }

    /// Enables enclave comparisons when `compare_with_enclave` is set.
    pub fn with_attestor(mut self, attestor: Arc<dyn RemoteAttestor>) -> Self {
        self.attestor = Some(attestor);
        self
    }

    pub async fn run(
        &self,
        recipients: impl IntoIterator<Item = RecipientId>,
    ) -> Result<BTreeSet<RecipientId>, DiscoveryError> {
        let recipients: Vec<RecipientId> = recipients
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if recipients.is_empty() {
            return Ok(BTreeSet::new());
        }

        let batch_size = self.config.batch_size.max(1);
        info!(
            recipients = recipients.len(),
            batches = recipients.len().div_ceil(batch_size),
            "Starting contact discovery"
        );

        let cancel = CancellationToken::new();
        let batches = recipients
            .chunks(batch_size)
            .map(|chunk| self.run_batch(chunk.to_vec(), cancel.clone()));

        let results = try_join_all(batches).await?;

        let registered: BTreeSet<RecipientId> = results.into_iter().flatten().collect();
        info!(registered = registered.len(), "Contact discovery complete");
        Ok(registered)
    }

    /// Waits for every enclave comparison scheduled so far.
    pub async fn wait_for_comparisons(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.comparisons.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Enclave comparison task failed");
            }
        }
    }

    async fn run_batch(
        &self,
        recipients: Vec<RecipientId>,
        cancel: CancellationToken,
    ) -> Result<BTreeSet<RecipientId>, DiscoveryError> {
        let batch = LegacyDiscoveryBatch::new(
            recipients.clone(),
            self.config.service_url.clone(),
            self.transport.clone(),
        );

        let mut attempt: u32 = 0;
        let result = loop {
            if cancel.is_cancelled() {
                info!("No work to do, since we were cancelled");
                break Err(DiscoveryError::Cancelled);
            }

            match batch.run().await {
                Ok(registered) => break Ok(registered),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Discovery batch failed, retrying");
                    let delay = self.config.retry_backoff * attempt;
                    tokio::select! {
                        _ = cancel.cancelled() => break Err(DiscoveryError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => break Err(e),
            }
        };

        match result {
            Ok(registered) => {
                self.schedule_comparison(recipients, registered.clone());
                Ok(registered)
            }
            Err(e) => {
                debug!(error = %e, "Cancelling sibling batches");
                cancel.cancel();
                Err(e)
            }
        }
    }

    fn schedule_comparison(&self, recipients: Vec<RecipientId>, legacy: BTreeSet<RecipientId>) {
        if !self.config.compare_with_enclave {
            return;
        }
        let Some(attestor) = self.attestor.clone() else {
            return;
        };

        let batch = EnclaveDiscoveryBatch::new(
            recipients,
            self.config.enclave_base().clone(),
            attestor,
            self.transport.clone(),
            CancellationToken::new(),
        );
        let feedback = self.feedback.clone();
        let queue = self.comparison_queue.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = queue.acquire_owned().await else {
                return;
            };

            let kind = match batch.run().await {
                Ok(enclave) => Some(FeedbackKind::from_comparison(&legacy, &enclave)),
                Err(e) => {
                    warn!(error = %e, "Enclave discovery failed");
                    FeedbackKind::from_error(&e)
                }
            };

            if let Some(kind) = kind {
                feedback.report(kind).await;
            }
        });

        let mut handles = self.comparisons.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }
}
