// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Outcome Reporter
//!
//! Background task that drains [`PipelineEvent`]s from the notification
//! pipeline, logs them with structured fields and maintains the counters
//! exposed by `/api/status`.
//!
//! ## Shutdown
//!
//! Runs until the cancellation token fires or every sender is dropped. Events
//! still queued at cancellation are drained before returning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EnrichmentOutcome, IssueOutcome, PipelineEvent};
use crate::error::PipelineError;
use crate::models::PipelineCounters;

/// Shared pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    notifications_processed: AtomicU64,
    decryption_failures: AtomicU64,
    unparseable_payloads: AtomicU64,
    enrichments_succeeded: AtomicU64,
    enrichments_failed: AtomicU64,
    issues_filed: AtomicU64,
    issue_filing_failures: AtomicU64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> PipelineCounters {
        PipelineCounters {
            notifications_processed: self.notifications_processed.load(Ordering::Relaxed),
            decryption_failures: self.decryption_failures.load(Ordering::Relaxed),
            unparseable_payloads: self.unparseable_payloads.load(Ordering::Relaxed),
            enrichments_succeeded: self.enrichments_succeeded.load(Ordering::Relaxed),
            enrichments_failed: self.enrichments_failed.load(Ordering::Relaxed),
            issues_filed: self.issues_filed.load(Ordering::Relaxed),
            issue_filing_failures: self.issue_filing_failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Published { .. } => Self::bump(&self.notifications_processed),
            PipelineEvent::Rejected(error) => match error {
                PipelineError::PayloadUnparseable => Self::bump(&self.unparseable_payloads),
                // Without key material nothing can be decrypted.
                PipelineError::KeyUnavailable(_) => Self::bump(&self.decryption_failures),
                e if e.is_decryption_failure() => Self::bump(&self.decryption_failures),
                _ => {}
            },
            PipelineEvent::EnrichmentFinished(outcome) => {
                if outcome.enrichment.is_ok() {
                    Self::bump(&self.enrichments_succeeded);
                } else {
                    Self::bump(&self.enrichments_failed);
                }
                match outcome.issue {
                    IssueOutcome::Filed { .. } => Self::bump(&self.issues_filed),
                    IssueOutcome::Failed(_) => Self::bump(&self.issue_filing_failures),
                    _ => {}
                }
            }
        }
    }
}

pub struct OutcomeReporter {
    events: UnboundedReceiver<PipelineEvent>,
    stats: Arc<PipelineStats>,
}

impl OutcomeReporter {
    pub fn new(events: UnboundedReceiver<PipelineEvent>, stats: Arc<PipelineStats>) -> Self {
        Self { events, stats }
    }

    /// Run until `shutdown` is cancelled or the pipeline is dropped.
    ///
    /// ```rust,ignore
    /// tokio::spawn(reporter.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Outcome reporter starting");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle(&event),
                    None => {
                        info!("Pipeline closed, outcome reporter stopping");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    while let Ok(event) = self.events.try_recv() {
                        self.handle(&event);
                    }
                    info!(counters = ?self.stats.snapshot(), "Outcome reporter shutting down");
                    return;
                }
            }
        }
    }

    fn handle(&self, event: &PipelineEvent) {
        self.stats.record(event);
        match event {
            PipelineEvent::Published {
                summary_id,
                source_key,
                strategy,
            } => debug!(
                summary_id = %summary_id,
                source_key = source_key.as_deref().unwrap_or("-"),
                strategy,
                "Summary published"
            ),
            PipelineEvent::Rejected(error) => debug!(
                error_kind = error.kind(),
                "Notification rejected"
            ),
            PipelineEvent::EnrichmentFinished(outcome) => log_outcome(outcome),
        }
    }
}

fn log_outcome(outcome: &EnrichmentOutcome) {
    let source_key = outcome.source_key.as_deref().unwrap_or("-");
    match (&outcome.enrichment, &outcome.issue) {
        (Ok(path), IssueOutcome::Filed { number, url }) => info!(
            source_key,
            path = path.as_str(),
            issue_number = number,
            issue_url = %url,
            "Enrichment finished, issue filed"
        ),
        (Ok(path), IssueOutcome::Failed(error)) => warn!(
            source_key,
            path = path.as_str(),
            error = %error,
            "Enrichment finished, issue filing failed"
        ),
        (Ok(path), issue) => info!(
            source_key,
            path = path.as_str(),
            issue = ?issue,
            "Enrichment finished"
        ),
        (Err(error), _) => warn!(
            source_key,
            error_kind = error.kind(),
            error = %error,
            "Enrichment did not complete"
        ),
    }
}
