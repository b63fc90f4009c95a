// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::{EnrichmentOutcome, EnrichmentPath, IssueOutcome, PipelineEvent};
use crate::composer;
use crate::crypto::{decrypt, EncryptedEnvelope, KeyMaterialResolver};
use crate::error::PipelineError;
use crate::models::{ChangeNotification, EncryptedContent, IssueRef, NotificationBatch, Summary};
use crate::providers::{IssueTracker, MeetingContentSource};
use crate::reconstruct::{DecryptedRecord, PayloadReconstructor, Reconstruction};
use crate::store::{IssueClaim, SummaryStore, SummaryUpdate};
use crate::transcript;

const PLAINTEXT_STRATEGY: &str = "resource_data";

/// Per-batch tally returned to the webhook handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub published: usize,
    pub rejected: usize,
}

/// Everything a detached enrichment task needs. Cheap to clone.
#[derive(Clone)]
struct Enricher {
    store: Arc<SummaryStore>,
    content: Option<Arc<dyn MeetingContentSource>>,
    tracker: Option<Arc<dyn IssueTracker>>,
    call_timeout: Duration,
    events: UnboundedSender<PipelineEvent>,
}

pub struct NotificationPipeline {
    resolver: Arc<KeyMaterialResolver>,
    reconstructor: PayloadReconstructor,
    enricher: Enricher,
}

impl std::fmt::Debug for NotificationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationPipeline")
            .field("reconstructor", &self.reconstructor)
            .field("has_content_source", &self.enricher.content.is_some())
            .field("has_issue_tracker", &self.enricher.tracker.is_some())
            .field("call_timeout", &self.enricher.call_timeout)
            .finish()
    }
}

impl NotificationPipeline {
    pub fn new(
        resolver: Arc<KeyMaterialResolver>,
        reconstructor: PayloadReconstructor,
        store: Arc<SummaryStore>,
        events: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            resolver,
            reconstructor,
            enricher: Enricher {
                store,
                content: None,
                tracker: None,
                call_timeout: Duration::from_secs(30),
                events,
            },
        }
    }

    pub fn with_content_source(mut self, content: Arc<dyn MeetingContentSource>) -> Self {
        self.enricher.content = Some(content);
        self
    }

    pub fn with_issue_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.enricher.tracker = Some(tracker);
        self
    }

    /// Timeout applied to each external call made during enrichment.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.enricher.call_timeout = timeout;
        self
    }

    /// Process every notification in `batch`. Failures are isolated to the
    /// notification that raised them.
    pub fn process_batch(&self, batch: &NotificationBatch) -> BatchReport {
        let mut report = BatchReport::default();
        for notification in &batch.value {
            match self.process_notification(notification) {
                Ok(_) => report.published += 1,
                Err(_) => report.rejected += 1,
            }
        }
        info!(
            notifications = batch.value.len(),
            published = report.published,
            rejected = report.rejected,
            "Processed notification batch"
        );
        report
    }

    /// Publish a summary for `notification` and start enrichment in the
    /// background. Returns the summary as published.
    pub fn process_notification(
        &self,
        notification: &ChangeNotification,
    ) -> Result<Summary, PipelineError> {
        let result = if let Some(content) = &notification.encrypted_content {
            self.process_encrypted(content)
        } else if let Some(data) = &notification.resource_data {
            self.process_resource_data(data)
        } else {
            Err(PipelineError::PayloadUnparseable)
        };

        if let Err(e) = &result {
            warn!(
                error_kind = e.kind(),
                error = %e,
                subscription_id = notification.subscription_id.as_deref().unwrap_or("-"),
                "Notification rejected"
            );
            self.enricher.emit(PipelineEvent::Rejected(e.clone()));
        }
        result
    }

    fn process_encrypted(&self, content: &EncryptedContent) -> Result<Summary, PipelineError> {
        let envelope = EncryptedEnvelope::from_wire(content)?;
        let key = self.resolver.resolve()?;
        let plaintext = decrypt(&envelope, &key)?;

        let text = String::from_utf8_lossy(&plaintext);
        let Reconstruction { record, strategy } = self
            .reconstructor
            .reconstruct(&text)
            .ok_or(PipelineError::PayloadUnparseable)?;
        info!(
            envelope = %envelope.digest(),
            plaintext_bytes = plaintext.len(),
            strategy,
            "Notification decrypted"
        );

        let summary = self.publish(composer::interim(&record), strategy);
        self.spawn_enrichment(&summary, record);
        Ok(summary)
    }

    fn process_resource_data(&self, data: &serde_json::Value) -> Result<Summary, PipelineError> {
        let summary =
            composer::from_resource_data(data).ok_or(PipelineError::PayloadUnparseable)?;
        let has_content_url = summary.content_reference_url.is_some();
        let summary = self.publish(summary, PLAINTEXT_STRATEGY);

        if has_content_url {
            match serde_json::from_value::<DecryptedRecord>(data.clone()) {
                Ok(record) => self.spawn_enrichment(&summary, record),
                Err(e) => debug!(error = %e, "Resource data not usable for enrichment"),
            }
        }
        Ok(summary)
    }

    fn publish(&self, summary: Summary, strategy: &'static str) -> Summary {
        let summary = self.enricher.store.set_latest(summary);
        info!(
            summary_id = %summary.id,
            is_metadata_only = summary.is_metadata_only,
            strategy,
            "Published summary"
        );
        self.enricher.emit(PipelineEvent::Published {
            summary_id: summary.id.clone(),
            source_key: summary.source_key.clone(),
            strategy,
        });
        summary
    }

    fn spawn_enrichment(&self, published: &Summary, record: DecryptedRecord) {
        if published.is_enriched() && published.external_issue.is_some() {
            debug!(
                summary_id = %published.id,
                "Summary already enriched and filed, skipping enrichment"
            );
            return;
        }
        let enricher = self.enricher.clone();
        tokio::spawn(async move {
            let outcome = enricher.run(record).await;
            enricher.emit(PipelineEvent::EnrichmentFinished(outcome));
        });
    }

    /// File an issue for `summary` unless one already exists for its source.
    /// Used by the manual operations; the background path files on its own.
    pub async fn file_issue(&self, summary: &Summary) -> IssueOutcome {
        self.enricher.file_issue(summary).await
    }
}

impl Enricher {
    fn emit(&self, event: PipelineEvent) {
        // The reporter is gone only during shutdown.
        if self.events.send(event).is_err() {
            debug!("Outcome reporter stopped, dropping pipeline event");
        }
    }

    async fn run(&self, record: DecryptedRecord) -> EnrichmentOutcome {
        let source_key = record.source_key();
        let enrichment = self.enrich(&record).await;

        let issue = match &enrichment {
            Ok((summary, path)) => {
                info!(path = path.as_str(), "Enrichment succeeded");
                match self.store.update_latest(SummaryUpdate::from_enriched(summary)) {
                    Some(latest) => self.file_issue(&latest).await,
                    None => IssueOutcome::NotAttempted,
                }
            }
            Err(e) => {
                warn!(error = %e, "Enrichment failed, interim summary stays published");
                IssueOutcome::NotAttempted
            }
        };

        EnrichmentOutcome {
            source_key,
            enrichment: enrichment.map(|(_, path)| path),
            issue,
        }
    }

    /// Insights first, transcript second. Only one of them is returned.
    async fn enrich(
        &self,
        record: &DecryptedRecord,
    ) -> Result<(Summary, EnrichmentPath), PipelineError> {
        let content = self.content.as_ref().ok_or_else(|| {
            PipelineError::EnrichmentFailed("meeting content source not configured".to_string())
        })?;

        if let (Some(user_id), Some(meeting_id)) =
            (record.organizer_user_id(), record.meeting_id.as_deref())
        {
            match self
                .bounded("insights", content.meeting_insights(user_id, meeting_id))
                .await
            {
                Ok(Some(insights)) => {
                    return Ok((
                        composer::from_insights(&insights, Some(record)),
                        EnrichmentPath::Insights,
                    ));
                }
                Ok(None) => debug!(meeting_id, "No insights available yet"),
                Err(e) => warn!(error = %e, "Insights lookup failed, trying transcript"),
            }
        }

        let url = record.transcript_content_url.as_deref().ok_or_else(|| {
            PipelineError::EnrichmentFailed("no transcript content reference".to_string())
        })?;
        let raw = self
            .bounded("transcript", content.transcript_content(url))
            .await
            .map_err(PipelineError::EnrichmentFailed)?;

        let text = transcript::to_plain_text(&raw);
        if text.trim().is_empty() {
            return Err(PipelineError::EnrichmentFailed(
                "transcript content was empty".to_string(),
            ));
        }
        debug!(raw_bytes = raw.len(), text_chars = text.chars().count(), "Fetched transcript");
        Ok((
            composer::from_transcript(&text, Some(record)),
            EnrichmentPath::Transcript,
        ))
    }

    async fn file_issue(&self, summary: &Summary) -> IssueOutcome {
        if let Some(issue) = &summary.external_issue {
            debug!(issue_number = issue.number, "Issue already filed for this source");
            return IssueOutcome::AlreadyFiled {
                number: issue.number,
            };
        }

        let Some(tracker) = &self.tracker else {
            info!("Issue tracker not configured, skipping issue filing");
            return IssueOutcome::Skipped;
        };

        let source_key = summary.source_key.as_deref();
        if let Some(key) = source_key {
            match self.store.claim_issue(key) {
                IssueClaim::Claimed => {}
                IssueClaim::Filed(issue) => {
                    debug!(issue_number = issue.number, "Issue already filed for this source");
                    return IssueOutcome::AlreadyFiled {
                        number: issue.number,
                    };
                }
                IssueClaim::InFlight => {
                    debug!(source_key = key, "Issue filing already in flight");
                    return IssueOutcome::InFlight;
                }
            }
        }

        match self
            .bounded("issue", tracker.create_issue(&summary.title, &summary.body))
            .await
        {
            Ok(created) => {
                info!(issue_number = created.number, issue_url = %created.url, "Filed issue");
                self.store.record_issue(
                    source_key,
                    IssueRef {
                        url: created.url.clone(),
                        number: created.number,
                        created_at: Utc::now(),
                        auto_created: true,
                    },
                );
                IssueOutcome::Filed {
                    number: created.number,
                    url: created.url,
                }
            }
            Err(message) => {
                if let Some(key) = source_key {
                    self.store.release_issue(key);
                }
                warn!(error = %message, "Issue filing failed");
                IssueOutcome::Failed(PipelineError::IssueFilingFailed(message))
            }
        }
    }

    async fn bounded<T, E: Display>(
        &self,
        step: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, String> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{step}: {e}")),
            Err(_) => Err(format!("{step} timed out after {:?}", self.call_timeout)),
        }
    }
}
