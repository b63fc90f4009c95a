// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory summary store.
//!
//! Holds the latest published [`Summary`] and a bounded, most-recent-first
//! history of timestamped snapshots. All mutation goes through one mutex.
//!
//! `update_latest` targets whichever summary is current when it runs. A
//! newer notification published in between receives the update instead of the
//! one that triggered it; this race is accepted.
//!
//! Issues are tracked per source in a ledger that outlives the latest
//! summary and survives [`SummaryStore::clear`]. Filing for a source is
//! claimed under the store lock before the tracker is called, so at most one
//! issue is ever filed per source. Enrichment flags are not tracked that way:
//! a source redelivered after a newer one was published starts again from
//! its interim summary and is enriched again, keeping its recorded issue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::DEFAULT_HISTORY_CAPACITY;
use crate::models::{
    HistoryEntry, IssueRef, LatestSummaryStatus, MeetingDetails, MeetingInsights, Summary,
};

/// Partial update merged onto the latest summary.
///
/// Provenance flags only ever turn on; an existing issue reference is never
/// replaced.
#[derive(Debug, Clone, Default)]
pub struct SummaryUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub has_enriched_content: bool,
    pub has_insights: bool,
    pub insights: Option<MeetingInsights>,
    pub transcript: Option<String>,
    pub meeting_details: Option<MeetingDetails>,
    pub external_issue: Option<IssueRef>,
}

impl SummaryUpdate {
    /// Update that replaces content with an enriched summary's.
    pub fn from_enriched(summary: &Summary) -> Self {
        Self {
            title: Some(summary.title.clone()),
            body: Some(summary.body.clone()),
            has_enriched_content: summary.has_enriched_content,
            has_insights: summary.has_insights,
            insights: summary.insights.clone(),
            transcript: summary.transcript.clone(),
            meeting_details: summary.meeting_details.clone(),
            external_issue: None,
        }
    }

    fn issue(issue: IssueRef) -> Self {
        Self {
            external_issue: Some(issue),
            ..Default::default()
        }
    }

    fn apply(self, summary: &mut Summary) {
        if let Some(title) = self.title {
            summary.title = title;
        }
        if let Some(body) = self.body {
            summary.body = body;
        }
        if self.insights.is_some() {
            summary.insights = self.insights;
        }
        if self.transcript.is_some() {
            summary.transcript = self.transcript;
        }
        if self.meeting_details.is_some() {
            summary.meeting_details = self.meeting_details;
        }

        summary.has_enriched_content |= self.has_enriched_content;
        summary.has_insights |= self.has_insights;
        if summary.is_enriched() {
            summary.is_metadata_only = false;
        }

        if summary.external_issue.is_none() {
            summary.external_issue = self.external_issue;
        }
        summary.updated_at = Some(Utc::now());
    }
}

/// Result of [`SummaryStore::claim_issue`].
#[derive(Debug, Clone, PartialEq)]
pub enum IssueClaim {
    /// The caller owns filing for the source and must follow up with
    /// [`SummaryStore::record_issue`] or [`SummaryStore::release_issue`].
    Claimed,
    /// Another caller is filing for the source right now.
    InFlight,
    Filed(IssueRef),
}

/// Counts exposed by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub latest: Option<LatestSummaryStatus>,
    pub history_count: usize,
}

#[derive(Default)]
struct StoreInner {
    latest: Option<Summary>,
    history: VecDeque<HistoryEntry>,
    /// Source key to filed issue; `None` while filing is in flight.
    issues: HashMap<String, Option<IssueRef>>,
}

pub struct SummaryStore {
    inner: Mutex<StoreInner>,
    capacity: usize,
}

impl Default for SummaryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SummaryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `summary` as the latest and record a snapshot in history.
    ///
    /// A summary for the same source as the current latest keeps whatever
    /// enrichment and issue reference the latest already has.
    pub fn set_latest(&self, mut summary: Summary) -> Summary {
        let mut inner = self.lock();
        if let Some(prior) = &inner.latest {
            summary.absorb_prior(prior);
        }
        if summary.external_issue.is_none() {
            summary.external_issue = summary
                .source_key
                .as_ref()
                .and_then(|key| inner.issues.get(key).cloned().flatten());
        }

        inner.history.push_front(HistoryEntry {
            summary: summary.clone(),
            recorded_at: Utc::now(),
        });
        inner.history.truncate(self.capacity);
        inner.latest = Some(summary.clone());

        debug!(
            summary_id = %summary.id,
            history_count = inner.history.len(),
            "Published summary"
        );
        summary
    }

    /// Merge `update` onto the latest summary. Without a latest summary this
    /// is a no-op.
    pub fn update_latest(&self, update: SummaryUpdate) -> Option<Summary> {
        let mut inner = self.lock();
        let Some(latest) = inner.latest.as_mut() else {
            warn!("No latest summary to update");
            return None;
        };
        update.apply(latest);
        debug!(summary_id = %latest.id, "Updated latest summary");
        Some(latest.clone())
    }

    pub fn latest(&self) -> Option<Summary> {
        self.lock().latest.clone()
    }

    /// Up to `limit` snapshots, most recent first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.lock().history.iter().take(limit).cloned().collect()
    }

    /// Issue already filed for `source_key`, if any.
    pub fn issue_for_source(&self, source_key: &str) -> Option<IssueRef> {
        self.lock().issues.get(source_key).cloned().flatten()
    }

    /// Reserve issue filing for `source_key`.
    pub fn claim_issue(&self, source_key: &str) -> IssueClaim {
        let mut inner = self.lock();
        match inner.issues.get(source_key) {
            Some(Some(issue)) => IssueClaim::Filed(issue.clone()),
            Some(None) => IssueClaim::InFlight,
            None => {
                inner.issues.insert(source_key.to_string(), None);
                IssueClaim::Claimed
            }
        }
    }

    /// Give up a claim after filing failed. A recorded issue is kept.
    pub fn release_issue(&self, source_key: &str) {
        let mut inner = self.lock();
        if matches!(inner.issues.get(source_key), Some(None)) {
            inner.issues.remove(source_key);
        }
    }

    /// Record `issue` for `source_key` and attach it to the latest summary
    /// when that summary belongs to the same source.
    ///
    /// Without a source key the issue goes to whatever summary is latest.
    pub fn record_issue(&self, source_key: Option<&str>, issue: IssueRef) -> Option<Summary> {
        let mut inner = self.lock();
        if let Some(key) = source_key {
            inner
                .issues
                .entry(key.to_string())
                .and_modify(|slot| {
                    slot.get_or_insert_with(|| issue.clone());
                })
                .or_insert_with(|| Some(issue.clone()));
        }

        let latest = inner.latest.as_mut()?;
        if source_key.is_some() && latest.source_key.as_deref() != source_key {
            debug!(summary_id = %latest.id, "Latest summary moved on, issue kept in ledger");
            return None;
        }
        SummaryUpdate::issue(issue).apply(latest);
        Some(latest.clone())
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.latest = None;
        inner.history.clear();
    }

    pub fn status(&self) -> StoreSnapshot {
        let inner = self.lock();
        StoreSnapshot {
            latest: inner.latest.as_ref().map(|s| LatestSummaryStatus {
                is_metadata_only: s.is_metadata_only,
                has_enriched_content: s.has_enriched_content,
                has_insights: s.has_insights,
                has_content_reference: s.content_reference_url.is_some(),
                has_external_issue: s.external_issue.is_some(),
                auto_created_issue: s
                    .external_issue
                    .as_ref()
                    .is_some_and(|issue| issue.auto_created),
            }),
            history_count: inner.history.len(),
        }
    }
}
