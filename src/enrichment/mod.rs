// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Notification processing and background enrichment.
//!
//! [`NotificationPipeline`] handles each change notification synchronously up
//! to the interim summary, then hands the reconstructed record to a detached
//! task. Every stage reports a [`PipelineEvent`] to the [`OutcomeReporter`],
//! which logs it and keeps the counters shown by the status endpoint.

mod pipeline;
mod reporter;

pub use pipeline::{BatchReport, NotificationPipeline};
pub use reporter::{OutcomeReporter, PipelineStats};

use crate::error::PipelineError;

/// Which path produced the enriched content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentPath {
    Insights,
    Transcript,
}

impl EnrichmentPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentPath::Insights => "insights",
            EnrichmentPath::Transcript => "transcript",
        }
    }
}

/// What happened to the issue for an enriched summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Enrichment failed, so no issue was attempted.
    NotAttempted,
    Filed { number: u64, url: String },
    /// An issue was already filed for this source.
    AlreadyFiled { number: u64 },
    /// Another task is filing the issue for this source.
    InFlight,
    /// No issue tracker is configured.
    Skipped,
    Failed(PipelineError),
}

/// Result of one background enrichment task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub source_key: Option<String>,
    pub enrichment: Result<EnrichmentPath, PipelineError>,
    pub issue: IssueOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// An interim (or plaintext) summary was published.
    Published {
        summary_id: String,
        source_key: Option<String>,
        strategy: &'static str,
    },
    /// A notification was dropped before anything was published.
    Rejected(PipelineError),
    EnrichmentFinished(EnrichmentOutcome),
}
