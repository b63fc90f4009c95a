// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::crypto::{KeyMaterialResolver, KeyMaterialState};
use crate::enrichment::{NotificationPipeline, OutcomeReporter, PipelineStats};
use crate::providers::{GitHubClient, GraphClient, IssueTracker, MeetingContentSource};
use crate::reconstruct::PayloadReconstructor;
use crate::store::SummaryStore;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SummaryStore>,
    pub resolver: Arc<KeyMaterialResolver>,
    pub pipeline: Arc<NotificationPipeline>,
    pub content: Option<Arc<dyn MeetingContentSource>>,
    pub tracker: Option<Arc<dyn IssueTracker>>,
    pub stats: Arc<PipelineStats>,
}

impl AppState {
    /// Wire up the real collaborators described by `config`. The returned
    /// reporter must be spawned for the status counters to move.
    pub fn from_config(config: AppConfig) -> (Self, OutcomeReporter) {
        let content: Option<Arc<dyn MeetingContentSource>> =
            match GraphClient::from_config(&config.graph, config.enrichment_timeout) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    info!(reason = %e, "Meeting enrichment disabled");
                    None
                }
            };
        let tracker: Option<Arc<dyn IssueTracker>> =
            match GitHubClient::from_config(&config.github, config.enrichment_timeout) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    info!(reason = %e, "Issue filing disabled");
                    None
                }
            };
        let resolver = KeyMaterialResolver::from_config(&config.certificate);
        Self::assemble(config, resolver, content, tracker)
    }

    /// Build the state around explicit collaborators.
    pub fn assemble(
        config: AppConfig,
        resolver: KeyMaterialResolver,
        content: Option<Arc<dyn MeetingContentSource>>,
        tracker: Option<Arc<dyn IssueTracker>>,
    ) -> (Self, OutcomeReporter) {
        let store = Arc::new(SummaryStore::new(config.history_capacity));
        let resolver = Arc::new(resolver);
        let stats = Arc::new(PipelineStats::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut pipeline = NotificationPipeline::new(
            Arc::clone(&resolver),
            PayloadReconstructor::new(config.identity.clone()),
            Arc::clone(&store),
            events_tx,
        )
        .with_call_timeout(config.enrichment_timeout);
        if let Some(content) = &content {
            pipeline = pipeline.with_content_source(Arc::clone(content));
        }
        if let Some(tracker) = &tracker {
            pipeline = pipeline.with_issue_tracker(Arc::clone(tracker));
        }

        let state = Self {
            config: Arc::new(config),
            store,
            resolver,
            pipeline: Arc::new(pipeline),
            content,
            tracker,
            stats: Arc::clone(&stats),
        };
        (state, OutcomeReporter::new(events_rx, stats))
    }

    /// Resolve the notification key on the blocking pool unless that has
    /// already happened. Unlocking the container reads files and runs the
    /// PKCS#12 key derivation for every candidate password.
    pub async fn resolve_key_material(&self) -> KeyMaterialState {
        if self.resolver.state() == KeyMaterialState::NotResolved {
            let resolver = Arc::clone(&self.resolver);
            if let Err(e) = tokio::task::spawn_blocking(move || resolver.resolve()).await {
                warn!(error = %e, "Key material resolution task failed");
            }
        }
        self.resolver.state()
    }
}
