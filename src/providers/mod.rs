// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: the meeting content service (Microsoft Graph) and
//! the issue tracker (GitHub).
//!
//! The pipeline depends on the traits below rather than on the HTTP clients,
//! so tests can substitute in-process fakes.

pub mod github;
pub mod graph;

use async_trait::async_trait;

use crate::models::MeetingInsights;

pub use github::{CreatedIssue, GitHubClient, GitHubError};
pub use graph::{GraphClient, GraphError};

/// Source of meeting insights and transcript content.
#[async_trait]
pub trait MeetingContentSource: Send + Sync {
    /// Latest AI insights for a meeting; `Ok(None)` when none exist yet.
    async fn meeting_insights(
        &self,
        user_id: &str,
        meeting_id: &str,
    ) -> Result<Option<MeetingInsights>, GraphError>;

    /// Raw transcript content (usually WebVTT) behind a content reference.
    async fn transcript_content(&self, content_url: &str) -> Result<String, GraphError>;

    /// Online meeting id for a join URL; `Ok(None)` when no meeting matches.
    async fn meeting_id_for_join_url(&self, join_url: &str)
        -> Result<Option<String>, GraphError>;
}

/// Destination for published summaries.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(&self, title: &str, body: &str) -> Result<CreatedIssue, GitHubError>;
}

#[async_trait]
impl MeetingContentSource for GraphClient {
    async fn meeting_insights(
        &self,
        user_id: &str,
        meeting_id: &str,
    ) -> Result<Option<MeetingInsights>, GraphError> {
        GraphClient::meeting_insights(self, user_id, meeting_id).await
    }

    async fn transcript_content(&self, content_url: &str) -> Result<String, GraphError> {
        GraphClient::transcript_content(self, content_url).await
    }

    async fn meeting_id_for_join_url(
        &self,
        join_url: &str,
    ) -> Result<Option<String>, GraphError> {
        GraphClient::meeting_id_for_join_url(self, join_url).await
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn create_issue(&self, title: &str, body: &str) -> Result<CreatedIssue, GitHubError> {
        GitHubClient::create_issue(self, title, body).await
    }
}
