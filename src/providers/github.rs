// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! GitHub issue filing.

use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;

use crate::config::GitHubConfig;

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";
const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("meeting-notes-relay/", env!("CARGO_PKG_VERSION"));
const ISSUE_LABELS: [&str; 2] = ["meeting-transcript", "auto-generated"];

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub configuration missing: {0}")]
    MissingConfig(String),

    #[error("GitHub request failed: {0}")]
    Request(String),

    #[error("GitHub response was invalid: {0}")]
    InvalidResponse(String),
}

/// Issue created in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIssue {
    #[serde(rename = "html_url")]
    pub url: String,
    pub number: u64,
}

#[derive(Clone)]
pub struct GitHubClient {
    api_base_url: String,
    token: String,
    repo: String,
    http: Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base_url", &self.api_base_url)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    pub fn from_config(config: &GitHubConfig, timeout: Duration) -> Result<Self, GitHubError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| GitHubError::MissingConfig("GITHUB_TOKEN".to_string()))?;
        let repo = config
            .repo
            .clone()
            .ok_or_else(|| GitHubError::MissingConfig("GITHUB_REPO".to_string()))?;
        if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(GitHubError::MissingConfig(format!(
                "GITHUB_REPO must be OWNER/REPO, got {repo}"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GitHubError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token,
            repo,
            http,
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub async fn create_issue(&self, title: &str, body: &str) -> Result<CreatedIssue, GitHubError> {
        let path = format!("/repos/{}/issues", self.repo);
        let response = self
            .http
            .post(format!("{}{}", self.api_base_url, path))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, ACCEPT_GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION)
            .json(&json!({
                "title": title,
                "body": body,
                "labels": ISSUE_LABELS,
            }))
            .send()
            .await
            .map_err(|e| GitHubError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Request(format!(
                "POST {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GitHubError::InvalidResponse(format!("POST {path} invalid JSON: {e}")))
    }

    /// Whether the token can see the configured repository.
    pub async fn validate_credentials(&self) -> bool {
        let response = self
            .http
            .get(format!("{}/repos/{}", self.api_base_url, self.repo))
            .bearer_auth(&self.token)
            .header(header::ACCEPT, ACCEPT_GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION)
            .send()
            .await;
        matches!(response, Ok(r) if r.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;

    fn config(base: &str, repo: &str) -> GitHubConfig {
        GitHubConfig {
            token: Some("ghp_test".into()),
            repo: Some(repo.into()),
            api_base_url: base.to_string(),
        }
    }

    async fn stub_github() -> String {
        let router = Router::new()
            .route(
                "/repos/acme/notes/issues",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    assert_eq!(
                        headers.get(API_VERSION_HEADER).and_then(|v| v.to_str().ok()),
                        Some(API_VERSION)
                    );
                    assert_eq!(
                        headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
                        Some("Bearer ghp_test")
                    );
                    assert_eq!(body["labels"], serde_json::json!(ISSUE_LABELS));
                    (
                        StatusCode::CREATED,
                        Json(serde_json::json!({
                            "html_url": "https://github.com/acme/notes/issues/42",
                            "number": 42,
                            "title": body["title"],
                        })),
                    )
                }),
            )
            .route(
                "/repos/acme/locked/issues",
                post(|| async { (StatusCode::GONE, "Issues are disabled") }),
            )
            .route("/repos/acme/notes", get(|| async { StatusCode::OK }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}")
    }

    #[test]
    fn repo_must_be_owner_slash_name() {
        let err = GitHubClient::from_config(&config("http://x", "just-a-name"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, GitHubError::MissingConfig(_)));

        let missing = GitHubClient::from_config(&GitHubConfig::default(), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(missing, GitHubError::MissingConfig(name) if name == "GITHUB_TOKEN"));
    }

    #[test]
    fn debug_output_hides_token() {
        let client =
            GitHubClient::from_config(&config("http://x", "acme/notes"), Duration::from_secs(1))
                .unwrap();
        assert!(!format!("{client:?}").contains("ghp_test"));
        assert_eq!(client.repo(), "acme/notes");
    }

    #[tokio::test]
    async fn creates_labelled_issue() {
        let base = stub_github().await;
        let client =
            GitHubClient::from_config(&config(&base, "acme/notes"), Duration::from_secs(5))
                .unwrap();
        let issue = client.create_issue("Meeting Summary", "body").await.unwrap();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.url, "https://github.com/acme/notes/issues/42");
    }

    #[tokio::test]
    async fn tracker_rejection_is_request_error() {
        let base = stub_github().await;
        let client =
            GitHubClient::from_config(&config(&base, "acme/locked"), Duration::from_secs(5))
                .unwrap();
        let err = client.create_issue("t", "b").await.unwrap_err();
        assert!(matches!(err, GitHubError::Request(message) if message.contains("410")));
    }

    #[tokio::test]
    async fn validates_repository_access() {
        let base = stub_github().await;
        let ok = GitHubClient::from_config(&config(&base, "acme/notes"), Duration::from_secs(5))
            .unwrap();
        assert!(ok.validate_credentials().await);

        let missing =
            GitHubClient::from_config(&config(&base, "acme/absent"), Duration::from_secs(5))
                .unwrap();
        assert!(!missing.validate_credentials().await);
    }
}
