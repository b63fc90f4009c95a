// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Microsoft Graph integration: app-only token acquisition, meeting AI
//! insights, transcript content and meeting lookup by join URL.

use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::GraphConfig;
use crate::models::MeetingInsights;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const CAPTION_MEDIA_TYPE: &str = "text/vtt";
const CONTENT_SUFFIX: &str = "/content";

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph configuration missing: {0}")]
    MissingConfig(String),

    #[error("Graph auth failed: {0}")]
    Auth(String),

    #[error("Graph request failed: {0}")]
    Request(String),

    #[error("Graph response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Clone)]
pub struct GraphClient {
    api_base_url: String,
    authority_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    http: Client,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("api_base_url", &self.api_base_url)
            .field("authority_url", &self.authority_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

impl GraphClient {
    pub fn from_config(config: &GraphConfig, timeout: Duration) -> Result<Self, GraphError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| GraphError::MissingConfig(name.to_string()))
        };

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: config.api_base_url.clone(),
            authority_url: config.authority_url.clone(),
            tenant_id: required(&config.tenant_id, "AZURE_TENANT_ID")?,
            client_id: required(&config.client_id, "AZURE_CLIENT_ID")?,
            client_secret: required(&config.client_secret, "AZURE_CLIENT_SECRET")?,
            http,
        })
    }

    /// Latest AI insights for a meeting: lists the insights, then fetches the
    /// detail resource of the last one listed.
    pub async fn meeting_insights(
        &self,
        user_id: &str,
        meeting_id: &str,
    ) -> Result<Option<MeetingInsights>, GraphError> {
        let token = self.access_token().await?;

        let list_url = self.api_url(&[
            "beta",
            "copilot",
            "users",
            user_id,
            "onlineMeetings",
            meeting_id,
            "aiInsights",
        ])?;
        let listed: Collection<IdOnly> = parse_json(self.get_json(list_url, &token).await?)?;

        let Some(latest) = listed.value.last() else {
            debug!("No AI insights listed for meeting");
            return Ok(None);
        };

        let detail_url = self.api_url(&[
            "beta",
            "copilot",
            "users",
            user_id,
            "onlineMeetings",
            meeting_id,
            "aiInsights",
            &latest.id,
        ])?;
        let insights = parse_json(self.get_json(detail_url, &token).await?)?;
        Ok(Some(insights))
    }

    /// Transcript content behind `content_url`, requested as captions.
    pub async fn transcript_content(&self, content_url: &str) -> Result<String, GraphError> {
        let url = resolve_content_url(&self.api_base_url, content_url)?;
        let token = self.access_token().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .header(header::ACCEPT, CAPTION_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| GraphError::Request(format!("GET transcript content failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Request(format!(
                "GET transcript content returned {status}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| GraphError::InvalidResponse(format!("transcript body unreadable: {e}")))
    }

    pub async fn meeting_id_for_join_url(
        &self,
        join_url: &str,
    ) -> Result<Option<String>, GraphError> {
        let token = self.access_token().await?;

        let mut url = self.api_url(&["v1.0", "me", "onlineMeetings"])?;
        url.query_pairs_mut().append_pair(
            "$filter",
            &format!("joinWebUrl eq '{}'", join_url.replace('\'', "''")),
        );

        let meetings: Collection<IdOnly> = parse_json(self.get_json(url, &token).await?)?;
        Ok(meetings.value.into_iter().next().map(|m| m.id))
    }

    async fn access_token(&self) -> Result<String, GraphError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];

        let response = self
            .http
            .post(format!(
                "{}/{}/oauth2/v2.0/token",
                self.authority_url.trim_end_matches('/'),
                self.tenant_id
            ))
            .form(&form)
            .send()
            .await
            .map_err(|e| GraphError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Auth(format!(
                "token request returned {status}: {body}"
            )));
        }

        let token_response: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| GraphError::Auth(format!("invalid token response: {e}")))?;

        if token_response.access_token.trim().is_empty() {
            return Err(GraphError::Auth(
                "token response did not include access_token".to_string(),
            ));
        }

        Ok(token_response.access_token)
    }

    async fn get_json(&self, url: Url, token: &str) -> Result<Value, GraphError> {
        let path = url.path().to_string();
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| GraphError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GraphError::Request(format!(
                "GET {path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GraphError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url, GraphError> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| GraphError::MissingConfig(format!("invalid Graph base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GraphError::MissingConfig("Graph base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, GraphError> {
    serde_json::from_value(value).map_err(|e| GraphError::InvalidResponse(e.to_string()))
}

/// Absolute URL of transcript content. Relative references are resolved
/// against the v1.0 endpoint and the `/content` suffix is ensured.
///
/// The bearer token is attached to this URL, so it must stay on the Graph
/// origin; anything else is refused.
pub fn resolve_content_url(api_base_url: &str, content_url: &str) -> Result<Url, GraphError> {
    let base = Url::parse(api_base_url)
        .map_err(|e| GraphError::MissingConfig(format!("invalid Graph base URL: {e}")))?;

    let candidate = if content_url.starts_with("https://") || content_url.starts_with("http://") {
        content_url.to_string()
    } else {
        format!(
            "{}/v1.0/{}",
            api_base_url.trim_end_matches('/'),
            content_url.trim_start_matches('/')
        )
    };
    let mut url = Url::parse(&candidate)
        .map_err(|e| GraphError::Request(format!("invalid transcript content URL: {e}")))?;

    if url.origin() != base.origin() {
        return Err(GraphError::Request(format!(
            "transcript content URL points outside the Graph endpoint: {}",
            url.host_str().unwrap_or("-")
        )));
    }

    if !url.path().ends_with(CONTENT_SUFFIX) {
        let path = format!("{}{CONTENT_SUFFIX}", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
