// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::{
    error::ApiError,
    models::{
        DisplayContent, EnvironmentStatus, HistoryQuery, MessageResponse, StatusResponse, Summary,
        SummaryDisplay, SummaryListResponse,
    },
    state::AppState,
};

const DEFAULT_HISTORY_LIMIT: usize = 10;
const DISPLAY_TRANSCRIPT_PREVIEW_CHARS: usize = 500;
const NO_SUMMARY: &str = "No summary available yet.";

fn latest(state: &AppState) -> Result<Summary, ApiError> {
    state
        .store
        .latest()
        .ok_or_else(|| ApiError::not_found(NO_SUMMARY))
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/api/summary",
    tag = "Summaries",
    responses(
        (status = 200, body = Summary),
        (status = 404, description = "Nothing published yet")
    )
)]
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<Summary>, ApiError> {
    latest(&state).map(Json)
}

/// Latest summary shaped for a viewer: structured insights when present,
/// otherwise the body with a short transcript preview.
#[utoipa::path(
    get,
    path = "/api/summary/display",
    tag = "Summaries",
    responses(
        (status = 200, body = SummaryDisplay),
        (status = 404, description = "Nothing published yet")
    )
)]
pub async fn get_summary_display(
    State(state): State<AppState>,
) -> Result<Json<SummaryDisplay>, ApiError> {
    let summary = latest(&state)?;

    let content = match (&summary.insights, summary.has_insights) {
        (Some(insights), true) => DisplayContent::Insights {
            meeting_notes: insights.meeting_notes.clone(),
            action_items: insights.action_items.clone(),
            mention_events: insights.mention_events().to_vec(),
            summary: summary.body.clone(),
        },
        _ => DisplayContent::Transcript {
            summary: summary.body.clone(),
            transcript: summary
                .transcript
                .as_deref()
                .map(|t| preview(t, DISPLAY_TRANSCRIPT_PREVIEW_CHARS))
                .unwrap_or_default(),
        },
    };

    Ok(Json(SummaryDisplay {
        title: summary.title,
        has_insights: summary.has_insights,
        has_enriched_content: summary.has_enriched_content,
        is_auto_created: summary
            .external_issue
            .as_ref()
            .is_some_and(|issue| issue.auto_created),
        external_issue: summary.external_issue,
        meeting_details: summary.meeting_details,
        created_at: summary.created_at,
        content,
    }))
}

#[utoipa::path(
    get,
    path = "/api/summaries",
    params(HistoryQuery),
    tag = "Summaries",
    responses((status = 200, body = SummaryListResponse))
)]
pub async fn list_summaries(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<SummaryListResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(state.store.capacity());
    let summaries = state.store.history(limit);
    Json(SummaryListResponse {
        count: summaries.len(),
        summaries,
    })
}

#[utoipa::path(
    delete,
    path = "/api/summaries",
    tag = "Summaries",
    responses((status = 200, body = MessageResponse))
)]
pub async fn clear_summaries(State(state): State<AppState>) -> Json<MessageResponse> {
    state.store.clear();
    Json(MessageResponse {
        message: "Summary history cleared".to_string(),
    })
}

/// Flags and counters only; no summary content or secret values.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "Summaries",
    responses((status = 200, body = StatusResponse))
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.store.status();
    let config = &state.config;

    Json(StatusResponse {
        has_latest_summary: snapshot.latest.is_some(),
        latest_summary: snapshot.latest,
        history_count: snapshot.history_count,
        key_material: state.resolver.state(),
        pipeline: state.stats.snapshot(),
        environment: EnvironmentStatus {
            has_azure_tenant_id: config.graph.tenant_id.is_some(),
            has_azure_client_id: config.graph.client_id.is_some(),
            has_azure_client_secret: config.graph.client_secret.is_some(),
            has_github_token: config.github.token.is_some(),
            has_github_repo: config.github.repo.is_some(),
            has_graph_cert_password: config.has_configured_password(),
        },
        timestamp: Utc::now(),
    })
}
