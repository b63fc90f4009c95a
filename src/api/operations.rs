// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator-triggered actions on the latest summary.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use tracing::{info, warn};

use super::summaries::preview;
use crate::{
    composer,
    enrichment::IssueOutcome,
    error::ApiError,
    models::{
        FetchInsightsRequest, InsightsFetchResponse, IssueCreatedResponse, IssueRef,
        TranscriptFetchResponse,
    },
    state::AppState,
    store::{IssueClaim, SummaryUpdate},
    transcript,
};

const TRANSCRIPT_PREVIEW_CHARS: usize = 500;

/// File an issue from the latest summary.
#[utoipa::path(
    post,
    path = "/api/create-issue",
    tag = "Operations",
    responses(
        (status = 200, body = IssueCreatedResponse),
        (status = 400, description = "No summary to file"),
        (status = 409, description = "Issue for this summary is already being filed"),
        (status = 502, description = "Issue tracker rejected the request"),
        (status = 503, description = "Issue tracker not configured")
    )
)]
pub async fn create_issue(
    State(state): State<AppState>,
) -> Result<Json<IssueCreatedResponse>, ApiError> {
    let summary = state
        .store
        .latest()
        .ok_or_else(|| ApiError::bad_request("No summary available to create an issue from."))?;
    let tracker = state
        .tracker
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Issue tracker is not configured."))?;

    let existing = match (&summary.external_issue, summary.source_key.as_deref()) {
        (Some(issue), _) => Some(issue.clone()),
        (None, Some(key)) => match state.store.claim_issue(key) {
            IssueClaim::Claimed => None,
            IssueClaim::Filed(issue) => Some(issue),
            IssueClaim::InFlight => {
                return Err(ApiError::new(
                    StatusCode::CONFLICT,
                    "An issue for this summary is already being filed.",
                ))
            }
        },
        (None, None) => None,
    };
    if let Some(existing) = existing {
        return Ok(Json(IssueCreatedResponse {
            success: true,
            issue_url: existing.url,
            issue_number: existing.number,
        }));
    }

    let created = match tracker.create_issue(&summary.title, &summary.body).await {
        Ok(created) => created,
        Err(e) => {
            if let Some(key) = summary.source_key.as_deref() {
                state.store.release_issue(key);
            }
            warn!(error = %e, "Manual issue filing failed");
            return Err(ApiError::bad_gateway(format!("Failed to create issue: {e}")));
        }
    };
    info!(issue_number = created.number, "Filed issue on request");

    state.store.record_issue(
        summary.source_key.as_deref(),
        IssueRef {
            url: created.url.clone(),
            number: created.number,
            created_at: Utc::now(),
            auto_created: false,
        },
    );

    Ok(Json(IssueCreatedResponse {
        success: true,
        issue_url: created.url,
        issue_number: created.number,
    }))
}

/// Fetch the transcript behind the latest summary's content reference.
#[utoipa::path(
    post,
    path = "/api/fetch-transcript-content",
    tag = "Operations",
    responses(
        (status = 200, body = TranscriptFetchResponse),
        (status = 400, description = "No summary or no content reference"),
        (status = 502, description = "Transcript could not be fetched"),
        (status = 503, description = "Meeting content service not configured")
    )
)]
pub async fn fetch_transcript_content(
    State(state): State<AppState>,
) -> Result<Json<TranscriptFetchResponse>, ApiError> {
    let summary = state
        .store
        .latest()
        .ok_or_else(|| ApiError::bad_request("No summary available."))?;
    let url = summary
        .content_reference_url
        .clone()
        .ok_or_else(|| ApiError::bad_request("Latest summary has no transcript content URL."))?;
    let content = state
        .content
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Meeting content service is not configured."))?;

    let raw = content.transcript_content(&url).await.map_err(|e| {
        warn!(error = %e, "Transcript fetch failed");
        ApiError::bad_gateway(format!("Failed to fetch transcript content: {e}"))
    })?;
    let text = transcript::to_plain_text(&raw);
    if text.trim().is_empty() {
        return Err(ApiError::bad_gateway("Transcript content was empty."));
    }

    let body = if summary.transcript.is_none() {
        Some(format!("{}{}", summary.body, composer::transcript_section(&text)))
    } else {
        None
    };
    state.store.update_latest(SummaryUpdate {
        body,
        has_enriched_content: true,
        transcript: Some(text.clone()),
        ..Default::default()
    });
    info!(text_chars = text.chars().count(), "Fetched transcript on request");

    Ok(Json(TranscriptFetchResponse {
        success: true,
        content_length: text.len(),
        preview: preview(&text, TRANSCRIPT_PREVIEW_CHARS),
    }))
}

/// Fetch AI insights for a meeting, publish them and file an issue.
///
/// The organizer defaults to the configured Teams user; the meeting id can be
/// resolved from a join URL.
#[utoipa::path(
    post,
    path = "/api/fetch-ai-insights",
    request_body = FetchInsightsRequest,
    tag = "Operations",
    responses(
        (status = 200, body = InsightsFetchResponse),
        (status = 400, description = "User or meeting not identified"),
        (status = 404, description = "Meeting or insights not found"),
        (status = 502, description = "Meeting content service failed"),
        (status = 503, description = "Meeting content service not configured")
    )
)]
pub async fn fetch_ai_insights(
    State(state): State<AppState>,
    Json(request): Json<FetchInsightsRequest>,
) -> Result<Json<InsightsFetchResponse>, ApiError> {
    let content = state
        .content
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Meeting content service is not configured."))?;

    let user_id = request
        .user_id
        .or_else(|| state.config.identity.user_object_id.clone())
        .ok_or_else(|| ApiError::bad_request("userId is required."))?;

    let meeting_id = match (request.online_meeting_id, request.join_web_url) {
        (Some(id), _) => id,
        (None, Some(join_url)) => content
            .meeting_id_for_join_url(&join_url)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("Failed to resolve meeting: {e}")))?
            .ok_or_else(|| ApiError::not_found("No meeting found for joinWebUrl."))?,
        (None, None) => {
            return Err(ApiError::bad_request(
                "onlineMeetingId or joinWebUrl is required.",
            ))
        }
    };

    let insights = content
        .meeting_insights(&user_id, &meeting_id)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Failed to fetch AI insights: {e}")))?
        .ok_or_else(|| ApiError::not_found("No AI insights available for this meeting."))?;

    let published = state
        .store
        .set_latest(composer::from_insights(&insights, None));
    info!(summary_id = %published.id, "Published insights on request");

    let external_issue = match state.pipeline.file_issue(&published).await {
        IssueOutcome::Filed { .. } | IssueOutcome::AlreadyFiled { .. } => state
            .store
            .latest()
            .and_then(|latest| latest.external_issue),
        _ => None,
    };

    Ok(Json(InsightsFetchResponse {
        success: true,
        summary: state.store.latest().unwrap_or(published),
        external_issue,
    }))
}
