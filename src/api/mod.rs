// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    crypto::KeyMaterialState,
    models::{
        ActionItem, ChangeNotification, DisplayContent, EncryptedContent, EnvironmentStatus,
        FetchInsightsRequest, HistoryEntry, IdentityRef, InsightsFetchResponse,
        IssueCreatedResponse, IssueRef, LatestSummaryStatus, MeetingDetails, MeetingInsights,
        MeetingNote, MeetingNoteSubpoint, MentionEvent, MentionSpeaker, MessageResponse,
        NotificationBatch, PipelineCounters, StatusResponse, Summary, SummaryDisplay,
        SummaryListResponse, TranscriptFetchResponse, Viewpoint,
    },
    state::AppState,
};

pub mod health;
pub mod operations;
pub mod summaries;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/webhook", post(webhook::receive_notifications))
        .route("/summary", get(summaries::get_summary))
        .route("/summary/display", get(summaries::get_summary_display))
        .route(
            "/summaries",
            get(summaries::list_summaries).delete(summaries::clear_summaries),
        )
        .route("/status", get(summaries::status))
        .route("/create-issue", post(operations::create_issue))
        .route(
            "/fetch-transcript-content",
            post(operations::fetch_transcript_content),
        )
        .route("/fetch-ai-insights", post(operations::fetch_ai_insights));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        webhook::receive_notifications,
        summaries::get_summary,
        summaries::get_summary_display,
        summaries::list_summaries,
        summaries::clear_summaries,
        summaries::status,
        operations::create_issue,
        operations::fetch_transcript_content,
        operations::fetch_ai_insights,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            NotificationBatch,
            ChangeNotification,
            EncryptedContent,
            Summary,
            HistoryEntry,
            IssueRef,
            MeetingDetails,
            MeetingInsights,
            MeetingNote,
            MeetingNoteSubpoint,
            ActionItem,
            MentionEvent,
            MentionSpeaker,
            IdentityRef,
            Viewpoint,
            SummaryListResponse,
            SummaryDisplay,
            DisplayContent,
            StatusResponse,
            LatestSummaryStatus,
            EnvironmentStatus,
            PipelineCounters,
            KeyMaterialState,
            FetchInsightsRequest,
            IssueCreatedResponse,
            TranscriptFetchResponse,
            InsightsFetchResponse,
            MessageResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Webhook", description = "Change notification intake"),
        (name = "Summaries", description = "Published meeting summaries"),
        (name = "Operations", description = "Manual enrichment and issue filing"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
