// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use crate::{
    models::{NotificationBatch, WebhookQuery},
    state::AppState,
};

/// Receive change notifications.
///
/// Echoes `validationToken` while a subscription is being created. Any other
/// delivery is acknowledged with 202 once the interim summaries are
/// published, whether or not the body could be used.
#[utoipa::path(
    post,
    path = "/api/webhook",
    params(WebhookQuery),
    request_body = NotificationBatch,
    tag = "Webhook",
    responses(
        (status = 200, description = "Validation token echo", body = String, content_type = "text/plain"),
        (status = 202, description = "Notifications accepted")
    )
)]
pub async fn receive_notifications(
    State(state): State<AppState>,
    query: Result<Query<WebhookQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    if let Ok(Query(WebhookQuery {
        validation_token: Some(token),
    })) = query
    {
        info!("Answering subscription validation request");
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            token,
        )
            .into_response();
    }

    match serde_json::from_slice::<NotificationBatch>(&body) {
        Ok(batch) => {
            if batch.value.iter().any(|n| n.encrypted_content.is_some()) {
                state.resolve_key_material().await;
            }
            state.pipeline.process_batch(&batch);
        }
        Err(e) => warn!(
            error = %e,
            body_bytes = body.len(),
            "Webhook body is not a notification batch"
        ),
    }
    StatusCode::ACCEPTED.into_response()
}
