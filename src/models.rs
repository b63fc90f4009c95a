// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the wire shapes received from the notification sender
//! and the summary shapes exposed by the query endpoints. All types derive
//! `Serialize`/`Deserialize` (camelCase on the wire, matching the sender) and
//! `ToSchema` for OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Notifications**: change-notification batches and encrypted envelopes
//! - **Summaries**: published results, history entries and issue references
//! - **Insights**: AI-generated meeting notes, action items and mentions
//! - **Responses**: status, display and manual-operation payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::crypto::KeyMaterialState;

// =============================================================================
// Notifications
// =============================================================================

/// Query parameters of the webhook endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct WebhookQuery {
    /// Reachability token sent while a subscription is being created.
    pub validation_token: Option<String>,
}

/// Body of a change-notification delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationBatch {
    #[serde(default)]
    pub value: Vec<ChangeNotification>,
}

/// A single change notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    pub subscription_id: Option<String>,
    pub change_type: Option<String>,
    pub resource: Option<String>,
    pub tenant_id: Option<String>,
    pub encrypted_content: Option<EncryptedContent>,
    /// Plaintext resource payload for subscriptions without encryption.
    #[schema(value_type = Option<Object>)]
    pub resource_data: Option<serde_json::Value>,
}

/// Encrypted resource payload as delivered on the wire.
#[derive(Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedContent {
    /// Base64: 16-byte IV followed by the CBC ciphertext.
    pub data: String,
    /// Base64 HMAC over `data`.
    pub data_signature: String,
    /// Base64 RSA-wrapped symmetric key.
    pub data_key: String,
    pub encryption_certificate_id: String,
    pub encryption_certificate_thumbprint: String,
}

impl std::fmt::Debug for EncryptedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedContent")
            .field("data_len", &self.data.len())
            .field("data_key_len", &self.data_key.len())
            .field("encryption_certificate_id", &self.encryption_certificate_id)
            .field(
                "encryption_certificate_thumbprint",
                &self.encryption_certificate_thumbprint,
            )
            .finish()
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// Reference to an issue filed in the external tracker.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueRef {
    pub url: String,
    pub number: u64,
    pub created_at: DateTime<Utc>,
    /// Filed by the pipeline rather than by an operator request.
    pub auto_created: bool,
}

/// Meeting facts extracted from the notification or the insights resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetails {
    pub organizer: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub meeting_id: Option<String>,
    pub call_id: Option<String>,
    pub transcript_id: Option<String>,
    pub content_correlation_id: Option<String>,
    pub ai_insight_id: Option<String>,
}

/// A published meeting summary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Built from notification metadata only.
    pub is_metadata_only: bool,
    /// Transcript text (fetched or delivered) is part of the body.
    pub has_enriched_content: bool,
    /// AI-generated insights are part of the body.
    pub has_insights: bool,
    pub content_reference_url: Option<String>,
    pub external_issue: Option<IssueRef>,
    /// Identity of the notification this summary was built from.
    pub source_key: Option<String>,
    pub meeting_details: Option<MeetingDetails>,
    pub insights: Option<MeetingInsights>,
    /// Normalized transcript text, when fetched.
    pub transcript: Option<String>,
    /// Opaque JSON of the reconstructed notification record.
    pub provenance: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Summary {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            body: body.into(),
            is_metadata_only: false,
            has_enriched_content: false,
            has_insights: false,
            content_reference_url: None,
            external_issue: None,
            source_key: None,
            meeting_details: None,
            insights: None,
            transcript: None,
            provenance: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Whether any enrichment step has contributed to this summary.
    pub fn is_enriched(&self) -> bool {
        self.has_enriched_content || self.has_insights
    }

    /// Carry forward what an earlier summary of the same notification already
    /// gained, so that re-processing never loses enrichment.
    pub fn absorb_prior(&mut self, prior: &Summary) {
        if self.source_key.is_none() || self.source_key != prior.source_key {
            return;
        }

        if prior.is_enriched() && !self.is_enriched() {
            self.title = prior.title.clone();
            self.body = prior.body.clone();
            self.insights = prior.insights.clone();
            self.transcript = prior.transcript.clone();
            if self.meeting_details.is_none() {
                self.meeting_details = prior.meeting_details.clone();
            }
        }

        self.has_enriched_content |= prior.has_enriched_content;
        self.has_insights |= prior.has_insights;
        self.is_metadata_only &= prior.is_metadata_only;
        if self.external_issue.is_none() {
            self.external_issue = prior.external_issue.clone();
        }
    }
}

/// Timestamped snapshot kept in the summary history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub summary: Summary,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Insights
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingNoteSubpoint {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingNote {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subpoints: Vec<MeetingNoteSubpoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub owner_display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MentionEvent {
    pub event_date_time: Option<String>,
    pub transcript_utterance: Option<String>,
    pub speaker: Option<MentionSpeaker>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MentionSpeaker {
    pub user: Option<IdentityRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Viewpoint {
    #[serde(default)]
    pub mention_events: Vec<MentionEvent>,
}

/// AI insights generated for an online meeting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingInsights {
    #[serde(default)]
    pub id: String,
    pub call_id: Option<String>,
    pub content_correlation_id: Option<String>,
    pub created_date_time: Option<String>,
    pub end_date_time: Option<String>,
    #[serde(default)]
    pub meeting_notes: Vec<MeetingNote>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    pub viewpoint: Option<Viewpoint>,
}

impl MeetingInsights {
    pub fn mention_events(&self) -> &[MentionEvent] {
        self.viewpoint
            .as_ref()
            .map(|v| v.mention_events.as_slice())
            .unwrap_or_default()
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of summaries to return (default 10).
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryListResponse {
    pub count: usize,
    pub summaries: Vec<HistoryEntry>,
}

/// Flags of the latest summary; never contains summary content.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LatestSummaryStatus {
    pub is_metadata_only: bool,
    pub has_enriched_content: bool,
    pub has_insights: bool,
    pub has_content_reference: bool,
    pub has_external_issue: bool,
    pub auto_created_issue: bool,
}

/// Presence of required secrets; values are never reported.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentStatus {
    pub has_azure_tenant_id: bool,
    pub has_azure_client_id: bool,
    pub has_azure_client_secret: bool,
    pub has_github_token: bool,
    pub has_github_repo: bool,
    pub has_graph_cert_password: bool,
}

/// Counters maintained by the enrichment outcome reporter.
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineCounters {
    pub notifications_processed: u64,
    pub decryption_failures: u64,
    pub unparseable_payloads: u64,
    pub enrichments_succeeded: u64,
    pub enrichments_failed: u64,
    pub issues_filed: u64,
    pub issue_filing_failures: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub has_latest_summary: bool,
    pub latest_summary: Option<LatestSummaryStatus>,
    pub history_count: usize,
    pub key_material: KeyMaterialState,
    pub pipeline: PipelineCounters,
    pub environment: EnvironmentStatus,
    pub timestamp: DateTime<Utc>,
}

/// Latest summary projected for display.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDisplay {
    pub title: String,
    pub has_insights: bool,
    pub has_enriched_content: bool,
    pub is_auto_created: bool,
    pub external_issue: Option<IssueRef>,
    pub meeting_details: Option<MeetingDetails>,
    pub created_at: DateTime<Utc>,
    pub content: DisplayContent,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DisplayContent {
    #[serde(rename_all = "camelCase")]
    Insights {
        meeting_notes: Vec<MeetingNote>,
        action_items: Vec<ActionItem>,
        mention_events: Vec<MentionEvent>,
        summary: String,
    },
    Transcript {
        summary: String,
        transcript: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FetchInsightsRequest {
    pub user_id: Option<String>,
    pub online_meeting_id: Option<String>,
    pub join_web_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueCreatedResponse {
    pub success: bool,
    pub issue_url: String,
    pub issue_number: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptFetchResponse {
    pub success: bool,
    pub content_length: usize,
    pub preview: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsightsFetchResponse {
    pub success: bool,
    pub summary: Summary,
    pub external_issue: Option<IssueRef>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(title: &str, key: &str) -> Summary {
        let mut summary = Summary::new(title, format!("{title} body"));
        summary.source_key = Some(key.to_string());
        summary
    }

    #[test]
    fn notification_batch_parses_sender_shape() {
        let raw = r#"{
            "value": [{
                "subscriptionId": "sub-1",
                "changeType": "created",
                "resource": "communications/onlineMeetings/getAllTranscripts",
                "encryptedContent": {
                    "data": "AAAA",
                    "dataSignature": "BBBB",
                    "dataKey": "CCCC",
                    "encryptionCertificateId": "cert-1",
                    "encryptionCertificateThumbprint": "ABCDEF"
                }
            }]
        }"#;
        let batch: NotificationBatch = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.value.len(), 1);
        let content = batch.value[0].encrypted_content.as_ref().unwrap();
        assert_eq!(content.data_key, "CCCC");
        assert_eq!(content.encryption_certificate_thumbprint, "ABCDEF");
        assert!(batch.value[0].resource_data.is_none());
    }

    #[test]
    fn encrypted_content_debug_hides_payload() {
        let content = EncryptedContent {
            data: "c2VjcmV0LWRhdGE=".into(),
            data_key: "c2VjcmV0LWtleQ==".into(),
            ..Default::default()
        };
        let rendered = format!("{content:?}");
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(rendered.contains("data_len"));
    }

    #[test]
    fn absorb_prior_keeps_enrichment_of_same_source() {
        let mut prior = keyed("Enriched", "transcript-1");
        prior.has_insights = true;
        prior.external_issue = Some(IssueRef {
            url: "https://github.com/o/r/issues/1".into(),
            number: 1,
            created_at: Utc::now(),
            auto_created: true,
        });

        let mut incoming = keyed("Interim", "transcript-1");
        incoming.is_metadata_only = true;
        incoming.absorb_prior(&prior);

        assert!(incoming.has_insights);
        assert!(!incoming.is_metadata_only);
        assert_eq!(incoming.title, "Enriched");
        assert_eq!(incoming.external_issue, prior.external_issue);
    }

    #[test]
    fn absorb_prior_ignores_other_sources() {
        let mut prior = keyed("Enriched", "transcript-1");
        prior.has_enriched_content = true;

        let mut incoming = keyed("Interim", "transcript-2");
        incoming.absorb_prior(&prior);

        assert!(!incoming.has_enriched_content);
        assert_eq!(incoming.title, "Interim");
    }

    #[test]
    fn insights_tolerate_missing_collections() {
        let insights: MeetingInsights =
            serde_json::from_str(r#"{"id":"insight-1","callId":"call-1"}"#).unwrap();
        assert!(insights.meeting_notes.is_empty());
        assert!(insights.mention_events().is_empty());
    }
}
