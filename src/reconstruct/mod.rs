// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Payload Reconstruction
//!
//! Decrypted notification payloads are frequently not a clean JSON document:
//! framing bytes precede the object, the tail is truncated, or the envelope is
//! missing entirely. [`PayloadReconstructor`] runs an ordered list of
//! [`ReconstructionStrategy`] implementations and returns the first record
//! recovered.
//!
//! | Order | Strategy | Recovers |
//! |-------|----------|----------|
//! | 1 | [`AnchorAtMarker`] | document starting at `{"@odata.context"` |
//! | 2 | [`BackwardBraceMatch`] | object enclosing `"transcriptContentUrl"` |
//! | 3 | [`FieldExtraction`] | individual fields (more than three required) |
//! | 4 | [`MinimalFallback`] | `id` + content URL, organizer from config |
//!
//! A partial record is a normal outcome; `None` is surfaced upstream as
//! `PayloadUnparseable`.

mod strategies;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use strategies::{AnchorAtMarker, BackwardBraceMatch, FieldExtraction, MinimalFallback};

/// Identity used for organizer fields when the payload carries none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultIdentity {
    pub tenant_id: Option<String>,
    pub user_object_id: Option<String>,
}

/// User behind the meeting organizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub tenant_id: Option<String>,
    pub user_identity_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingOrganizer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OrganizerUser>,
}

/// Transcript record recovered from a decrypted payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedRecord {
    #[serde(rename = "@odata.context", skip_serializing_if = "Option::is_none")]
    pub odata_context: Option<String>,
    pub id: Option<String>,
    pub meeting_id: Option<String>,
    pub call_id: Option<String>,
    pub content_correlation_id: Option<String>,
    pub transcript_content_url: Option<String>,
    pub created_date_time: Option<String>,
    pub end_date_time: Option<String>,
    pub meeting_organizer: Option<MeetingOrganizer>,
}

impl DecryptedRecord {
    /// Organizer's user id, preferring the nested `user` object.
    pub fn organizer_user_id(&self) -> Option<&str> {
        let organizer = self.meeting_organizer.as_ref()?;
        organizer
            .user
            .as_ref()
            .and_then(|u| u.id.as_deref())
            .or(organizer.id.as_deref())
    }

    pub fn organizer_display_name(&self) -> Option<&str> {
        let organizer = self.meeting_organizer.as_ref()?;
        organizer
            .user
            .as_ref()
            .and_then(|u| u.display_name.as_deref())
            .or(organizer.display_name.as_deref())
            .or(organizer.user_principal_name.as_deref())
    }

    /// Identity of the underlying transcript: its id, or the content URL.
    pub fn source_key(&self) -> Option<String> {
        self.id
            .clone()
            .or_else(|| self.transcript_content_url.clone())
    }

    /// JSON form kept as opaque provenance on the summary.
    pub fn to_provenance(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// One way of turning decrypted text into a record.
pub trait ReconstructionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, text: &str) -> Option<DecryptedRecord>;
}

/// A recovered record and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub record: DecryptedRecord,
    pub strategy: &'static str,
}

pub struct PayloadReconstructor {
    strategies: Vec<Box<dyn ReconstructionStrategy>>,
}

impl PayloadReconstructor {
    /// The standard chain, in order of decreasing fidelity.
    pub fn new(identity: DefaultIdentity) -> Self {
        Self::with_strategies(vec![
            Box::new(AnchorAtMarker),
            Box::new(BackwardBraceMatch),
            Box::new(FieldExtraction),
            Box::new(MinimalFallback::new(identity)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ReconstructionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn reconstruct(&self, text: &str) -> Option<Reconstruction> {
        for strategy in &self.strategies {
            if let Some(record) = strategy.attempt(text) {
                debug!(strategy = strategy.name(), "Reconstructed notification payload");
                return Some(Reconstruction {
                    record,
                    strategy: strategy.name(),
                });
            }
            debug!(strategy = strategy.name(), "Reconstruction strategy did not apply");
        }
        None
    }
}

impl std::fmt::Debug for PayloadReconstructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("PayloadReconstructor")
            .field("strategies", &names)
            .finish()
    }
}
