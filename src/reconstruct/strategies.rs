// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use lazy_static::lazy_static;
use regex::Regex;

use super::{
    DecryptedRecord, DefaultIdentity, MeetingOrganizer, OrganizerUser, ReconstructionStrategy,
};

const CONTEXT_ANCHOR: &str = r#"{"@odata.context""#;
const CONTENT_URL_KEY: &str = r#""transcriptContentUrl""#;
const ORGANIZER_KEY: &str = r#""meetingOrganizer""#;

/// Field extraction needs strictly more than this many fields.
const MIN_EXTRACTED_FIELDS: usize = 3;

const AAD_USER_IDENTITY: &str = "aadUser";

lazy_static! {
    static ref ORGANIZER_OBJECT: Regex =
        Regex::new(r#""meetingOrganizer"\s*:\s*(\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\})"#).unwrap();
}

/// `"name": "value"` with escaped quotes allowed inside the value.
fn string_field_pattern(name: &str) -> Regex {
    Regex::new(&format!(
        r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#,
        regex::escape(name)
    ))
    .unwrap()
}

lazy_static! {
    static ref ODATA_CONTEXT: Regex = string_field_pattern("@odata.context");
    static ref ID: Regex = string_field_pattern("id");
    static ref MEETING_ID: Regex = string_field_pattern("meetingId");
    static ref CALL_ID: Regex = string_field_pattern("callId");
    static ref CONTENT_CORRELATION_ID: Regex = string_field_pattern("contentCorrelationId");
    static ref TRANSCRIPT_CONTENT_URL: Regex = string_field_pattern("transcriptContentUrl");
    static ref CREATED_DATE_TIME: Regex = string_field_pattern("createdDateTime");
    static ref END_DATE_TIME: Regex = string_field_pattern("endDateTime");
    static ref DISPLAY_NAME: Regex = string_field_pattern("displayName");
    static ref USER_PRINCIPAL_NAME: Regex = string_field_pattern("userPrincipalName");
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    let raw = pattern.captures(text)?.get(1)?.as_str();
    // Values are JSON string bodies; fall back to the raw text on bad escapes.
    Some(serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string()))
}

fn parse_record(text: &str) -> Option<DecryptedRecord> {
    serde_json::from_str(text).ok()
}

// =============================================================================
// 1. Anchor at the context marker
// =============================================================================

/// Parses from the `{"@odata.context"` marker to the end of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorAtMarker;

impl ReconstructionStrategy for AnchorAtMarker {
    fn name(&self) -> &'static str {
        "anchor_at_marker"
    }

    fn attempt(&self, text: &str) -> Option<DecryptedRecord> {
        let start = text.find(CONTEXT_ANCHOR)?;
        parse_record(&text[start..])
    }
}

// =============================================================================
// 2. Backward brace matching
// =============================================================================

/// Walks back from `"transcriptContentUrl"` to the brace that opens the
/// enclosing object and parses from there. Braces inside strings are not
/// special-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackwardBraceMatch;

impl BackwardBraceMatch {
    fn enclosing_open_brace(text: &str, key_index: usize) -> Option<usize> {
        let mut depth: i32 = 0;
        for (index, byte) in text.as_bytes()[..key_index].iter().enumerate().rev() {
            match byte {
                b'}' => depth += 1,
                b'{' => {
                    depth -= 1;
                    if depth == -1 {
                        return Some(index);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl ReconstructionStrategy for BackwardBraceMatch {
    fn name(&self) -> &'static str {
        "backward_brace_match"
    }

    fn attempt(&self, text: &str) -> Option<DecryptedRecord> {
        let key_index = text.find(CONTENT_URL_KEY)?;
        let start = Self::enclosing_open_brace(text, key_index)?;
        parse_record(&text[start..])
    }
}

// =============================================================================
// 3. Field-by-field extraction
// =============================================================================

/// Pulls known fields out individually.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtraction;

impl FieldExtraction {
    fn organizer(text: &str) -> Option<MeetingOrganizer> {
        if let Some(object) = ORGANIZER_OBJECT.captures(text).and_then(|c| c.get(1)) {
            if let Ok(organizer) = serde_json::from_str::<MeetingOrganizer>(object.as_str()) {
                return Some(organizer);
            }
        }

        // Object did not parse: look for its sub-fields after the key.
        let tail = &text[text.find(ORGANIZER_KEY)? + ORGANIZER_KEY.len()..];
        let organizer = MeetingOrganizer {
            id: capture(&ID, tail),
            display_name: capture(&DISPLAY_NAME, tail),
            user_principal_name: capture(&USER_PRINCIPAL_NAME, tail),
            user: None,
        };
        if organizer.id.is_none()
            && organizer.display_name.is_none()
            && organizer.user_principal_name.is_none()
        {
            return None;
        }
        Some(organizer)
    }
}

impl ReconstructionStrategy for FieldExtraction {
    fn name(&self) -> &'static str {
        "field_extraction"
    }

    fn attempt(&self, text: &str) -> Option<DecryptedRecord> {
        let record = DecryptedRecord {
            odata_context: capture(&ODATA_CONTEXT, text),
            id: capture(&ID, text),
            meeting_id: capture(&MEETING_ID, text),
            call_id: capture(&CALL_ID, text),
            content_correlation_id: capture(&CONTENT_CORRELATION_ID, text),
            transcript_content_url: capture(&TRANSCRIPT_CONTENT_URL, text),
            created_date_time: capture(&CREATED_DATE_TIME, text),
            end_date_time: capture(&END_DATE_TIME, text),
            meeting_organizer: Self::organizer(text),
        };

        let recovered = [
            record.odata_context.is_some(),
            record.id.is_some(),
            record.meeting_id.is_some(),
            record.call_id.is_some(),
            record.content_correlation_id.is_some(),
            record.transcript_content_url.is_some(),
            record.created_date_time.is_some(),
            record.end_date_time.is_some(),
            record.meeting_organizer.is_some(),
        ]
        .into_iter()
        .filter(|found| *found)
        .count();

        (recovered > MIN_EXTRACTED_FIELDS).then_some(record)
    }
}

// =============================================================================
// 4. Minimal fallback
// =============================================================================

/// Builds a record from `id` and `transcriptContentUrl` alone, with the
/// organizer taken from the configured default identity.
#[derive(Debug, Clone, Default)]
pub struct MinimalFallback {
    identity: DefaultIdentity,
}

impl MinimalFallback {
    pub fn new(identity: DefaultIdentity) -> Self {
        Self { identity }
    }
}

impl ReconstructionStrategy for MinimalFallback {
    fn name(&self) -> &'static str {
        "minimal_fallback"
    }

    fn attempt(&self, text: &str) -> Option<DecryptedRecord> {
        let id = capture(&ID, text)?;
        let transcript_content_url = capture(&TRANSCRIPT_CONTENT_URL, text)?;

        Some(DecryptedRecord {
            id: Some(id),
            transcript_content_url: Some(transcript_content_url),
            meeting_organizer: Some(MeetingOrganizer {
                user: Some(OrganizerUser {
                    id: self.identity.user_object_id.clone(),
                    display_name: None,
                    tenant_id: self.identity.tenant_id.clone(),
                    user_identity_type: Some(AAD_USER_IDENTITY.to_string()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
